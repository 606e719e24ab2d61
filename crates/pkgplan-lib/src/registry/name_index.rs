use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of every known registry package name.
///
/// Readers always get a whole snapshot, a refresh swaps in a new set rather than editing the old one.
#[derive(Debug)]
pub struct NameIndex {
	current: watch::Sender<Arc<HashSet<String>>>,
}

impl Default for NameIndex {
	fn default() -> Self {
		Self::new(HashSet::new())
	}
}

impl NameIndex {
	pub fn new(names: HashSet<String>) -> Self {
		let (current, _) = watch::channel(Arc::new(names));
		Self { current }
	}

	pub fn snapshot(&self) -> Arc<HashSet<String>> {
		self.current.borrow().clone()
	}

	/// Swaps in a new set of names, returning the number of names in it.
	pub fn replace(&self, names: HashSet<String>) -> usize {
		let len = names.len();
		self.current.send_replace(Arc::new(names));
		len
	}

	/// A receiver notified after every swap.
	pub fn subscribe(&self) -> watch::Receiver<Arc<HashSet<String>>> {
		self.current.subscribe()
	}
}
