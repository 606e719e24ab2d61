use std::collections::{BTreeMap, BTreeSet};
use super::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
	/// Package name to the names of the packages it conflicts with.
	///
	/// The key is the package that would have to go. Entries can be dropped freely
	/// when their source leaves the transaction.
	pub conflicts: BTreeMap<String, BTreeSet<String>>,
	/// Pairs conflicting in both directions, stored with the smaller name first.
	pub mutual: BTreeSet<(String, String)>,
}

impl ConflictReport {
	/// Conflicts declared by one transaction member against another, as `(victim, source)`.
	///
	/// Pairs in [`ConflictReport::mutual`] are left out.
	pub fn one_sided_members(&self, pkgs_data: &BTreeMap<String, PackageInfo>) -> BTreeSet<(String, String)> {
		let mut pairs = BTreeSet::new();
		for (victim, sources) in self.conflicts.iter().filter(|(v, _)| pkgs_data.contains_key(*v)) {
			for source in sources.iter().filter(|s| pkgs_data.contains_key(*s)) {
				if !self.mutual.contains(&ordered(victim, source)) {
					pairs.insert((victim.clone(), source.clone()));
				}
			}
		}
		pairs
	}

	/// Conflicts where the package to remove is installed and not part of the transaction.
	pub fn installed_victims<'a>(&'a self, pkgs_data: &'a BTreeMap<String, PackageInfo>) -> impl Iterator<Item = (&'a String, &'a BTreeSet<String>)> + 'a {
		self.conflicts.iter().filter(move |(victim, _)| !pkgs_data.contains_key(*victim))
	}

	fn insert(&mut self, victim: &str, source: &str) {
		self.conflicts.entry(victim.to_string()).or_default().insert(source.to_string());
	}
}

fn ordered(a: &str, b: &str) -> (String, String) {
	if a <= b {
		(a.to_string(), b.to_string())
	} else {
		(b.to_string(), a.to_string())
	}
}

/// Finds conflicts between the transaction members in `pkgs_data` and everything else on the system.
///
/// `world` has to provide every installed package overlaid by the transaction members,
/// `installed` holds the records of installed packages so their own conflict declarations are checked.
/// A versioned conflict against a virtual name is checked against each provider's version on its own.
pub fn find_conflicts(pkgs_data: &BTreeMap<String, PackageInfo>, world: &ProvidedMap, installed: &BTreeMap<String, PackageInfo>) -> ConflictReport {
	let mut report = ConflictReport::default();

	for package in pkgs_data.values() {
		for relation in &package.conflicts {
			for provider in world.providers_matching(relation) {
				if provider.name == package.name {
					continue;
				}
				log::trace!("`{}` conflicts with `{}` through `{}`", package.name, provider.name, relation);
				report.insert(&provider.name, &package.name);
			}
		}
	}

	/* Installed packages declaring a conflict against something new. Conflicts among installed packages are old news */
	for package in installed.values().filter(|p| !pkgs_data.contains_key(&p.name)) {
		for relation in &package.conflicts {
			for provider in world.providers_matching(relation) {
				if provider.name == package.name || !pkgs_data.contains_key(&provider.name) {
					continue;
				}
				log::trace!("installed `{}` conflicts with `{}` through `{}`", package.name, provider.name, relation);
				report.insert(&package.name, &provider.name);
			}
		}
	}

	for (victim, sources) in &report.conflicts {
		for source in sources {
			let reverse = report.conflicts.get(source).map_or(false, |s| s.contains(victim));
			if reverse && pkgs_data.contains_key(victim) && pkgs_data.contains_key(source) {
				report.mutual.insert(ordered(victim, source));
			}
		}
	}

	report
}
