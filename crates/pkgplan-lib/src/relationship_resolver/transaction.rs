use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use serde::{Serialize, Deserialize};
use super::*;

/// Why a package was pulled in, removed or held back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
	/// Installed because these packages need it.
	RequiredBy(BTreeSet<String>),
	/// Removed because this package conflicts with it.
	ConflictsWith(String),
	/// Both packages conflict with each other so neither can go ahead.
	MutualConflict(String),
	/// Needs a package which is no longer part of the transaction.
	RequiresWithdrawn(String),
	/// Depends on a package being removed.
	DependsOnRemoved(String),
	/// The new version would no longer satisfy this installed package.
	WouldBreak(String),
	/// The user didn't pick a provider for this dependency.
	ProviderNotSelected(String),
	/// The registry couldn't be reached and nothing is known locally.
	MetadataUnavailable,
}

impl std::fmt::Display for Reason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Reason::RequiredBy(names) => write!(f, "required by {}", names.iter().cloned().collect::<Vec<_>>().join(", ")),
			Reason::ConflictsWith(name) => write!(f, "conflicts with {}", name),
			Reason::MutualConflict(name) => write!(f, "{} conflicts with it", name),
			Reason::RequiresWithdrawn(name) => write!(f, "requires {} which can't be installed", name),
			Reason::DependsOnRemoved(name) => write!(f, "depends on {} which is being removed", name),
			Reason::WouldBreak(name) => write!(f, "would break {}", name),
			Reason::ProviderNotSelected(name) => write!(f, "no provider selected for {}", name),
			Reason::MetadataUnavailable => f.write_str("package information unavailable"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequirement {
	pub package: PackageRef,
	/// Empty for packages upgraded because they were asked for.
	pub reason: Option<Reason>,
	pub required_download_size: u64,
	/// Negative when the system shrinks.
	pub extra_installed_size: i64,
	pub sort_priority: i64,
}

impl UpgradeRequirement {
	pub fn new(package: PackageRef, reason: Option<Reason>) -> Self {
		Self {
			package,
			reason,
			required_download_size: 0,
			extra_installed_size: 0,
			sort_priority: 0,
		}
	}
}

/// The complete plan for a transaction. The four lists never share a package name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequirements {
	pub to_upgrade: Vec<UpgradeRequirement>,
	pub to_install: Vec<UpgradeRequirement>,
	pub to_remove: Vec<UpgradeRequirement>,
	pub cannot_upgrade: Vec<UpgradeRequirement>,
}

impl UpgradeRequirements {
	pub fn is_empty(&self) -> bool {
		self.to_upgrade.is_empty() && self.to_install.is_empty() && self.to_remove.is_empty() && self.cannot_upgrade.is_empty()
	}

	pub fn total_download_size(&self) -> u64 {
		self.to_upgrade.iter().chain(&self.to_install).map(|r| r.required_download_size).sum()
	}

	pub fn total_installed_size_change(&self) -> i64 {
		self.to_upgrade.iter().chain(&self.to_install).chain(&self.to_remove).map(|r| r.extra_installed_size).sum()
	}
}

/// A package being installed or upgraded.
#[derive(Debug, Clone)]
pub(crate) struct Member {
	pub reference: PackageRef,
	/// Empty for explicitly requested packages.
	pub required_by: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Blocked {
	pub reference: PackageRef,
	pub reason: Reason,
	pub priority: i64,
}

/// Working state of a single planning call.
#[derive(Debug, Default)]
pub(crate) struct TransactionContext {
	pub to_update: BTreeMap<String, Member>,
	pub to_install: BTreeMap<String, Member>,
	pub to_remove: BTreeMap<String, Reason>,
	pub cannot_upgrade: BTreeMap<String, Blocked>,
	/// Metadata of every member of `to_update` and `to_install`.
	pub pkgs_data: BTreeMap<String, PackageInfo>,
	/// Names provided by the members.
	pub provided: ProvidedMap,
	/// Records of the installed packages.
	pub installed: BTreeMap<String, PackageInfo>,
	pub installed_versions: HashMap<String, String>,
	/// Members whose dependencies have been resolved.
	pub checked: BTreeSet<String>,
}

impl TransactionContext {
	pub fn is_member(&self, name: &str) -> bool {
		self.pkgs_data.contains_key(name)
	}

	pub fn is_installed(&self, name: &str) -> bool {
		self.installed_versions.contains_key(name)
	}

	/// Adds a package to the transaction, as an upgrade when an older version is installed.
	pub fn add_member(&mut self, info: PackageInfo, required_by: BTreeSet<String>) {
		let member = Member { reference: info.reference(), required_by };
		let name = info.name.clone();
		self.provided.replace_package(&info);
		self.pkgs_data.insert(name.clone(), info);
		self.cannot_upgrade.remove(&name);
		self.to_remove.remove(&name);
		if self.is_installed(&name) {
			self.to_update.insert(name, member);
		} else {
			self.to_install.insert(name, member);
		}
	}

	/// Installed packages overlaid with the members, without anything being removed.
	pub fn world(&self) -> ProvidedMap {
		let mut world = ProvidedMap::from_packages(
			self.installed.values().filter(|p| !self.to_remove.contains_key(&p.name))
		);
		for info in self.pkgs_data.values() {
			world.replace_package(info);
		}
		world
	}

	/// Members with a dependency on one of `names` that `world` no longer satisfies.
	pub fn dependents_in_transaction(&self, names: &[&str], world: &ProvidedMap) -> Vec<String> {
		self.pkgs_data.values()
			.filter(|p| p.required_relations().any(|r| names.contains(&r.name.as_str()) && !world.satisfies(r)))
			.map(|p| p.name.clone())
			.collect()
	}

	/// Takes a member out of the transaction without touching anything depending on it.
	pub fn take_member(&mut self, name: &str) -> Option<(PackageInfo, Member)> {
		let info = self.pkgs_data.remove(name)?;
		self.provided.remove_package(&info.reference());
		self.checked.remove(name);
		let member = self.to_update.remove(name)
			.or_else(|| self.to_install.remove(name))
			.unwrap_or_else(|| Member { reference: info.reference(), required_by: BTreeSet::new() });
		Some((info, member))
	}

	/// Takes `name` out of the transaction together with every member that can't do without it.
	///
	/// Upgrades and requested packages end up in `cannot_upgrade`, each level of dependents
	/// one priority lower than the last. Dependencies are dropped.
	pub fn withdraw(&mut self, name: &str, reason: Reason, priority: i64) {
		let mut queue = VecDeque::from([(name.to_string(), reason, priority)]);

		while let Some((name, reason, priority)) = queue.pop_front() {
			let Some((info, member)) = self.take_member(&name) else { continue };

			/* Installed or explicitly requested packages are reported, dependencies just disappear */
			if self.is_installed(&name) || member.required_by.is_empty() {
				log::info!("`{}` can't be upgraded: {}", name, reason);
				self.cannot_upgrade.insert(name.clone(), Blocked { reference: member.reference, reason, priority });
			} else {
				log::info!("`{}` is no longer installed: {}", name, reason);
			}

			let world = self.world();
			let provided_names = info.provided_names().collect::<Vec<_>>();
			for dependent in self.dependents_in_transaction(&provided_names, &world) {
				queue.push_back((dependent, Reason::RequiresWithdrawn(name.clone()), priority - 1));
			}
		}
	}

	/// Drops members that were only pulled in for packages no longer in the transaction.
	///
	/// Returns true if anything was dropped.
	pub fn prune_orphans(&mut self) -> bool {
		let mut pruned = false;
		loop {
			let members = self.pkgs_data.keys().cloned().collect::<BTreeSet<_>>();
			let orphans = self.to_update.iter_mut()
				.chain(self.to_install.iter_mut())
				.filter_map(|(name, member)| {
					if member.required_by.is_empty() {
						return None
					}
					member.required_by.retain(|r| members.contains(r));
					member.required_by.is_empty().then(|| name.clone())
				})
				.collect::<Vec<_>>();
			if orphans.is_empty() {
				return pruned
			}
			for name in orphans {
				log::debug!("`{}` is no longer needed by anything in the transaction", name);
				self.take_member(&name);
			}
			pruned = true;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn context() -> TransactionContext {
		let mut ctx = TransactionContext::default();
		for (name, version) in [("app", "1-1"), ("lib", "1-1")] {
			ctx.installed.insert(name.to_string(), PackageInfo::new(name, PackageSource::Local, version));
			ctx.installed_versions.insert(name.to_string(), version.to_string());
		}
		let extra = PackageSource::Repository("extra".into());
		ctx.add_member(PackageInfo::new("lib", extra.clone(), "2-1"), BTreeSet::new());
		ctx.add_member(PackageInfo::new("app", extra.clone(), "2-1").with_depends(["lib>=2", "helper"]), BTreeSet::new());
		ctx.add_member(PackageInfo::new("helper", extra, "1-1"), BTreeSet::from(["app".to_string()]));
		ctx
	}

	#[test]
	fn members_are_classified_by_installed_state() {
		let ctx = context();
		assert!(ctx.to_update.contains_key("app") && ctx.to_update.contains_key("lib"));
		assert!(ctx.to_install.contains_key("helper"));
	}

	#[test]
	fn withdrawing_cascades_with_lower_priority() {
		let mut ctx = context();
		ctx.withdraw("lib", Reason::WouldBreak("other".to_string()), 0);
		assert_eq!(ctx.cannot_upgrade["lib"].priority, 0);
		assert_eq!(ctx.cannot_upgrade["app"].priority, -1);
		assert_eq!(ctx.cannot_upgrade["app"].reason, Reason::RequiresWithdrawn("lib".to_string()));
		assert!(ctx.pkgs_data.contains_key("helper"));
		assert!(ctx.prune_orphans());
		assert!(ctx.pkgs_data.is_empty());
	}

	#[test]
	fn unversioned_dependency_falls_back_to_installed() {
		let mut ctx = context();
		let extra = PackageSource::Repository("extra".into());
		ctx.add_member(PackageInfo::new("tool", extra, "1-1").with_depends(["lib"]), BTreeSet::new());
		ctx.withdraw("lib", Reason::WouldBreak("other".to_string()), 0);
		assert!(ctx.pkgs_data.contains_key("tool"));
	}
}
