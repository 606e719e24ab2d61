use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use super::*;

/// A single package offering a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provision<'a> {
	pub provider: &'a PackageRef,
	/// `None` when the package provides the name without stating a version.
	pub version: Option<&'a str>,
}

/// Maps every name available in a resolution to the packages providing it.
///
/// Every package added also provides its own name at its own version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedMap {
	by_name: BTreeMap<String, BTreeMap<PackageRef, Option<String>>>,
}

impl ProvidedMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_packages<'a>(packages: impl IntoIterator<Item = &'a PackageInfo>) -> Self {
		let mut map = Self::new();
		for package in packages {
			map.add_package(package);
		}
		map
	}

	/// Adds the package and everything it provides, replacing earlier entries for the same reference.
	pub fn add_package(&mut self, package: &PackageInfo) {
		let reference = package.reference();
		self.remove_package(&reference);

		self.by_name.entry(package.name.clone()).or_default()
			.insert(reference.clone(), Some(package.version.clone()));
		for p in &package.provides {
			/* A package providing its own name doesn't get to override its real version */
			if p.name == package.name {
				continue;
			}
			self.by_name.entry(p.name.clone()).or_default()
				.insert(reference.clone(), p.provided_version().map(str::to_string));
		}
	}

	/// Adds `package` after removing any package with the same name from another source.
	pub fn replace_package(&mut self, package: &PackageInfo) {
		self.remove_by_package_name(&package.name);
		self.add_package(package);
	}

	pub fn remove_package(&mut self, reference: &PackageRef) {
		self.by_name.retain(|_, providers| {
			providers.remove(reference);
			!providers.is_empty()
		});
	}

	/// Removes every package called `name` regardless of where it came from.
	pub fn remove_by_package_name(&mut self, name: &str) {
		self.by_name.retain(|_, providers| {
			providers.retain(|r, _| r.name != name);
			!providers.is_empty()
		});
	}

	pub fn providers(&self, name: &str) -> impl Iterator<Item = Provision<'_>> {
		self.by_name.get(name)
			.into_iter()
			.flat_map(|providers| providers.iter())
			.map(|(provider, version)| Provision { provider, version: version.as_deref() })
	}

	/// Every package whose provision of `relation.name` satisfies the relation.
	pub fn providers_matching(&self, relation: &Relation) -> Vec<&PackageRef> {
		self.providers(&relation.name)
			.filter(|p| relation.is_satisfied_by_provision(p.version))
			.map(|p| p.provider)
			.collect()
	}

	pub fn satisfies(&self, relation: &Relation) -> bool {
		self.providers(&relation.name).any(|p| relation.is_satisfied_by_provision(p.version))
	}
}
