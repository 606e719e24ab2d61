//! Various types associated with packages.

use serde::{Serialize, Deserialize};

pub mod version;
pub use version::VersionOperator;
pub use version::NormalizedVersion;

mod relationship;
pub use relationship::Relation;
pub use relationship::VersionConstraint;

mod provided;
pub use provided::ProvidedMap;
pub use provided::Provision;

/// Where a package comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackageSource {
	/// A binary repository, by name.
	Repository(String),
	/// The source build registry.
	Registry,
	/// The installed package database. Never part of a transaction.
	Local,
}

impl PackageSource {
	pub fn is_registry(&self) -> bool {
		matches!(self, PackageSource::Registry)
	}
}

impl std::fmt::Display for PackageSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PackageSource::Repository(repo) => f.write_str(repo),
			PackageSource::Registry => f.write_str("registry"),
			PackageSource::Local => f.write_str("local"),
		}
	}
}

/// Identifies a package within a resolution.
///
/// The same name from two sources is two different packages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageRef {
	pub name: String,
	pub source: PackageSource,
}

impl PackageRef {
	pub fn new(name: impl Into<String>, source: PackageSource) -> Self {
		Self { name: name.into(), source }
	}

	pub fn repository(repository: impl Into<String>, name: impl Into<String>) -> Self {
		Self::new(name, PackageSource::Repository(repository.into()))
	}

	pub fn registry(name: impl Into<String>) -> Self {
		Self::new(name, PackageSource::Registry)
	}

	pub fn local(name: impl Into<String>) -> Self {
		Self::new(name, PackageSource::Local)
	}

	pub fn is_registry(&self) -> bool {
		self.source.is_registry()
	}
}

impl std::fmt::Display for PackageRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.source, self.name)
	}
}

impl AsRef<PackageRef> for PackageRef {
	fn as_ref(&self) -> &PackageRef {
		self
	}
}

/// Metadata of a single package as reported by its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
	pub name: String,
	pub source: PackageSource,
	pub version: String,
	pub description: String,
	pub depends: Vec<Relation>,
	/// Build time dependencies, only registry packages have these.
	pub make_depends: Vec<Relation>,
	pub check_depends: Vec<Relation>,
	pub provides: Vec<Relation>,
	pub conflicts: Vec<Relation>,
	pub download_size: u64,
	pub installed_size: u64,
}

impl PackageInfo {
	pub fn new(name: impl Into<String>, source: PackageSource, version: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			source,
			version: version.into(),
			description: String::new(),
			depends: Vec::new(),
			make_depends: Vec::new(),
			check_depends: Vec::new(),
			provides: Vec::new(),
			conflicts: Vec::new(),
			download_size: 0,
			installed_size: 0,
		}
	}

	pub fn reference(&self) -> PackageRef {
		PackageRef::new(self.name.clone(), self.source.clone())
	}

	pub fn with_depends<'a>(mut self, depends: impl IntoIterator<Item = &'a str>) -> Self {
		self.depends.extend(depends.into_iter().map(Relation::parse));
		self
	}

	pub fn with_make_depends<'a>(mut self, depends: impl IntoIterator<Item = &'a str>) -> Self {
		self.make_depends.extend(depends.into_iter().map(Relation::parse));
		self
	}

	pub fn with_provides<'a>(mut self, provides: impl IntoIterator<Item = &'a str>) -> Self {
		self.provides.extend(provides.into_iter().map(Relation::parse));
		self
	}

	pub fn with_conflicts<'a>(mut self, conflicts: impl IntoIterator<Item = &'a str>) -> Self {
		self.conflicts.extend(conflicts.into_iter().map(Relation::parse));
		self
	}

	pub fn with_sizes(mut self, download_size: u64, installed_size: u64) -> Self {
		self.download_size = download_size;
		self.installed_size = installed_size;
		self
	}

	pub fn with_source(mut self, source: PackageSource) -> Self {
		self.source = source;
		self
	}

	/// Every relation which has to be satisfied before the package can be installed.
	///
	/// Registry packages are built locally so their build dependencies count too.
	pub fn required_relations(&self) -> impl Iterator<Item = &Relation> {
		self.depends.iter()
			.chain(self.make_depends.iter())
			.chain(self.check_depends.iter())
	}

	/// The package's own name followed by every name it provides.
	pub fn provided_names(&self) -> impl Iterator<Item = &str> {
		std::iter::once(self.name.as_str()).chain(self.provides.iter().map(|p| p.name.as_str()))
	}

	/// Checks if this package satisfies `relation`, either directly or through `provides`.
	pub fn satisfies(&self, relation: &Relation) -> bool {
		if self.name == relation.name && relation.is_satisfied_by(&self.version) {
			return true
		}
		self.provides.iter()
			.filter(|p| p.name == relation.name)
			.any(|p| relation.is_satisfied_by_provision(p.provided_version()))
	}
}
