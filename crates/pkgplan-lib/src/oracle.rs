//! Query surface over the installed package database and the binary repositories.
//!
//! The planner never reads the databases itself, everything goes through a [`RepositoryOracle`]
//! supplied by the caller.

use std::collections::{HashMap, HashSet};
use async_trait::async_trait;

use crate::package::*;

/// One package offering a name, as reported by [`RepositoryOracle::repo_provided`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedBy {
	pub package: String,
	/// `None` for installed packages which aren't in any known repository.
	pub repository: Option<String>,
	/// The provide expression as declared, self-provision is `name=version`.
	pub provide: Relation,
}

impl ProvidedBy {
	pub fn reference(&self) -> PackageRef {
		match &self.repository {
			Some(repo) => PackageRef::repository(repo.clone(), self.package.clone()),
			None => PackageRef::local(self.package.clone()),
		}
	}
}

#[async_trait]
pub trait RepositoryOracle: Send + Sync {
	/// Name and version of every installed package.
	async fn installed_versions(&self) -> crate::Result<HashMap<String, String>>;

	/// Every package providing any of `names`, keyed by the provided name.
	///
	/// When `remote` is false only installed packages are considered.
	async fn repo_provided(&self, names: &[String], remote: bool) -> crate::Result<HashMap<String, Vec<ProvidedBy>>>;

	/// Metadata of the named packages. With `remote` false the records come from the installed database
	/// and have [`PackageSource::Local`] as their source.
	async fn package_info(&self, names: &[String], remote: bool) -> crate::Result<HashMap<String, PackageInfo>>;

	/// The repository a package would be installed from.
	async fn guess_repository(&self, name: &str) -> crate::Result<Option<String>>;

	async fn installed_size(&self, names: &[String]) -> crate::Result<HashMap<String, u64>>;

	/// Names of the packages depending on each of `names`.
	async fn required_by(&self, names: &[String], remote: bool) -> crate::Result<HashMap<String, HashSet<String>>>;

	async fn repo_depends(&self, names: &[String], remote: bool) -> crate::Result<HashMap<String, Vec<Relation>>> {
		Ok(self.package_info(names, remote).await?
			.into_iter()
			.map(|(name, info)| (name, info.depends))
			.collect())
	}

	async fn repo_conflicts(&self, names: &[String], remote: bool) -> crate::Result<HashMap<String, Vec<Relation>>> {
		Ok(self.package_info(names, remote).await?
			.into_iter()
			.map(|(name, info)| (name, info.conflicts))
			.collect())
	}
}
