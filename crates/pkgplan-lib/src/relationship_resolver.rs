//! Working out what has to change on the system for a set of packages to be installed or upgraded.
//!
//! # Usage
//! 1. Create an [`UpgradePlanner`] from a [`RepositoryOracle`](crate::RepositoryOracle), a [`Registry`](crate::Registry) and [`PlannerOptions`](crate::PlannerOptions).
//! 1. Call [`UpgradePlanner::summarize()`] with the requested packages and a [`ProviderSelector`]
//! which is asked when several packages could satisfy a dependency.
//! 1. Present the returned [`UpgradeRequirements`] to the user.
//!
//! The individual stages are usable on their own, see [`DependencyResolver`], [`find_conflicts`] and [`install_order::sort`].

use std::collections::{BTreeMap, BTreeSet};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::package::*;

mod missing_dependencies;
pub use missing_dependencies::DependencyResolver;
pub use missing_dependencies::MissingDependencies;
pub use missing_dependencies::MissingPackage;
pub use missing_dependencies::AmbiguousDependency;

mod conflicts;
pub use conflicts::find_conflicts;
pub use conflicts::ConflictReport;

mod transaction;
pub use transaction::Reason;
pub use transaction::UpgradeRequirement;
pub use transaction::UpgradeRequirements;

mod planner;
pub use planner::UpgradePlanner;

pub mod install_order;

/// Outcome of looking for packages able to satisfy a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResolution {
	Resolved(PackageRef),
	/// More than one package fits and nothing says which to pick.
	Ambiguous(BTreeSet<PackageRef>),
	/// Neither the repositories nor the registry have anything.
	Unresolved,
}

/// Asks the user which package should satisfy a dependency.
#[async_trait]
pub trait ProviderSelector: Send + Sync {
	/// `candidates` maps each dependency to the packages able to satisfy it.
	///
	/// Returning `None`, or leaving a dependency out of the selection, abandons
	/// every package that needed it without failing the rest of the transaction.
	async fn request_provider_selection(&self, candidates: &BTreeMap<String, BTreeSet<PackageRef>>) -> Option<BTreeMap<String, PackageRef>>;
}

/// Lets the caller stop a resolution between steps.
///
/// Fetches already in flight are allowed to finish. Clones share the same token.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(CancellationToken);

impl Cancellation {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.is_cancelled()
	}

	pub fn check(&self) -> crate::Result<()> {
		if self.is_cancelled() {
			Err(crate::Error::Cancelled)
		} else {
			Ok(())
		}
	}
}

