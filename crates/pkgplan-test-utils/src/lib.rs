//! Various helpers for testing the planner without a real package database or registry.
//!
//! Everything here keeps its data in memory and answers deterministically.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;

use pkgplan::package::*;
use pkgplan::oracle::{ProvidedBy, RepositoryOracle};
use pkgplan::registry::{Registry, RegistryPackage, SourceInfo};
use pkgplan::relationship_resolver::{Cancellation, ProviderSelector, UpgradePlanner, UpgradeRequirement};

/// Installs a logger which plays nicely with the test harness. Safe to call more than once.
pub fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}

pub fn repo_pkg(repository: &str, name: &str, version: &str) -> PackageInfo {
	PackageInfo::new(name, PackageSource::Repository(repository.to_string()), version)
}

pub fn local_pkg(name: &str, version: &str) -> PackageInfo {
	PackageInfo::new(name, PackageSource::Local, version)
}

pub fn registry_pkg(name: &str, version: &str) -> PackageInfo {
	PackageInfo::new(name, PackageSource::Registry, version)
}

/// Package names of a plan list, in order.
pub fn names(requirements: &[UpgradeRequirement]) -> Vec<&str> {
	requirements.iter().map(|r| r.package.name.as_str()).collect()
}

pub fn find<'a>(requirements: &'a [UpgradeRequirement], name: &str) -> Option<&'a UpgradeRequirement> {
	requirements.iter().find(|r| r.package.name == name)
}

pub fn planner(oracle: MemoryOracle, registry: MemoryRegistry, options: pkgplan::PlannerOptions) -> UpgradePlanner {
	UpgradePlanner::new(Arc::new(oracle), Arc::new(registry), options)
}

/// An installed package database plus the binary repositories.
#[derive(Debug, Default, Clone)]
pub struct MemoryOracle {
	installed: BTreeMap<String, PackageInfo>,
	available: BTreeMap<String, PackageInfo>,
}

impl MemoryOracle {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an installed package, its source is replaced with [`PackageSource::Local`].
	pub fn installed(mut self, info: PackageInfo) -> Self {
		self.installed.insert(info.name.clone(), info.with_source(PackageSource::Local));
		self
	}

	/// Adds a package to the repositories, `info` should have a [`PackageSource::Repository`] source.
	pub fn available(mut self, info: PackageInfo) -> Self {
		self.available.insert(info.name.clone(), info);
		self
	}

	fn database(&self, remote: bool) -> &BTreeMap<String, PackageInfo> {
		if remote { &self.available } else { &self.installed }
	}

	fn repository_of(&self, name: &str) -> Option<String> {
		match self.available.get(name).map(|p| &p.source) {
			Some(PackageSource::Repository(repo)) => Some(repo.clone()),
			_ => None,
		}
	}
}

#[async_trait]
impl RepositoryOracle for MemoryOracle {
	async fn installed_versions(&self) -> pkgplan::Result<HashMap<String, String>> {
		Ok(self.installed.values().map(|p| (p.name.clone(), p.version.clone())).collect())
	}

	async fn repo_provided(&self, names: &[String], remote: bool) -> pkgplan::Result<HashMap<String, Vec<ProvidedBy>>> {
		let mut out = HashMap::<String, Vec<ProvidedBy>>::new();
		for package in self.database(remote).values() {
			let repository = if remote {
				match &package.source {
					PackageSource::Repository(repo) => Some(repo.clone()),
					_ => None,
				}
			} else {
				self.repository_of(&package.name)
			};

			let provisions = std::iter::once(Relation::versioned(package.name.clone(), VersionOperator::Eq, package.version.clone()))
				.chain(package.provides.iter().cloned());
			for provide in provisions.filter(|p| names.contains(&p.name)) {
				out.entry(provide.name.clone()).or_default().push(ProvidedBy {
					package: package.name.clone(),
					repository: repository.clone(),
					provide,
				});
			}
		}
		Ok(out)
	}

	async fn package_info(&self, names: &[String], remote: bool) -> pkgplan::Result<HashMap<String, PackageInfo>> {
		let database = self.database(remote);
		Ok(names.iter().filter_map(|n| database.get(n).map(|p| (n.clone(), p.clone()))).collect())
	}

	async fn guess_repository(&self, name: &str) -> pkgplan::Result<Option<String>> {
		Ok(self.repository_of(name))
	}

	async fn installed_size(&self, names: &[String]) -> pkgplan::Result<HashMap<String, u64>> {
		Ok(names.iter().filter_map(|n| self.installed.get(n).map(|p| (n.clone(), p.installed_size))).collect())
	}

	async fn required_by(&self, names: &[String], remote: bool) -> pkgplan::Result<HashMap<String, HashSet<String>>> {
		let database = self.database(remote);
		let mut out = HashMap::new();
		for name in names {
			let provided = match database.get(name) {
				Some(p) => p.provided_names().map(str::to_string).collect::<Vec<_>>(),
				None => vec![name.clone()],
			};
			let users = database.values()
				.filter(|p| &p.name != name && p.depends.iter().any(|d| provided.contains(&d.name)))
				.map(|p| p.name.clone())
				.collect::<HashSet<_>>();
			out.insert(name.clone(), users);
		}
		Ok(out)
	}
}

/// A registry which can be switched offline.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
	packages: BTreeMap<String, PackageInfo>,
	index_only: HashSet<String>,
	offline: AtomicBool,
	bulk_calls: AtomicUsize,
	cancel_on_fetch: Option<Cancellation>,
}

impl MemoryRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a package, its source is replaced with [`PackageSource::Registry`].
	pub fn package(mut self, info: PackageInfo) -> Self {
		self.packages.insert(info.name.clone(), info.with_source(PackageSource::Registry));
		self
	}

	/// Puts a name in the name index without any metadata behind it.
	pub fn index_name(mut self, name: &str) -> Self {
		self.index_only.insert(name.to_string());
		self
	}

	pub fn offline(self) -> Self {
		self.set_offline(true);
		self
	}

	/// Triggers `cancellation` from inside `bulk_info`, the answer still goes out.
	pub fn cancel_on_fetch(mut self, cancellation: Cancellation) -> Self {
		self.cancel_on_fetch = Some(cancellation);
		self
	}

	pub fn set_offline(&self, offline: bool) {
		self.offline.store(offline, Ordering::SeqCst);
	}

	/// Number of `bulk_info` calls answered so far.
	pub fn bulk_calls(&self) -> usize {
		self.bulk_calls.load(Ordering::SeqCst)
	}

	fn check_online(&self) -> pkgplan::Result<()> {
		if self.offline.load(Ordering::SeqCst) {
			Err(pkgplan::Error::Registry("registry offline".to_string()))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl Registry for MemoryRegistry {
	async fn search(&self, query: &str) -> pkgplan::Result<Vec<RegistryPackage>> {
		self.check_online()?;
		Ok(self.packages.values().filter(|p| p.name.contains(query)).map(RegistryPackage::from).collect())
	}

	async fn bulk_info(&self, names: &[String]) -> pkgplan::Result<Vec<RegistryPackage>> {
		self.check_online()?;
		self.bulk_calls.fetch_add(1, Ordering::SeqCst);
		if let Some(cancellation) = &self.cancel_on_fetch {
			cancellation.cancel();
		}
		Ok(names.iter().filter_map(|n| self.packages.get(n)).map(RegistryPackage::from).collect())
	}

	async fn source_info(&self, package_base: &str) -> pkgplan::Result<SourceInfo> {
		self.check_online()?;
		let Some(package) = self.packages.get(package_base) else {
			return Err(pkgplan::Error::Registry(format!("no package base `{}`", package_base)))
		};

		let (epoch, rest) = package.version.split_once(':').unwrap_or(("0", package.version.as_str()));
		let (pkgver, pkgrel) = rest.rsplit_once('-').unwrap_or((rest, "1"));
		let mut text = format!("pkgbase = {}\n\tpkgver = {}\n\tpkgrel = {}\n\tepoch = {}\n", package.name, pkgver, pkgrel, epoch);
		for (key, relations) in [
			("depends", &package.depends),
			("makedepends", &package.make_depends),
			("checkdepends", &package.check_depends),
			("provides", &package.provides),
			("conflicts", &package.conflicts),
		] {
			for r in relations {
				text.push_str(&format!("\t{} = {}\n", key, r));
			}
		}
		text.push_str(&format!("\npkgname = {}\n", package.name));
		SourceInfo::parse(&text)
	}

	fn local_name_index(&self) -> Arc<HashSet<String>> {
		Arc::new(self.packages.keys().cloned().chain(self.index_only.iter().cloned()).collect())
	}
}

/// Answers provider questions from a fixed table and remembers what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedSelector {
	answers: BTreeMap<String, PackageRef>,
	requests: Mutex<Vec<BTreeMap<String, BTreeSet<PackageRef>>>>,
}

impl ScriptedSelector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn answer(mut self, dependency: &str, provider: PackageRef) -> Self {
		self.answers.insert(dependency.to_string(), provider);
		self
	}

	pub fn requests(&self) -> Vec<BTreeMap<String, BTreeSet<PackageRef>>> {
		self.requests.lock().map(|r| r.clone()).unwrap_or_default()
	}
}

#[async_trait]
impl ProviderSelector for ScriptedSelector {
	async fn request_provider_selection(&self, candidates: &BTreeMap<String, BTreeSet<PackageRef>>) -> Option<BTreeMap<String, PackageRef>> {
		if let Ok(mut requests) = self.requests.lock() {
			requests.push(candidates.clone());
		}
		Some(candidates.keys()
			.filter_map(|k| self.answers.get(k).map(|a| (k.clone(), a.clone())))
			.collect())
	}
}

/// Always picks the first candidate.
#[derive(Debug, Default)]
pub struct FirstChoiceSelector;

#[async_trait]
impl ProviderSelector for FirstChoiceSelector {
	async fn request_provider_selection(&self, candidates: &BTreeMap<String, BTreeSet<PackageRef>>) -> Option<BTreeMap<String, PackageRef>> {
		Some(candidates.iter()
			.filter_map(|(k, c)| c.iter().next().map(|first| (k.clone(), first.clone())))
			.collect())
	}
}

/// Refuses every question, like a user closing the dialog.
#[derive(Debug, Default)]
pub struct DeclineSelector;

#[async_trait]
impl ProviderSelector for DeclineSelector {
	async fn request_provider_selection(&self, _candidates: &BTreeMap<String, BTreeSet<PackageRef>>) -> Option<BTreeMap<String, PackageRef>> {
		None
	}
}
