//! Fetching package metadata from the repositories and the registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::package::*;
use crate::registry::{Registry, RegistryPackage, SourceInfo};
use crate::oracle::RepositoryOracle;
use crate::Error;

#[derive(Debug, Clone, Default)]
pub struct LoadedMetadata {
	/// Fetched records keyed by package name.
	pub packages: BTreeMap<String, PackageInfo>,
	/// Requested packages nobody had metadata for.
	pub unavailable: BTreeSet<PackageRef>,
	/// The registry couldn't be reached, registry records may come from the installed database.
	pub offline: bool,
}

#[derive(Clone)]
pub struct MetadataLoader {
	oracle: Arc<dyn RepositoryOracle>,
	registry: Arc<dyn Registry>,
	options: crate::PlannerOptions,
}

impl MetadataLoader {
	pub fn new(oracle: Arc<dyn RepositoryOracle>, registry: Arc<dyn Registry>, options: crate::PlannerOptions) -> Self {
		Self { oracle, registry, options }
	}

	/// Loads every package in `packages`.
	///
	/// Repository packages are fetched in one call, registry packages are fetched concurrently.
	/// Registry failures don't fail the load, they set [`LoadedMetadata::offline`] instead.
	pub async fn load(&self, packages: &[PackageRef]) -> crate::Result<LoadedMetadata> {
		let mut loaded = LoadedMetadata::default();

		let repo_refs = packages.iter().filter(|r| matches!(r.source, PackageSource::Repository(_))).collect::<Vec<_>>();
		let registry_names = packages.iter()
			.filter(|r| r.is_registry())
			.map(|r| r.name.clone())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect::<Vec<_>>();

		if !repo_refs.is_empty() {
			let names = repo_refs.iter().map(|r| r.name.clone()).collect::<Vec<_>>();
			let mut found = self.oracle.package_info(&names, true).await?;
			for r in repo_refs {
				match found.remove(&r.name) {
					Some(info) => { loaded.packages.insert(r.name.clone(), info.with_source(r.source.clone())); },
					None => { loaded.unavailable.insert(r.clone()); },
				}
			}
		}

		if !registry_names.is_empty() {
			let fetched = match self.registry_info(&registry_names).await {
				Ok(fetched) => fetched,
				Err(e) if e.is_recoverable() => {
					log::warn!("Registry unavailable, falling back to installed records: {}", e);
					loaded.offline = true;
					HashMap::new()
				},
				Err(e) => return Err(e),
			};

			let mut missing = Vec::new();
			for name in registry_names {
				match fetched.get(&name) {
					Some(info) => { loaded.packages.insert(name, info.clone()); },
					None => missing.push(name),
				}
			}

			if loaded.offline && !missing.is_empty() {
				let mut local = self.oracle.package_info(&missing, false).await?;
				missing.retain(|name| match local.remove(name) {
					Some(info) => {
						log::debug!("Using installed record for registry package `{}`", name);
						loaded.packages.insert(name.clone(), info.with_source(PackageSource::Registry));
						false
					},
					None => true,
				});
			}

			loaded.unavailable.extend(missing.into_iter().map(PackageRef::registry));
		}

		Ok(loaded)
	}

	/// Bulk info per chunk, then source info per package base, both bounded by `registry_concurrency`.
	async fn registry_info(&self, names: &[String]) -> crate::Result<HashMap<String, PackageInfo>> {
		let semaphore = Arc::new(Semaphore::new(self.options.registry_concurrency()));

		let mut set = JoinSet::new();
		for chunk in names.chunks(self.options.registry_chunk_size()) {
			let chunk = chunk.to_vec();
			let registry = self.registry.clone();
			let semaphore = semaphore.clone();
			set.spawn(async move {
				let _permit = semaphore.acquire_owned().await.map_err(|e| Error::Registry(e.to_string()))?;
				registry.bulk_info(&chunk).await
			});
		}

		let mut records = Vec::<RegistryPackage>::new();
		while let Some(result) = set.join_next().await {
			records.extend(result??);
		}

		let mut bases = BTreeMap::<String, Vec<String>>::new();
		for r in &records {
			bases.entry(r.package_base.clone()).or_default().push(r.name.clone());
		}
		let mut packages = records.into_iter()
			.map(|r| (r.name.clone(), PackageInfo::from(r)))
			.collect::<HashMap<_, _>>();

		if !self.options.use_source_info() {
			return Ok(packages)
		}

		let mut set = JoinSet::new();
		for base in bases.keys().cloned() {
			let registry = self.registry.clone();
			let semaphore = semaphore.clone();
			set.spawn(async move {
				let permit = semaphore.acquire_owned().await;
				let result = match permit {
					Ok(_permit) => registry.source_info(&base).await,
					Err(e) => Err(Error::Registry(e.to_string())),
				};
				(base, result)
			});
		}

		let mut source_infos = Vec::<SourceInfo>::new();
		while let Some(joined) = set.join_next().await {
			match joined? {
				(_, Ok(info)) => source_infos.push(info),
				/* The RPC record is still usable without it */
				(base, Err(e)) => log::debug!("No source info for `{}`: {}", base, e),
			}
		}

		for source_info in source_infos {
			for name in bases.get(&source_info.package_base).into_iter().flatten() {
				if let Some(info) = packages.get_mut(name) {
					source_info.apply_to(info, self.options.architecture());
				}
			}
		}

		Ok(packages)
	}
}
