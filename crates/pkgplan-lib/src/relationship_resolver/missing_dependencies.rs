use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use super::*;
use crate::metadata::MetadataLoader;
use crate::oracle::RepositoryOracle;
use crate::registry::Registry;

/// A package that has to be installed to satisfy dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPackage {
	pub info: PackageInfo,
	/// Names of the packages needing it.
	pub required_by: BTreeSet<String>,
}

/// A dependency several packages could satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousDependency {
	pub candidates: BTreeSet<PackageRef>,
	pub required_by: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingDependencies {
	/// Keyed by package name.
	pub packages: BTreeMap<String, MissingPackage>,
	/// Keyed by dependency name.
	pub ambiguous: BTreeMap<String, AmbiguousDependency>,
	/// Set when registry metadata came from installed records.
	pub offline: bool,
}

impl MissingDependencies {
	pub fn references(&self) -> Vec<PackageRef> {
		self.packages.values().map(|p| p.info.reference()).collect()
	}

	pub fn is_empty(&self) -> bool {
		self.packages.is_empty() && self.ambiguous.is_empty()
	}
}

/// Finds the packages a transaction needs on top of what's installed.
#[derive(Clone)]
pub struct DependencyResolver {
	oracle: Arc<dyn RepositoryOracle>,
	registry: Arc<dyn Registry>,
	loader: MetadataLoader,
	options: crate::PlannerOptions,
	cancellation: Cancellation,
}

impl DependencyResolver {
	pub fn new(oracle: Arc<dyn RepositoryOracle>, registry: Arc<dyn Registry>, options: crate::PlannerOptions) -> Self {
		Self {
			loader: MetadataLoader::new(oracle.clone(), registry.clone(), options.clone()),
			oracle,
			registry,
			options,
			cancellation: Cancellation::default(),
		}
	}

	pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
		self.cancellation = cancellation;
		self
	}

	/// Recursively finds every dependency of `pkgs_data` which neither the transaction nor the installed packages satisfy.
	///
	/// Packages named in `already_checked` don't have their dependencies looked at again.
	/// Neither input is modified so calling this twice gives the same answer.
	///
	/// # Errors
	/// [`crate::Error::Unresolvable`] when nothing can satisfy a dependency.
	pub async fn resolve_missing(&self, pkgs_data: &BTreeMap<String, PackageInfo>, provided: &ProvidedMap, already_checked: &BTreeSet<String>) -> crate::Result<MissingDependencies> {
		self.resolve_missing_without(pkgs_data, provided, already_checked, &BTreeSet::new()).await
	}

	/// Same as [`DependencyResolver::resolve_missing`] except installed packages named in `removed` satisfy nothing.
	pub async fn resolve_missing_without(&self, pkgs_data: &BTreeMap<String, PackageInfo>, provided: &ProvidedMap, already_checked: &BTreeSet<String>, removed: &BTreeSet<String>) -> crate::Result<MissingDependencies> {
		let mut provided = provided.clone();
		let mut checked = already_checked.clone();
		let index = self.registry.local_name_index();
		let mut out = MissingDependencies::default();

		let mut level = pkgs_data.values()
			.filter(|p| !checked.contains(&p.name))
			.cloned()
			.collect::<Vec<_>>();

		while !level.is_empty() {
			let mut wanted = BTreeMap::<Relation, BTreeSet<String>>::new();
			for package in &level {
				checked.insert(package.name.clone());
				for relation in package.required_relations() {
					if !provided.satisfies(relation) {
						wanted.entry(relation.clone()).or_default().insert(package.name.clone());
					}
				}
			}
			if wanted.is_empty() {
				break;
			}

			/* Anything installed which isn't being replaced or removed by the transaction still counts */
			let names = wanted.keys().map(|r| r.name.clone()).collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>();
			let local = self.oracle.repo_provided(&names, false).await?;
			wanted.retain(|relation, _| {
				!local.get(&relation.name).into_iter().flatten()
					.filter(|p| !pkgs_data.contains_key(&p.package) && !out.packages.contains_key(&p.package))
					.filter(|p| !removed.contains(&p.package))
					.any(|p| relation.is_satisfied_by_provision(p.provide.provided_version()))
			});

			let mut chosen = BTreeMap::<PackageRef, BTreeSet<String>>::new();
			for (relation, required_by) in wanted {
				match self.choose_provider(&relation, &index).await? {
					ProviderResolution::Resolved(reference) => {
						if pkgs_data.contains_key(&reference.name) {
							log::debug!("`{}` is only satisfied by `{}` which is already part of the transaction", relation, reference);
							continue;
						}
						chosen.entry(reference).or_default().extend(required_by);
					},
					ProviderResolution::Ambiguous(candidates) => {
						let entry = out.ambiguous.entry(relation.name.clone()).or_insert_with(|| AmbiguousDependency {
							candidates: candidates.clone(),
							required_by: BTreeSet::new(),
						});
						let common = entry.candidates.intersection(&candidates).cloned().collect::<BTreeSet<_>>();
						if !common.is_empty() {
							entry.candidates = common;
						}
						entry.required_by.extend(required_by);
					},
					ProviderResolution::Unresolved => {
						return Err(crate::Error::Unresolvable {
							name: relation.to_string(),
							required_by: required_by.into_iter().collect(),
						})
					},
				}
			}

			/* Packages found in an earlier level only collect their new requirers */
			chosen.retain(|reference, required_by| match out.packages.get_mut(&reference.name) {
				Some(existing) => {
					existing.required_by.append(required_by);
					false
				},
				None => true,
			});
			if chosen.is_empty() {
				break;
			}

			let references = chosen.keys().cloned().collect::<Vec<_>>();
			let loaded = self.loader.load(&references).await?;
			self.cancellation.check()?;
			out.offline |= loaded.offline;

			if let Some(reference) = loaded.unavailable.iter().next() {
				return Err(crate::Error::Unresolvable {
					name: reference.name.clone(),
					required_by: chosen.get(reference).into_iter().flatten().cloned().collect(),
				})
			}

			level = Vec::with_capacity(chosen.len());
			for (reference, required_by) in chosen {
				let Some(info) = loaded.packages.get(&reference.name) else { continue };
				log::debug!("`{}` is needed by {:?}", reference, required_by);
				provided.add_package(info);
				out.packages.insert(reference.name.clone(), MissingPackage { info: info.clone(), required_by });
				level.push(info.clone());
			}
		}

		Ok(out)
	}

	/// Looks for packages able to satisfy `relation` in the repositories first and then the registry.
	pub async fn choose_provider(&self, relation: &Relation, registry_index: &HashSet<String>) -> crate::Result<ProviderResolution> {
		let name = relation.name.clone();
		let mut candidates = BTreeMap::<PackageRef, Option<String>>::new();

		let remote = self.oracle.repo_provided(std::slice::from_ref(&name), true).await?;
		for p in remote.get(&name).into_iter().flatten() {
			if let Some(repo) = &p.repository {
				candidates.insert(PackageRef::repository(repo.clone(), p.package.clone()), p.provide.provided_version().map(str::to_string));
			}
		}

		if candidates.is_empty() {
			if let Some(repo) = self.oracle.guess_repository(&name).await? {
				let version = self.oracle.package_info(std::slice::from_ref(&name), true).await?
					.remove(&name)
					.map(|info| info.version);
				candidates.insert(PackageRef::repository(repo, name.clone()), version);
			}
		}

		if registry_index.contains(&name) && (candidates.is_empty() || !self.options.prefer_repository_provider()) {
			candidates.insert(PackageRef::registry(name.clone()), None);
		}

		if relation.is_versioned() && candidates.len() > 1 {
			/* The registry index has no versions, those candidates get the benefit of the doubt */
			candidates.retain(|reference, version| {
				(reference.is_registry() && version.is_none()) || relation.is_satisfied_by_provision(version.as_deref())
			});
		}

		let mut candidates = candidates.into_keys().collect::<BTreeSet<_>>();
		Ok(match candidates.len() {
			0 => ProviderResolution::Unresolved,
			1 => match candidates.pop_first() {
				Some(only) => ProviderResolution::Resolved(only),
				None => ProviderResolution::Unresolved,
			},
			_ => {
				/* Repository sources order before the registry so the first exact match is preferred */
				let exact = candidates.iter().find(|c| c.name == name).cloned();
				match exact {
					Some(exact) if self.options.automatch_providers() => ProviderResolution::Resolved(exact),
					_ => ProviderResolution::Ambiguous(candidates),
				}
			},
		})
	}
}
