use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::*;
use super::transaction::{Blocked, TransactionContext};
use crate::metadata::MetadataLoader;
use crate::oracle::RepositoryOracle;
use crate::registry::Registry;
use crate::Error;

mod removal;

/// Plans a transaction installing or upgrading a set of packages.
///
/// A planner holds no state between calls, each [`UpgradePlanner::summarize`] starts from scratch.
#[derive(Clone)]
pub struct UpgradePlanner {
	oracle: Arc<dyn RepositoryOracle>,
	registry: Arc<dyn Registry>,
	options: crate::PlannerOptions,
}

impl UpgradePlanner {
	pub fn new(oracle: Arc<dyn RepositoryOracle>, registry: Arc<dyn Registry>, options: crate::PlannerOptions) -> Self {
		Self { oracle, registry, options }
	}

	/// Works out everything that has to change for `requested` to be installed or upgraded.
	///
	/// `selector` is asked whenever several packages could satisfy a dependency.
	///
	/// # Returns
	/// - `Ok(Some(_))` with the plan.
	/// - `Ok(None)` if `cancellation` was triggered.
	/// - [`Error::Unresolvable`] if a dependency can't be satisfied by anything.
	pub async fn summarize(&self, requested: &[PackageRef], selector: &dyn ProviderSelector, cancellation: &Cancellation) -> crate::Result<Option<UpgradeRequirements>> {
		match self.plan(requested, selector, cancellation).await {
			Ok(plan) => Ok(Some(plan)),
			Err(Error::Cancelled) => {
				log::info!("Transaction planning cancelled");
				Ok(None)
			},
			Err(e) => Err(e),
		}
	}

	async fn plan(&self, requested: &[PackageRef], selector: &dyn ProviderSelector, cancellation: &Cancellation) -> crate::Result<UpgradeRequirements> {
		let loader = MetadataLoader::new(self.oracle.clone(), self.registry.clone(), self.options.clone());
		let resolver = DependencyResolver::new(self.oracle.clone(), self.registry.clone(), self.options.clone())
			.with_cancellation(cancellation.clone());
		let mut ctx = TransactionContext::default();

		ctx.installed_versions = self.oracle.installed_versions().await?;
		let mut installed_names = ctx.installed_versions.keys().cloned().collect::<Vec<_>>();
		installed_names.sort();
		ctx.installed = self.oracle.package_info(&installed_names, false).await?.into_iter().collect();
		cancellation.check()?;

		/* Requested packages */
		let loaded = loader.load(requested).await?;
		for reference in loaded.unavailable {
			if reference.is_registry() && loaded.offline {
				log::warn!("No information about `{}` while the registry is unreachable", reference);
				ctx.cannot_upgrade.insert(reference.name.clone(), Blocked { reference, reason: Reason::MetadataUnavailable, priority: 0 });
			} else {
				return Err(Error::Unresolvable { name: reference.name, required_by: Vec::new() })
			}
		}
		for info in loaded.packages.into_values() {
			ctx.add_member(info, BTreeSet::new());
		}
		cancellation.check()?;

		apply_conflicts(&mut ctx);

		self.resolve_dependencies(&mut ctx, &resolver, &loader, selector, cancellation).await?;
		apply_conflicts(&mut ctx);
		cancellation.check()?;

		if self.options.check_dependency_breakage() {
			self.check_breakage(&mut ctx).await?;
		}

		removal::settle(&mut ctx, self.oracle.as_ref()).await?;
		cancellation.check()?;

		self.finalize(ctx).await
	}

	/// Pulls in missing dependencies until nothing is missing, asking `selector` about ambiguous ones.
	async fn resolve_dependencies(&self, ctx: &mut TransactionContext, resolver: &DependencyResolver, loader: &MetadataLoader, selector: &dyn ProviderSelector, cancellation: &Cancellation) -> crate::Result<()> {
		loop {
			let removed = ctx.to_remove.keys().cloned().collect::<BTreeSet<_>>();
			let missing = resolver.resolve_missing_without(&ctx.pkgs_data, &ctx.provided, &ctx.checked, &removed).await?;
			ctx.checked.extend(ctx.pkgs_data.keys().cloned());
			for (name, package) in missing.packages {
				ctx.add_member(package.info, package.required_by);
				ctx.checked.insert(name);
			}

			let ambiguous = missing.ambiguous.into_iter()
				.filter(|(_, a)| a.required_by.iter().any(|r| ctx.is_member(r)))
				.collect::<BTreeMap<_, _>>();
			if ambiguous.is_empty() {
				return Ok(())
			}

			let candidates = ambiguous.iter()
				.map(|(dependency, a)| (dependency.clone(), a.candidates.clone()))
				.collect::<BTreeMap<_, _>>();
			let selection = selector.request_provider_selection(&candidates).await.unwrap_or_default();
			cancellation.check()?;

			let mut chosen = Vec::new();
			let mut abandoned = Vec::new();
			for (dependency, a) in ambiguous {
				match selection.get(&dependency).filter(|r| a.candidates.contains(*r)) {
					Some(reference) => chosen.push((dependency, reference.clone(), a.required_by)),
					None => abandoned.push((dependency, a.required_by)),
				}
			}

			if !chosen.is_empty() {
				let references = chosen.iter().map(|(_, r, _)| r.clone()).collect::<Vec<_>>();
				let loaded = loader.load(&references).await?;
				for (dependency, reference, required_by) in chosen {
					match loaded.packages.get(&reference.name) {
						Some(info) if !ctx.is_member(&info.name) => {
							log::debug!("`{}` selected for `{}`", reference, dependency);
							ctx.add_member(info.clone(), required_by);
						},
						Some(_) => {
							if let Some(member) = ctx.to_install.get_mut(&reference.name).or(ctx.to_update.get_mut(&reference.name)) {
								member.required_by.extend(required_by);
							}
						},
						None => abandoned.push((dependency, required_by)),
					}
				}
			}

			for (dependency, required_by) in abandoned {
				log::warn!("No provider for `{}`, abandoning {:?}", dependency, required_by);
				for name in required_by {
					ctx.withdraw(&name, Reason::ProviderNotSelected(dependency.clone()), 0);
				}
			}
		}
	}

	/// Withdraws members whose new version stops an installed package's dependency from being satisfied.
	async fn check_breakage(&self, ctx: &mut TransactionContext) -> crate::Result<()> {
		let before = ProvidedMap::from_packages(ctx.installed.values());

		loop {
			let members = ctx.pkgs_data.keys().cloned().collect::<Vec<_>>();
			if members.is_empty() {
				return Ok(())
			}
			let dependents = self.oracle.required_by(&members, false).await?;
			let world = ctx.world();

			let mut broken = BTreeMap::<String, String>::new();
			for (target, users) in &dependents {
				let Some(info) = ctx.pkgs_data.get(target) else { continue };
				let mut names = info.provided_names().collect::<BTreeSet<_>>();
				if let Some(old) = ctx.installed.get(target) {
					names.extend(old.provided_names());
				}

				let mut users = users.iter().collect::<Vec<_>>();
				users.sort();
				for user in users {
					if ctx.is_member(user) || ctx.to_remove.contains_key(user) {
						continue;
					}
					let Some(record) = ctx.installed.get(user) else { continue };
					let breaks = record.depends.iter()
						.filter(|r| names.contains(r.name.as_str()))
						.any(|r| before.satisfies(r) && !world.satisfies(r));
					if breaks {
						broken.entry(target.clone()).or_insert_with(|| user.clone());
					}
				}
			}

			if broken.is_empty() {
				return Ok(())
			}
			for (target, user) in broken {
				log::info!("Upgrading `{}` would break `{}`", target, user);
				ctx.withdraw(&target, Reason::WouldBreak(user), 0);
			}
		}
	}

	async fn finalize(&self, ctx: TransactionContext) -> crate::Result<UpgradeRequirements> {
		let sized = ctx.to_update.keys().chain(ctx.to_remove.keys()).cloned().collect::<Vec<_>>();
		let installed_sizes = self.oracle.installed_size(&sized).await?;
		let old_size = |name: &str| installed_sizes.get(name).copied().unwrap_or(0) as i64;

		let required_by_reason = |required_by: &BTreeSet<String>| {
			let members = required_by.iter().filter(|r| ctx.is_member(r)).cloned().collect::<BTreeSet<_>>();
			(!members.is_empty()).then(|| Reason::RequiredBy(members))
		};

		let mut plan = UpgradeRequirements::default();
		let order = install_order::sort(ctx.pkgs_data.keys(), &ctx.pkgs_data, Some(&ctx.provided));
		for (position, reference) in order.into_iter().enumerate() {
			let Some(info) = ctx.pkgs_data.get(&reference.name) else { continue };
			let mut requirement = UpgradeRequirement::new(reference, None);
			requirement.sort_priority = position as i64;
			requirement.required_download_size = info.download_size;

			if let Some(member) = ctx.to_update.get(&info.name) {
				requirement.reason = required_by_reason(&member.required_by);
				requirement.extra_installed_size = info.installed_size as i64 - old_size(&info.name);
				plan.to_upgrade.push(requirement);
			} else if let Some(member) = ctx.to_install.get(&info.name) {
				requirement.reason = required_by_reason(&member.required_by);
				requirement.extra_installed_size = info.installed_size as i64;
				plan.to_install.push(requirement);
			}
		}

		for (name, reason) in &ctx.to_remove {
			let mut requirement = UpgradeRequirement::new(PackageRef::local(name.clone()), Some(reason.clone()));
			requirement.extra_installed_size = -old_size(name);
			plan.to_remove.push(requirement);
		}

		let mut blocked = ctx.cannot_upgrade.into_values().collect::<Vec<_>>();
		blocked.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.reference.name.cmp(&b.reference.name)));
		plan.cannot_upgrade = blocked.into_iter()
			.map(|b| {
				let mut requirement = UpgradeRequirement::new(b.reference, Some(b.reason));
				requirement.sort_priority = b.priority;
				requirement
			})
			.collect();

		log::info!(
			"Planned {} upgrades, {} installs, {} removals, {} held back",
			plan.to_upgrade.len(), plan.to_install.len(), plan.to_remove.len(), plan.cannot_upgrade.len()
		);
		Ok(plan)
	}
}

/// Applies the conflict rules to the current transaction.
///
/// Members conflicting with each other are both withdrawn. A member another member conflicts with
/// is removed when installed and withdrawn otherwise, installed packages conflicting with a member are removed.
/// Returns true if any member left the transaction.
pub(super) fn apply_conflicts(ctx: &mut TransactionContext) -> bool {
	let report = find_conflicts(&ctx.pkgs_data, &ctx.world(), &ctx.installed);
	let mut withdrawn = false;

	for (a, b) in &report.mutual {
		if !ctx.is_member(a) || !ctx.is_member(b) {
			continue;
		}
		log::info!("`{}` and `{}` conflict with each other", a, b);
		ctx.withdraw(a, Reason::MutualConflict(b.clone()), 0);
		ctx.withdraw(b, Reason::MutualConflict(a.clone()), 0);
		withdrawn = true;
	}

	for (victim, source) in report.one_sided_members(&ctx.pkgs_data) {
		if !ctx.is_member(&victim) || !ctx.is_member(&source) {
			continue;
		}
		if ctx.is_installed(&victim) {
			log::info!("Removing `{}` as it conflicts with `{}`", victim, source);
			ctx.take_member(&victim);
			ctx.to_remove.insert(victim, Reason::ConflictsWith(source));
		} else {
			ctx.withdraw(&victim, Reason::ConflictsWith(source), 0);
		}
		withdrawn = true;
	}

	for (victim, sources) in report.installed_victims(&ctx.pkgs_data) {
		let Some(source) = sources.iter().find(|s| ctx.is_member(s)) else { continue };
		if ctx.is_installed(victim) && !ctx.to_remove.contains_key(victim) {
			log::info!("Removing `{}` as it conflicts with `{}`", victim, source);
			ctx.to_remove.insert(victim.clone(), Reason::ConflictsWith(source.clone()));
		}
	}

	withdrawn
}
