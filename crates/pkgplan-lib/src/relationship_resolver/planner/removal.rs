use std::collections::{BTreeSet, VecDeque};

use super::*;

/// Brings removals in line with the final membership.
///
/// A conflict whose source left the transaction no longer removes anything, neither does a
/// dependency on a package which is no longer removed.
/// Rounds repeat until no member leaves the transaction.
pub(super) async fn settle(ctx: &mut TransactionContext, oracle: &dyn RepositoryOracle) -> crate::Result<()> {
	loop {
		let mut changed = retract_stale(ctx);
		changed |= apply_conflicts(ctx);
		changed |= ctx.prune_orphans();
		changed |= cascade(ctx, oracle).await?;
		if !changed {
			return Ok(())
		}
	}
}

/// Drops removals whose cause is gone. Returns true if anything was dropped.
fn retract_stale(ctx: &mut TransactionContext) -> bool {
	let mut retracted = false;
	loop {
		let members = ctx.pkgs_data.keys().cloned().collect::<BTreeSet<_>>();
		let removed = ctx.to_remove.keys().cloned().collect::<BTreeSet<_>>();
		let before = ctx.to_remove.len();
		ctx.to_remove.retain(|name, reason| match reason {
			Reason::ConflictsWith(source) if !members.contains(source) => {
				log::debug!("Keeping `{}`, `{}` is no longer part of the transaction", name, source);
				false
			},
			Reason::DependsOnRemoved(root) if !removed.contains(root) => {
				log::debug!("Keeping `{}`, `{}` is no longer removed", name, root);
				false
			},
			_ => true,
		});
		if ctx.to_remove.len() == before {
			return retracted
		}
		retracted = true;
	}
}

/// Extends every removal to the packages depending on it.
///
/// Installed members and installed packages outside the transaction are removed too, members which
/// aren't installed are withdrawn. A dependency still satisfied by another provider doesn't count.
/// Returns true if any member left the transaction.
async fn cascade(ctx: &mut TransactionContext, oracle: &dyn RepositoryOracle) -> crate::Result<bool> {
	let mut changed = false;
	let mut visited = BTreeSet::<String>::new();
	let mut queue = ctx.to_remove.keys().map(|n| (n.clone(), n.clone())).collect::<VecDeque<_>>();

	while let Some((removed, root)) = queue.pop_front() {
		if !visited.insert(removed.clone()) {
			continue;
		}

		let names = match ctx.installed.get(&removed) {
			Some(record) => record.provided_names().map(str::to_string).collect::<Vec<_>>(),
			None => vec![removed.clone()],
		};
		let name_refs = names.iter().map(String::as_str).collect::<Vec<_>>();

		let world = ctx.world();
		for dependent in ctx.dependents_in_transaction(&name_refs, &world) {
			changed = true;
			if ctx.is_installed(&dependent) {
				log::info!("Removing `{}` as it depends on `{}`", dependent, root);
				ctx.take_member(&dependent);
				ctx.to_remove.insert(dependent.clone(), Reason::DependsOnRemoved(root.clone()));
				queue.push_back((dependent, root.clone()));
			} else {
				ctx.withdraw(&dependent, Reason::DependsOnRemoved(root.clone()), 0);
			}
		}

		let mut users = oracle.required_by(std::slice::from_ref(&removed), false).await?
			.remove(&removed)
			.unwrap_or_default()
			.into_iter()
			.collect::<Vec<_>>();
		users.sort();

		let world = ctx.world();
		for user in users {
			if ctx.is_member(&user) || ctx.to_remove.contains_key(&user) || !ctx.is_installed(&user) {
				continue;
			}
			let still_satisfied = ctx.installed.get(&user).map_or(false, |record| {
				record.depends.iter()
					.filter(|r| names.contains(&r.name))
					.all(|r| world.satisfies(r))
			});
			if still_satisfied {
				continue;
			}
			log::info!("Removing installed `{}` as it depends on `{}`", user, root);
			ctx.to_remove.insert(user.clone(), Reason::DependsOnRemoved(root.clone()));
			queue.push_back((user, root.clone()));
		}
	}

	Ok(changed)
}
