use std::collections::BTreeSet;
use std::sync::Arc;

use pkgplan::package::*;
use pkgplan::relationship_resolver::*;
use pkgplan_test_utils::*;

async fn summarize(oracle: MemoryOracle, registry: MemoryRegistry, options: pkgplan::PlannerOptions, requested: &[PackageRef], selector: &dyn ProviderSelector) -> pkgplan::Result<UpgradeRequirements> {
	let plan = planner(oracle, registry, options).summarize(requested, selector, &Cancellation::new()).await?;
	Ok(plan.expect("not cancelled"))
}

#[tokio::test]
async fn upgrade_removes_conflicting_installed_package() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("A", "1.0.0-1"))
		.installed(local_pkg("B", "0.7-1"))
		.available(repo_pkg("extra", "A", "1.1.0-1").with_conflicts(["B<=0.7"]));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "A")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_upgrade), vec!["A"]);
	assert_eq!(names(&plan.to_remove), vec!["B"]);
	assert_eq!(plan.to_remove[0].reason, Some(Reason::ConflictsWith("A".to_string())));
	assert_eq!(plan.to_remove[0].package, PackageRef::local("B"));
	assert!(plan.to_install.is_empty());
	assert!(plan.cannot_upgrade.is_empty());
}

#[tokio::test]
async fn conflict_outside_the_version_range_is_ignored() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("A", "1.0.0-1"))
		.installed(local_pkg("B", "0.8-1"))
		.available(repo_pkg("extra", "A", "1.1.0-1").with_conflicts(["B<=0.7"]));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "A")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_upgrade), vec!["A"]);
	assert!(plan.to_remove.is_empty());
}

#[tokio::test]
async fn new_dependency_removes_what_it_conflicts_with() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("A", "1-1"))
		.installed(local_pkg("B", "1-1"))
		.available(repo_pkg("extra", "A", "2-1").with_depends(["C"]))
		.available(repo_pkg("extra", "C", "1-1").with_conflicts(["B"]));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "A")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_upgrade), vec!["A"]);
	assert_eq!(names(&plan.to_install), vec!["C"]);
	assert_eq!(plan.to_install[0].reason, Some(Reason::RequiredBy(BTreeSet::from(["A".to_string()]))));
	assert_eq!(names(&plan.to_remove), vec!["B"]);
	assert_eq!(plan.to_remove[0].reason, Some(Reason::ConflictsWith("C".to_string())));
	/* Dependencies are installed before their users */
	assert!(plan.to_install[0].sort_priority < plan.to_upgrade[0].sort_priority);
}

#[tokio::test]
async fn mutual_conflict_blocks_both() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("A", "1-1"))
		.installed(local_pkg("B", "1-1"))
		.available(repo_pkg("extra", "A", "2-1").with_conflicts(["B"]))
		.available(repo_pkg("extra", "B", "2-1").with_conflicts(["A"]));

	let requested = [PackageRef::repository("extra", "A"), PackageRef::repository("extra", "B")];
	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &requested, &DeclineSelector).await.unwrap();
	assert!(plan.to_upgrade.is_empty());
	assert!(plan.to_install.is_empty());
	assert!(plan.to_remove.is_empty());
	assert_eq!(names(&plan.cannot_upgrade), vec!["A", "B"]);
	assert_eq!(find(&plan.cannot_upgrade, "A").unwrap().reason, Some(Reason::MutualConflict("B".to_string())));
	assert_eq!(find(&plan.cannot_upgrade, "B").unwrap().reason, Some(Reason::MutualConflict("A".to_string())));
}

#[tokio::test]
async fn one_sided_conflict_withdraws_the_new_victim() {
	init_logger();
	let oracle = MemoryOracle::new()
		.available(repo_pkg("extra", "A", "1-1").with_conflicts(["B"]))
		.available(repo_pkg("extra", "B", "1-1"));

	let requested = [PackageRef::repository("extra", "A"), PackageRef::repository("extra", "B")];
	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &requested, &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["A"]);
	assert_eq!(names(&plan.cannot_upgrade), vec!["B"]);
	assert_eq!(plan.cannot_upgrade[0].reason, Some(Reason::ConflictsWith("A".to_string())));
	assert!(plan.to_remove.is_empty());
}

#[tokio::test]
async fn one_sided_conflict_removes_the_installed_victim() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("B", "1-1"))
		.available(repo_pkg("extra", "A", "1-1").with_conflicts(["B"]))
		.available(repo_pkg("extra", "B", "2-1"));

	let requested = [PackageRef::repository("extra", "A"), PackageRef::repository("extra", "B")];
	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &requested, &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["A"]);
	assert!(plan.to_upgrade.is_empty());
	assert_eq!(names(&plan.to_remove), vec!["B"]);
	assert_eq!(plan.to_remove[0].reason, Some(Reason::ConflictsWith("A".to_string())));
	assert!(plan.cannot_upgrade.is_empty());
}

#[tokio::test]
async fn conflicting_upgrade_and_new_dependency_are_both_held_back() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("U", "1-1"))
		.installed(local_pkg("X", "1-1"))
		.available(repo_pkg("extra", "U", "2-1").with_conflicts(["N"]))
		.available(repo_pkg("extra", "N", "1-1").with_conflicts(["U"]))
		.available(repo_pkg("extra", "X", "2-1").with_depends(["N"]));

	let requested = [PackageRef::repository("extra", "U"), PackageRef::repository("extra", "X")];
	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &requested, &DeclineSelector).await.unwrap();
	assert!(plan.to_upgrade.is_empty());
	assert!(plan.to_install.is_empty());
	assert!(plan.to_remove.is_empty());
	assert_eq!(names(&plan.cannot_upgrade), vec!["U", "X"]);
	assert_eq!(plan.cannot_upgrade[0].reason, Some(Reason::MutualConflict("N".to_string())));
	assert_eq!(plan.cannot_upgrade[0].sort_priority, 0);
	assert_eq!(plan.cannot_upgrade[1].reason, Some(Reason::RequiresWithdrawn("N".to_string())));
	assert_eq!(plan.cannot_upgrade[1].sort_priority, -1);
}

#[tokio::test]
async fn installed_package_declaring_a_conflict_is_removed() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("old-editor", "1-1").with_conflicts(["editor"]))
		.available(repo_pkg("extra", "editor", "1-1"));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "editor")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["editor"]);
	assert_eq!(names(&plan.to_remove), vec!["old-editor"]);
	assert_eq!(plan.to_remove[0].reason, Some(Reason::ConflictsWith("editor".to_string())));
}

#[tokio::test]
async fn removal_cascades_to_installed_dependents() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("lib", "1-1"))
		.installed(local_pkg("app", "1-1").with_depends(["lib"]))
		.installed(local_pkg("tool", "1-1").with_depends(["app"]))
		.installed(local_pkg("unrelated", "1-1"))
		.available(repo_pkg("extra", "new-lib", "1-1").with_conflicts(["lib"]));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "new-lib")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["new-lib"]);
	assert_eq!(names(&plan.to_remove), vec!["app", "lib", "tool"]);
	assert_eq!(find(&plan.to_remove, "lib").unwrap().reason, Some(Reason::ConflictsWith("new-lib".to_string())));
	assert_eq!(find(&plan.to_remove, "app").unwrap().reason, Some(Reason::DependsOnRemoved("lib".to_string())));
	assert_eq!(find(&plan.to_remove, "tool").unwrap().reason, Some(Reason::DependsOnRemoved("lib".to_string())));
}

#[tokio::test]
async fn replacement_provider_keeps_dependents() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("lib", "1-1"))
		.installed(local_pkg("app", "1-1").with_depends(["lib"]))
		.available(repo_pkg("extra", "new-lib", "1-1").with_conflicts(["lib"]).with_provides(["lib"]));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "new-lib")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_remove), vec!["lib"]);
	assert_eq!(names(&plan.to_install), vec!["new-lib"]);
}

#[tokio::test]
async fn conflict_victim_does_not_satisfy_the_upgrade() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("A", "1-1"))
		.installed(local_pkg("B", "1-1").with_provides(["libx"]))
		.available(repo_pkg("extra", "A", "2-1").with_depends(["libx"]).with_conflicts(["B"]))
		.available(repo_pkg("extra", "C", "1-1").with_provides(["libx"]));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "A")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_upgrade), vec!["A"]);
	assert_eq!(names(&plan.to_install), vec!["C"]);
	assert_eq!(names(&plan.to_remove), vec!["B"]);
	assert_eq!(plan.to_remove[0].reason, Some(Reason::ConflictsWith("A".to_string())));
	assert!(find(&plan.to_remove, "A").is_none());
	assert!(plan.cannot_upgrade.is_empty());
}

#[tokio::test]
async fn upgrade_breaking_an_installed_package_is_held_back() {
	init_logger();
	let oracle = || MemoryOracle::new()
		.installed(local_pkg("lib", "1-1"))
		.installed(local_pkg("other", "1-1").with_depends(["lib<2"]))
		.available(repo_pkg("extra", "lib", "2-1"));

	let plan = summarize(oracle(), MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "lib")], &DeclineSelector).await.unwrap();
	assert!(plan.to_upgrade.is_empty());
	assert_eq!(names(&plan.cannot_upgrade), vec!["lib"]);
	assert_eq!(plan.cannot_upgrade[0].reason, Some(Reason::WouldBreak("other".to_string())));

	let mut options = pkgplan::PlannerOptions::default();
	options.set_check_dependency_breakage(false);
	let plan = summarize(oracle(), MemoryRegistry::new(), options, &[PackageRef::repository("extra", "lib")], &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_upgrade), vec!["lib"]);
	assert!(plan.cannot_upgrade.is_empty());
}

#[tokio::test]
async fn held_back_dependency_withdraws_its_users() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("lib", "1-1"))
		.installed(local_pkg("other", "1-1").with_depends(["lib<2"]))
		.available(repo_pkg("extra", "lib", "2-1"))
		.available(repo_pkg("extra", "app", "1-1").with_depends(["lib>=2"]));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "app")], &DeclineSelector).await.unwrap();
	assert!(plan.to_install.is_empty());
	assert!(plan.to_upgrade.is_empty());
	assert_eq!(names(&plan.cannot_upgrade), vec!["lib", "app"]);
	assert_eq!(plan.cannot_upgrade[0].reason, Some(Reason::WouldBreak("other".to_string())));
	assert_eq!(plan.cannot_upgrade[1].reason, Some(Reason::RequiresWithdrawn("lib".to_string())));
	assert!(plan.cannot_upgrade[0].sort_priority > plan.cannot_upgrade[1].sort_priority);
}

#[tokio::test]
async fn selected_provider_is_installed() {
	init_logger();
	let oracle = MemoryOracle::new()
		.available(repo_pkg("extra", "app", "1-1").with_depends(["java-runtime"]))
		.available(repo_pkg("extra", "jdk17", "17-1").with_provides(["java-runtime=17"]))
		.available(repo_pkg("extra", "jdk21", "21-1").with_provides(["java-runtime=21"]));
	let selector = ScriptedSelector::new().answer("java-runtime", PackageRef::repository("extra", "jdk21"));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "app")], &selector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["jdk21", "app"]);
	assert_eq!(plan.to_install[0].reason, Some(Reason::RequiredBy(BTreeSet::from(["app".to_string()]))));
	assert_eq!(plan.to_install[1].reason, None);

	let requests = selector.requests();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0]["java-runtime"].len(), 2);
}

#[tokio::test]
async fn declined_selection_abandons_the_requirer() {
	init_logger();
	let oracle = MemoryOracle::new()
		.available(repo_pkg("extra", "app", "1-1").with_depends(["java-runtime"]))
		.available(repo_pkg("extra", "editor", "1-1"))
		.available(repo_pkg("extra", "jdk17", "17-1").with_provides(["java-runtime=17"]))
		.available(repo_pkg("extra", "jdk21", "21-1").with_provides(["java-runtime=21"]));

	let requested = [PackageRef::repository("extra", "app"), PackageRef::repository("extra", "editor")];
	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &requested, &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["editor"]);
	assert_eq!(names(&plan.cannot_upgrade), vec!["app"]);
	assert_eq!(plan.cannot_upgrade[0].reason, Some(Reason::ProviderNotSelected("java-runtime".to_string())));
}

#[tokio::test]
async fn selection_outside_the_candidates_is_ignored() {
	init_logger();
	let oracle = MemoryOracle::new()
		.available(repo_pkg("extra", "app", "1-1").with_depends(["java-runtime"]))
		.available(repo_pkg("extra", "jdk17", "17-1").with_provides(["java-runtime=17"]))
		.available(repo_pkg("extra", "jdk21", "21-1").with_provides(["java-runtime=21"]));
	let selector = ScriptedSelector::new().answer("java-runtime", PackageRef::repository("extra", "something-else"));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "app")], &selector).await.unwrap();
	assert!(plan.to_install.is_empty());
	assert_eq!(names(&plan.cannot_upgrade), vec!["app"]);
}

#[tokio::test]
async fn automatched_provider_needs_no_selection() {
	init_logger();
	let oracle = MemoryOracle::new()
		.available(repo_pkg("extra", "app", "1-1").with_depends(["libgl"]))
		.available(repo_pkg("extra", "libgl", "1-1"))
		.available(repo_pkg("extra", "nvidia-utils", "550-1").with_provides(["libgl"]));
	let mut options = pkgplan::PlannerOptions::default();
	options.set_automatch_providers(true);
	let selector = ScriptedSelector::new();

	let plan = summarize(oracle, MemoryRegistry::new(), options, &[PackageRef::repository("extra", "app")], &selector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["libgl", "app"]);
	assert!(selector.requests().is_empty());
}

#[tokio::test]
async fn unknown_requested_package_fails() {
	init_logger();
	let result = summarize(MemoryOracle::new(), MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "ghost")], &DeclineSelector).await;
	assert!(matches!(result, Err(pkgplan::Error::Unresolvable { ref name, .. }) if name == "ghost"));
}

#[tokio::test]
async fn unreachable_registry_holds_back_registry_packages() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("aur-tool", "1-1"))
		.available(repo_pkg("extra", "editor", "1-1"));
	let registry = MemoryRegistry::new().package(registry_pkg("aur-new", "1-1")).offline();

	let requested = [PackageRef::registry("aur-new"), PackageRef::registry("aur-tool"), PackageRef::repository("extra", "editor")];
	let plan = summarize(oracle, registry, Default::default(), &requested, &DeclineSelector).await.unwrap();
	assert_eq!(names(&plan.to_install), vec!["editor"]);
	assert_eq!(names(&plan.to_upgrade), vec!["aur-tool"]);
	assert_eq!(plan.to_upgrade[0].package, PackageRef::registry("aur-tool"));
	assert_eq!(names(&plan.cannot_upgrade), vec!["aur-new"]);
	assert_eq!(plan.cannot_upgrade[0].reason, Some(Reason::MetadataUnavailable));
}

#[tokio::test]
async fn sizes_are_reported() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("lib", "1-1").with_sizes(0, 100))
		.installed(local_pkg("old", "1-1").with_sizes(0, 30))
		.available(repo_pkg("extra", "lib", "2-1").with_sizes(40, 150).with_conflicts(["old"]).with_depends(["helper"]))
		.available(repo_pkg("extra", "helper", "1-1").with_sizes(10, 20));

	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &[PackageRef::repository("extra", "lib")], &DeclineSelector).await.unwrap();
	let lib = find(&plan.to_upgrade, "lib").unwrap();
	assert_eq!(lib.required_download_size, 40);
	assert_eq!(lib.extra_installed_size, 50);
	assert_eq!(find(&plan.to_install, "helper").unwrap().extra_installed_size, 20);
	assert_eq!(find(&plan.to_remove, "old").unwrap().extra_installed_size, -30);
	assert_eq!(plan.total_download_size(), 50);
	assert_eq!(plan.total_installed_size_change(), 40);
}

#[tokio::test]
async fn cancelled_planning_returns_nothing() {
	init_logger();
	let oracle = MemoryOracle::new().available(repo_pkg("extra", "app", "1-1"));
	let cancellation = Cancellation::new();
	cancellation.cancel();

	let plan = planner(oracle, MemoryRegistry::new(), Default::default())
		.summarize(&[PackageRef::repository("extra", "app")], &DeclineSelector, &cancellation)
		.await
		.unwrap();
	assert!(plan.is_none());
}

#[tokio::test]
async fn cancellation_between_dependency_levels_returns_nothing() {
	init_logger();
	let oracle = MemoryOracle::new().available(repo_pkg("extra", "app", "1-1").with_depends(["aur-lib"]));
	let cancellation = Cancellation::new();
	let registry = Arc::new(MemoryRegistry::new()
		.package(registry_pkg("aur-lib", "1-1").with_depends(["aur-dep"]))
		.package(registry_pkg("aur-dep", "1-1"))
		.cancel_on_fetch(cancellation.clone()));

	let plan = UpgradePlanner::new(Arc::new(oracle), registry.clone(), Default::default())
		.summarize(&[PackageRef::repository("extra", "app")], &DeclineSelector, &cancellation)
		.await
		.unwrap();
	assert!(plan.is_none());
	/* The second level is never fetched */
	assert_eq!(registry.bulk_calls(), 1);
}

#[tokio::test]
async fn plan_lists_never_share_a_package() {
	init_logger();
	let oracle = MemoryOracle::new()
		.installed(local_pkg("A", "1-1"))
		.installed(local_pkg("B", "1-1"))
		.installed(local_pkg("C", "1-1").with_depends(["B"]))
		.available(repo_pkg("extra", "A", "2-1").with_depends(["D"]).with_conflicts(["B"]))
		.available(repo_pkg("extra", "D", "1-1"))
		.available(repo_pkg("extra", "E", "1-1").with_conflicts(["D"]));

	let requested = [PackageRef::repository("extra", "A"), PackageRef::repository("extra", "E")];
	let plan = summarize(oracle, MemoryRegistry::new(), Default::default(), &requested, &DeclineSelector).await.unwrap();
	let mut seen = BTreeSet::new();
	for requirement in plan.to_upgrade.iter().chain(&plan.to_install).chain(&plan.to_remove).chain(&plan.cannot_upgrade) {
		assert!(seen.insert(requirement.package.name.clone()), "`{}` is listed twice", requirement.package.name);
	}
	/* E pushes D out so A loses its dependency and B stays */
	assert_eq!(names(&plan.to_install), vec!["E"]);
	assert_eq!(names(&plan.cannot_upgrade), vec!["A"]);
	assert_eq!(plan.cannot_upgrade[0].reason, Some(Reason::RequiresWithdrawn("D".to_string())));
	assert!(plan.to_remove.is_empty());
}
