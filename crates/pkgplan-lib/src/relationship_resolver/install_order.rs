//! Ordering packages so each one comes after the packages it needs.

use std::collections::{BTreeMap, HashMap};
use petgraph::graphmap::DiGraphMap;
use petgraph::algo::tarjan_scc;

use crate::package::*;

/// Orders `names` for installation.
///
/// Dependencies are matched to packages in the set through `provided` when given, otherwise only by name.
/// Dependencies with no provider in the set are assumed to be satisfied already.
/// Packages in a dependency cycle share a rank, ties are broken by name and registry packages always come last.
/// Names without metadata are skipped.
pub fn sort<'a>(names: impl IntoIterator<Item = &'a String>, metadata: &BTreeMap<String, PackageInfo>, provided: Option<&ProvidedMap>) -> Vec<PackageRef> {
	let mut graph = DiGraphMap::<&str, ()>::new();
	for name in names {
		match metadata.get(name) {
			Some(_) => { graph.add_node(name.as_str()); },
			None => log::debug!("No metadata for `{}`, leaving it out of the install order", name),
		}
	}

	let nodes = graph.nodes().collect::<Vec<_>>();
	for name in nodes {
		let Some(info) = metadata.get(name) else { continue };
		for relation in info.required_relations() {
			for dependency in providers_in_set(&graph, relation, provided) {
				if dependency != name {
					graph.add_edge(name, dependency, ());
				}
			}
		}
	}

	/* Components come out dependencies first */
	let mut rank = HashMap::<&str, usize>::new();
	for component in tarjan_scc(&graph) {
		let r = component.iter()
			.flat_map(|n| graph.neighbors(*n))
			.filter(|n| !component.contains(n))
			.filter_map(|n| rank.get(n).map(|r| r + 1))
			.max()
			.unwrap_or(0);
		for n in component {
			rank.insert(n, r);
		}
	}

	let mut ordered = graph.nodes()
		.filter_map(|n| metadata.get(n))
		.map(|info| (info.source.is_registry(), rank.get(info.name.as_str()).copied().unwrap_or(0), info.reference()))
		.collect::<Vec<_>>();
	ordered.sort_by(|a, b| (a.0, a.1, &a.2.name).cmp(&(b.0, b.1, &b.2.name)));
	ordered.into_iter().map(|(_, _, r)| r).collect()
}

fn providers_in_set<'g>(graph: &DiGraphMap<&'g str, ()>, relation: &Relation, provided: Option<&ProvidedMap>) -> Vec<&'g str> {
	if let Some(name) = graph.nodes().find(|n| *n == relation.name) {
		return vec![name]
	}
	let Some(provided) = provided else { return Vec::new() };

	let in_set = |names: Vec<&PackageRef>| names.into_iter()
		.filter_map(|r| graph.nodes().find(|n| *n == r.name))
		.collect::<Vec<_>>();

	let matching = in_set(provided.providers_matching(relation));
	if !matching.is_empty() {
		return matching
	}
	in_set(provided.providers(&relation.name).map(|p| p.provider).collect())
}
