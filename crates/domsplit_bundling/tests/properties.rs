//! Randomized checks of the bundling phases against `petgraph`'s implementations of the same
//! algorithms, plus the invariants the bundle assignment must hold on any input.

use std::collections::BTreeSet;

use domsplit_bundling::bundle_assigner::{BundleAssigner, BundleId, SharedBundleKey};
use domsplit_bundling::cycle_breaker::CycleBreaker;
use domsplit_bundling::dominator_tree::build_dominator_table;
use domsplit_bundling::scc::{find_strongly_connected_components, is_acyclic};
use domsplit_bundling::{Bundler, BundlerOptions, DominatorBundler};
use domsplit_core::graph::{EdgeFilter, EdgeKind, Graph, GraphBuilder, NodeId};
use petgraph::algo::{dominators, is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use proptest::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct GraphShape {
  nodes: usize,
  edges: Vec<(NodeId, NodeId, EdgeKind)>,
}

impl GraphShape {
  fn graph(&self) -> Graph<()> {
    let mut graph = Graph::with_capacity(self.nodes);
    for _ in 0..self.nodes {
      graph.add_node(());
    }
    for (from, to, kind) in &self.edges {
      graph.add_edge(*from, *to, *kind).unwrap();
    }
    graph.set_root_node_id(0).unwrap();
    graph
  }
}

fn to_petgraph(graph: &Graph<()>) -> DiGraph<(), ()> {
  let mut petgraph = DiGraph::new();
  for _ in 0..graph.node_bound() {
    petgraph.add_node(());
  }
  for edge in graph.edges() {
    petgraph.add_edge(NodeIndex::new(edge.from), NodeIndex::new(edge.to), ());
  }
  petgraph
}

fn graph_strategy() -> impl Strategy<Value = GraphShape> {
  (1usize..40).prop_flat_map(|nodes| {
    let edge = (0..nodes, 0..nodes, prop::bool::ANY).prop_map(|(from, to, is_async)| {
      let kind = if is_async {
        EdgeKind::Async
      } else {
        EdgeKind::Sync
      };
      (from, to, kind)
    });

    prop::collection::vec(edge, 0..nodes * 3).prop_map(move |edges| GraphShape { nodes, edges })
  })
}

/// Graphs where node 0 is a synthetic root linking a handful of entries.
fn rooted_graph_strategy() -> impl Strategy<Value = GraphShape> {
  (graph_strategy(), 1usize..5).prop_map(|(mut shape, entries)| {
    for entry in 1..=entries.min(shape.nodes.saturating_sub(1)) {
      shape.edges.push((0, entry, EdgeKind::Sync));
    }
    // The synthetic root has no predecessors.
    shape.edges.retain(|(_, to, _)| *to != 0);
    shape
  })
}

fn reachable_set(graph: &Graph<()>) -> BTreeSet<NodeId> {
  graph
    .reachable_from(0, EdgeFilter::All)
    .unwrap()
    .into_iter()
    .enumerate()
    .filter_map(|(node_id, reachable)| reachable.then_some(node_id))
    .collect()
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(256))]

  #[test]
  fn prop_scc_matches_petgraph(shape in graph_strategy()) {
    let graph = shape.graph();

    let ours: BTreeSet<Vec<NodeId>> = find_strongly_connected_components(&graph)
      .unwrap()
      .into_iter()
      .map(|component| component.nodes)
      .collect();
    let theirs: BTreeSet<Vec<NodeId>> = tarjan_scc(&to_petgraph(&graph))
      .into_iter()
      .map(|component| {
        let mut nodes: Vec<NodeId> = component.into_iter().map(|n| n.index()).collect();
        nodes.sort_unstable();
        nodes
      })
      .collect();

    prop_assert_eq!(ours, theirs);
  }

  #[test]
  fn prop_scc_is_a_deterministic_partition(shape in graph_strategy()) {
    let graph = shape.graph();

    let first = find_strongly_connected_components(&graph).unwrap();
    let second = find_strongly_connected_components(&graph).unwrap();
    prop_assert_eq!(&first, &second);

    let mut seen: Vec<NodeId> = first.into_iter().flat_map(|c| c.nodes).collect();
    seen.sort_unstable();
    prop_assert_eq!(seen, (0..shape.nodes).collect::<Vec<_>>());
  }

  #[test]
  fn prop_cycle_breaker_yields_acyclic_graph_and_keeps_reachability(shape in graph_strategy()) {
    let mut graph = shape.graph();
    let reachable_before = reachable_set(&graph);

    let report = CycleBreaker::new().break_cycles(&mut graph).unwrap();

    prop_assert!(is_acyclic(&graph).unwrap());
    prop_assert!(!is_cyclic_directed(&to_petgraph(&graph)));
    for component in find_strongly_connected_components(&graph).unwrap() {
      prop_assert_eq!(component.len(), 1);
    }
    prop_assert_eq!(report.forced_removals(), 0);
    prop_assert_eq!(reachable_set(&graph), reachable_before);
  }

  #[test]
  fn prop_dominators_match_petgraph(shape in graph_strategy()) {
    let graph = shape.graph();

    let table = build_dominator_table(&graph).unwrap();
    let theirs = dominators::simple_fast(&to_petgraph(&graph), NodeIndex::new(0));

    for node_id in graph.node_ids() {
      prop_assert_eq!(
        table.immediate_dominator(node_id),
        theirs.immediate_dominator(NodeIndex::new(node_id)).map(|n| n.index()),
        "node {}",
        node_id
      );
    }
  }

  #[test]
  fn prop_assignment_respects_dominance(shape in rooted_graph_strategy()) {
    let mut graph = shape.graph();
    CycleBreaker::new().break_cycles(&mut graph).unwrap();
    let table = build_dominator_table(&graph).unwrap();

    let assignment = BundleAssigner::default().assign(&graph, &table).unwrap();

    if assignment.entries == [0] {
      let root_bundle = BundleId::Entry(0);
      for node_id in graph.node_ids() {
        let expected = table.is_reachable(node_id).then_some(&root_bundle);
        prop_assert_eq!(assignment.bundle_id_of(node_id), expected);
      }
      return Ok(());
    }

    for node_id in graph.node_ids() {
      let is_entry = assignment.entries.contains(&node_id);
      let bundle = assignment.bundle_of(node_id);

      if node_id == 0 || !table.is_reachable(node_id) {
        prop_assert!(bundle.is_none());
        continue;
      }

      prop_assert!(bundle.is_some_and(|b| b.assets.contains(&node_id)));
      if is_entry {
        continue;
      }

      if assignment.entries.iter().any(|entry| table.dominates(*entry, node_id)) {
        prop_assert!(!assignment.is_shared(node_id), "node {} is dominated by an entry", node_id);
      }
      if table.immediate_dominator(node_id) == Some(0) {
        prop_assert!(assignment.is_shared(node_id), "node {} is dominated by the root", node_id);
      }
    }

    let assets: usize = assignment.bundles.iter().map(|b| b.assets.len()).sum();
    prop_assert_eq!(assets, assignment.assigned_count());
  }

  #[test]
  fn prop_shared_bundles_list_every_entry_that_loads_the_asset(shape in rooted_graph_strategy()) {
    let mut graph = shape.graph();
    CycleBreaker::new().break_cycles(&mut graph).unwrap();
    let table = build_dominator_table(&graph).unwrap();

    let assignment = BundleAssigner::default().assign(&graph, &table).unwrap();
    let reachable_from_entry: Vec<(NodeId, Vec<bool>)> = assignment
      .entries
      .iter()
      .map(|entry| (*entry, graph.reachable_from(*entry, EdgeFilter::All).unwrap()))
      .collect();

    for node_id in assignment.shared_nodes.iter().copied() {
      let loading: Vec<NodeId> = reachable_from_entry
        .iter()
        .filter(|(_, reachable)| reachable[node_id])
        .map(|(entry, _)| *entry)
        .collect();
      let bundle = assignment.bundle_of(node_id).unwrap();

      prop_assert!(loading.len() >= 2, "node {} is loaded by {:?}", node_id, loading);
      prop_assert_eq!(&bundle.entries, &loading, "node {}", node_id);
    }
  }

  #[test]
  fn prop_pipeline_is_deterministic(shape in rooted_graph_strategy()) {
    let bundler = DominatorBundler::new(BundlerOptions::default());

    let first = bundler.bundle(&mut shape.graph()).unwrap();
    let second = bundler.bundle(&mut shape.graph()).unwrap();

    prop_assert_eq!(&first.assignment, &second.assignment);
    prop_assert_eq!(first.removed_edges, second.removed_edges);
    prop_assert_eq!(first.assignment.content_hash(), second.assignment.content_hash());
  }
}

#[test]
fn test_deep_chain_bundles_without_overflow() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();

  let depth = 100_000;
  let mut builder = GraphBuilder::new(());
  let mut previous = builder.entry_asset(());
  for _ in 1..depth {
    let next = builder.asset(());
    builder.sync_dependency(previous, next);
    previous = next;
  }
  // Close the chain into one long cycle.
  let first = 1;
  builder.sync_dependency(previous, first);
  let mut graph = builder.build().unwrap();

  let output = DominatorBundler::default().bundle(&mut graph).unwrap();

  assert_eq!(output.removed_edges.len(), 1);
  assert_eq!(output.assignment.bundles.len(), 1);
  // The root is the only entry and joins the chain in its bundle.
  assert_eq!(output.assignment.entries, vec![0]);
  assert_eq!(output.assignment.bundles[0].assets.len(), depth + 1);
  assert_eq!(output.stats.shared_bundles, 0);
}

#[test]
fn test_wide_merge_points_behind_long_chains() {
  let length = 5_000;
  let mut builder = GraphBuilder::new(());
  let a = builder.entry_asset(());
  let b = builder.entry_asset(());
  let c = builder.entry_asset(());

  let mut chain_ends = Vec::new();
  for entry in [a, b] {
    let mut previous = entry;
    for _ in 0..length {
      let next = builder.asset(());
      builder.sync_dependency(previous, next);
      previous = next;
    }
    chain_ends.push(previous);
  }

  let mut merge_points = Vec::new();
  for _ in 0..length {
    let merge_point = builder.asset(());
    for end in &chain_ends {
      builder.sync_dependency(*end, merge_point);
    }
    merge_points.push(merge_point);
  }
  let graph = builder.build().unwrap();
  let table = build_dominator_table(&graph).unwrap();

  let assignment = BundleAssigner::default().assign(&graph, &table).unwrap();

  let shared: Vec<_> = assignment.shared_bundles().collect();
  assert_eq!(shared.len(), 1);
  assert_eq!(
    shared[0].id,
    BundleId::Shared(SharedBundleKey::Entries(vec![a, b]))
  );
  assert_eq!(shared[0].assets, merge_points);
  assert_eq!(assignment.bundle(&BundleId::Entry(c)).unwrap().assets, vec![c]);
}
