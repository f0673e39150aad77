use std::collections::HashSet;
use std::fmt;

use domsplit_core::diagnostic::{Diagnostic, Diagnostics};
use domsplit_core::graph::{Edge, EdgeFilter, EdgeKind, Graph, GraphVisitor, NodeId};
use domsplit_core::GraphResult;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::scc::{find_cycles, StronglyConnectedComponent};

/// Why the cycle breaker picked a particular edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalReason {
  /// A module importing itself
  SelfLoop,
  /// The edge closes the cycle back to a module still on the depth-first path
  BackEdge,
  /// Some other edge of the cycle that no module needs to stay reachable
  Internal,
  /// The whole cycle is dead code
  Unreachable,
  /// Every candidate was needed for reachability; the lowest priority edge was dropped anyway
  Forced,
}

impl RemovalReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      RemovalReason::SelfLoop => "selfLoop",
      RemovalReason::BackEdge => "backEdge",
      RemovalReason::Internal => "internal",
      RemovalReason::Unreachable => "unreachable",
      RemovalReason::Forced => "forced",
    }
  }
}

impl fmt::Display for RemovalReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedEdge {
  pub from: NodeId,
  pub to: NodeId,
  pub kind: EdgeKind,
  pub reason: RemovalReason,
  /// 1-based round of the cycle breaker that removed the edge
  pub round: usize,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleBreakReport {
  pub removed_edges: Vec<RemovedEdge>,
  pub diagnostics: Diagnostics,
  pub rounds: usize,
}

impl CycleBreakReport {
  pub fn forced_removals(&self) -> usize {
    self
      .removed_edges
      .iter()
      .filter(|removed| removed.reason == RemovalReason::Forced)
      .count()
  }
}

/// Removes edges until the graph has no strongly connected component that forms a cycle.
///
/// Each round finds the cyclic components and numbers the graph with one depth-first walk that
/// starts at the root and then at every node it did not reach, in ascending id order. For each
/// cyclic component:
///
/// 1. every self-loop is removed, and nothing else that round
/// 2. otherwise every back edge of the walk inside the component is removed, in ascending
///    `(from, to)` order with ties broken by insertion order
/// 3. a component without back edges removes its first internal edge whose removal keeps every
///    member that was reachable from the root reachable
/// 4. when none qualifies, the lowest priority edge (async before sync) is removed and an
///    [`UnbreakableCycle`](domsplit_core::diagnostic::UNBREAKABLE_CYCLE) diagnostic is emitted
///
/// Removing back edges leaves the depth-first tree intact, so they go together and nothing the
/// root reached is disconnected. Every round removes at least one edge, so the loop terminates.
///
/// Every cycle in a depth-first forest contains a back edge, so steps 3 and 4 are practically
/// unreachable on a full walk. They remain as a fallback for the tests that drive
/// `break_component` with a partial set of back edges.
#[derive(Debug, Default)]
pub struct CycleBreaker;

impl CycleBreaker {
  pub fn new() -> Self {
    CycleBreaker
  }

  #[instrument(level = "debug", skip_all)]
  pub fn break_cycles<T>(&self, graph: &mut Graph<T>) -> GraphResult<CycleBreakReport> {
    let root = graph.root_node_id()?;
    let mut report = CycleBreakReport::default();

    loop {
      let cycles = find_cycles(graph)?;
      if cycles.is_empty() {
        break;
      }

      report.rounds += 1;
      debug!(
        round = report.rounds,
        cycles = cycles.len(),
        "cycle breaker: found cyclic components"
      );

      let reachable = graph.reachable_from(root, EdgeFilter::All)?;
      let back_edges = find_back_edges(graph, root)?;
      for component in &cycles {
        self.break_component(
          graph,
          component,
          &back_edges,
          &reachable,
          &mut report,
          |graph, edge, required| keeps_reachable(graph, root, edge, required),
        )?;
      }
    }

    debug!(
      rounds = report.rounds,
      removed_edges = report.removed_edges.len(),
      forced = report.forced_removals(),
      "cycle breaker: graph is acyclic"
    );

    Ok(report)
  }

  fn break_component<T, F>(
    &self,
    graph: &mut Graph<T>,
    component: &StronglyConnectedComponent,
    back_edges: &HashSet<u64>,
    reachable: &[bool],
    report: &mut CycleBreakReport,
    is_safe_to_remove: F,
  ) -> GraphResult<()>
  where
    F: Fn(&Graph<T>, &Edge, &[NodeId]) -> GraphResult<bool>,
  {
    let round = report.rounds;
    let edges = internal_edges(graph, component)?;

    let self_loops: Vec<Edge> = edges.iter().filter(|e| e.from == e.to).copied().collect();
    if !self_loops.is_empty() {
      for edge in self_loops {
        remove(graph, report, edge, RemovalReason::SelfLoop, round)?;
      }
      return Ok(());
    }

    let required: Vec<NodeId> = component
      .nodes
      .iter()
      .copied()
      .filter(|node_id| reachable.get(*node_id).copied().unwrap_or(false))
      .collect();

    let back: Vec<Edge> = edges
      .iter()
      .filter(|edge| back_edges.contains(&edge.seq))
      .copied()
      .collect();
    if !back.is_empty() {
      let reason = if required.is_empty() {
        RemovalReason::Unreachable
      } else {
        RemovalReason::BackEdge
      };
      for edge in back {
        remove(graph, report, edge, reason, round)?;
      }
      return Ok(());
    }

    for edge in &edges {
      if required.is_empty() {
        return remove(graph, report, *edge, RemovalReason::Unreachable, round);
      }
      if is_safe_to_remove(&*graph, edge, &required)? {
        return remove(graph, report, *edge, RemovalReason::Internal, round);
      }
    }

    let Some(edge) = edges
      .iter()
      .min_by_key(|edge| (edge.kind.removal_priority(), edge.from, edge.to, edge.seq))
      .copied()
    else {
      return Ok(());
    };

    warn!(
      from = edge.from,
      to = edge.to,
      kind = %edge.kind,
      "cycle breaker: no edge could be removed without disconnecting a module, forcing removal"
    );
    report.diagnostics.push(Diagnostic::unbreakable_cycle(
      edge.from,
      edge.to,
      edge.kind,
      RemovalReason::Forced.as_str(),
    ));
    remove(graph, report, edge, RemovalReason::Forced, round)
  }
}

fn remove<T>(
  graph: &mut Graph<T>,
  report: &mut CycleBreakReport,
  edge: Edge,
  reason: RemovalReason,
  round: usize,
) -> GraphResult<()> {
  graph.remove_edge(edge.from, edge.to, edge.kind)?;
  debug!(
    from = edge.from,
    to = edge.to,
    kind = %edge.kind,
    reason = %reason,
    "cycle breaker: removed edge"
  );
  report.removed_edges.push(RemovedEdge {
    from: edge.from,
    to: edge.to,
    kind: edge.kind,
    reason,
    round,
  });
  Ok(())
}

/// Edges with both ends inside `component`, ordered by `(from, to, seq)`.
fn internal_edges<T>(
  graph: &Graph<T>,
  component: &StronglyConnectedComponent,
) -> GraphResult<Vec<Edge>> {
  let mut edges = Vec::new();
  for node_id in &component.nodes {
    edges.extend(
      graph
        .outgoing_edges(*node_id)?
        .filter(|edge| component.contains(edge.to)),
    );
  }
  edges.sort_by_key(|edge| (edge.from, edge.to, edge.seq));
  Ok(edges)
}

#[derive(Default)]
struct BackEdgeCollector {
  back_edges: HashSet<u64>,
}

impl GraphVisitor for BackEdgeCollector {
  fn back_edge(&mut self, edge: Edge) {
    self.back_edges.insert(edge.seq);
  }
}

/// Sequence numbers of the back edges of a depth-first walk from `root` that then continues
/// from every node left unvisited.
fn find_back_edges<T>(graph: &Graph<T>, root: NodeId) -> GraphResult<HashSet<u64>> {
  let mut collector = BackEdgeCollector::default();
  let starts = std::iter::once(root).chain(graph.node_ids());
  graph.traverse_forest(&mut collector, starts, EdgeFilter::All)?;
  Ok(collector.back_edges)
}

/// Whether every node in `required` stays reachable from `root` once `skipped` is gone.
fn keeps_reachable<T>(
  graph: &Graph<T>,
  root: NodeId,
  skipped: &Edge,
  required: &[NodeId],
) -> GraphResult<bool> {
  let mut visited = vec![false; graph.node_bound()];
  let mut stack = vec![root];
  visited[root] = true;

  while let Some(node_id) = stack.pop() {
    for edge in graph.outgoing_edges(node_id)? {
      if edge.seq == skipped.seq || visited[edge.to] {
        continue;
      }
      visited[edge.to] = true;
      stack.push(edge.to);
    }
  }

  Ok(required.iter().all(|node_id| visited[*node_id]))
}
