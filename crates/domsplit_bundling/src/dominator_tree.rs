use domsplit_core::graph::{EdgeFilter, Graph, NodeId};
use domsplit_core::GraphResult;
use serde::Serialize;
use tracing::{debug, instrument};

const UNDEFINED: usize = usize::MAX;

/// Immediate dominators of every node reachable from the graph root.
///
/// Indexed by [`NodeId`]. The root dominates itself and nodes that cannot be reached from
/// the root have no entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DominatorTable {
  root: NodeId,
  dominators: Vec<Option<NodeId>>,
  post_order: Vec<NodeId>,
  #[serde(skip)]
  post_order_indexes: Vec<usize>,
}

impl DominatorTable {
  pub fn root(&self) -> NodeId {
    self.root
  }

  /// The raw table: `dominators[root] == Some(root)`, `None` for unreachable nodes.
  pub fn as_slice(&self) -> &[Option<NodeId>] {
    &self.dominators
  }

  /// The closest strict dominator of `node_id`. `None` for the root and unreachable nodes.
  pub fn immediate_dominator(&self, node_id: NodeId) -> Option<NodeId> {
    if node_id == self.root {
      return None;
    }
    self.dominators.get(node_id).copied().flatten()
  }

  /// Walks from `node_id` up to the root, yielding `node_id` first.
  ///
  /// Returns `None` when the node is not reachable from the root.
  pub fn dominators_of(&self, node_id: NodeId) -> Option<DominatorsIter<'_>> {
    if self.is_reachable(node_id) {
      Some(DominatorsIter {
        table: self,
        next: Some(node_id),
      })
    } else {
      None
    }
  }

  /// Whether every path from the root to `node_id` goes through `dominator`.
  ///
  /// Every reachable node dominates itself.
  pub fn dominates(&self, dominator: NodeId, node_id: NodeId) -> bool {
    self
      .dominators_of(node_id)
      .is_some_and(|mut chain| chain.any(|ancestor| ancestor == dominator))
  }

  pub fn is_reachable(&self, node_id: NodeId) -> bool {
    matches!(self.dominators.get(node_id), Some(Some(_)))
  }

  /// Reachable nodes in the order the depth-first walk from the root exited them.
  pub fn post_order(&self) -> &[NodeId] {
    &self.post_order
  }

  pub fn post_order_index(&self, node_id: NodeId) -> Option<usize> {
    self
      .post_order_indexes
      .get(node_id)
      .copied()
      .filter(|index| *index != UNDEFINED)
  }

  /// Dominator tree child lists indexed by [`NodeId`], each in ascending id order.
  pub fn children(&self) -> Vec<Vec<NodeId>> {
    let mut children = vec![Vec::new(); self.dominators.len()];
    for (node_id, dominator) in self.dominators.iter().enumerate() {
      if let Some(dominator) = dominator {
        if node_id != self.root {
          children[*dominator].push(node_id);
        }
      }
    }
    children
  }

  /// Live nodes of `graph` that cannot be reached from the root.
  pub fn unreachable_nodes<T>(&self, graph: &Graph<T>) -> Vec<NodeId> {
    graph
      .node_ids()
      .filter(|node_id| !self.is_reachable(*node_id))
      .collect()
  }
}

pub struct DominatorsIter<'a> {
  table: &'a DominatorTable,
  next: Option<NodeId>,
}

impl Iterator for DominatorsIter<'_> {
  type Item = NodeId;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.next?;
    self.next = self.table.immediate_dominator(current);
    Some(current)
  }
}

/// Cooper, Harvey and Kennedy's "A Simple, Fast Dominance Algorithm".
///
/// Nodes are numbered by one depth-first walk from the root over every edge kind. The table
/// is then refined over the reverse post order until a full pass changes nothing. Each node
/// takes the intersection of the dominator chains of its already processed predecessors.
#[instrument(level = "debug", skip_all)]
pub fn build_dominator_table<T>(graph: &Graph<T>) -> GraphResult<DominatorTable> {
  let root = graph.root_node_id()?;
  let post_order = graph.post_order(root, EdgeFilter::All)?;

  let mut post_order_indexes = vec![UNDEFINED; graph.node_bound()];
  for (index, node_id) in post_order.iter().enumerate() {
    post_order_indexes[*node_id] = index;
  }

  let mut dominators = vec![None; graph.node_bound()];
  dominators[root] = Some(root);

  let mut passes = 0;
  let mut changed = true;
  while changed {
    changed = false;
    passes += 1;

    for node_id in post_order.iter().rev().copied() {
      if node_id == root {
        continue;
      }

      let mut new_dominator: Option<NodeId> = None;
      for predecessor in graph.get_node_ids_connected_to(node_id, EdgeFilter::All)? {
        // Unreachable and not yet processed predecessors have no dominator
        if dominators[predecessor].is_none() {
          continue;
        }

        new_dominator = Some(match new_dominator {
          None => predecessor,
          Some(current) => intersect(&dominators, &post_order_indexes, predecessor, current),
        });
      }

      if new_dominator.is_some() && dominators[node_id] != new_dominator {
        dominators[node_id] = new_dominator;
        changed = true;
      }
    }
  }

  debug!(
    nodes = graph.node_count(),
    reachable = post_order.len(),
    passes,
    "dominators: reached fixed point"
  );

  Ok(DominatorTable {
    root,
    dominators,
    post_order,
    post_order_indexes,
  })
}

/// Two-finger walk up both dominator chains until they meet.
///
/// Nodes higher in the dominator tree exit later, so the finger with the lower post order
/// index is always the one to advance.
fn intersect(
  dominators: &[Option<NodeId>],
  post_order_indexes: &[usize],
  mut finger1: NodeId,
  mut finger2: NodeId,
) -> NodeId {
  while finger1 != finger2 {
    while post_order_indexes[finger1] < post_order_indexes[finger2] {
      match dominators[finger1] {
        Some(next) => finger1 = next,
        None => return finger2,
      }
    }
    while post_order_indexes[finger2] < post_order_indexes[finger1] {
      match dominators[finger2] {
        Some(next) => finger2 = next,
        None => return finger1,
      }
    }
  }
  finger1
}
