use std::fmt::Debug;

use domsplit_core::graph::{EdgeFilter, Graph, NodeId};
use domsplit_core::GraphResult;
use fixedbitset::FixedBitSet;

use super::types::SharedBundleKey;
use crate::dominator_tree::DominatorTable;
use crate::options::SharedBundleKeying;

/// Decides which shared bundle an asset goes to once it is known that several, but not all,
/// entries load it.
pub trait SharedBundlePolicy: Debug + Send + Sync {
  /// `reaching_entries` is sorted ascending and holds at least two entries.
  fn shared_bundle_key(&self, merge_point: NodeId, reaching_entries: &[NodeId]) -> SharedBundleKey;
}

/// Groups assets by the exact set of entries that load them.
#[derive(Debug, Default)]
pub struct EntrySetPolicy;

impl SharedBundlePolicy for EntrySetPolicy {
  fn shared_bundle_key(
    &self,
    _merge_point: NodeId,
    reaching_entries: &[NodeId],
  ) -> SharedBundleKey {
    SharedBundleKey::Entries(reaching_entries.to_vec())
  }
}

/// One shared bundle per dominator tree merge point.
#[derive(Debug, Default)]
pub struct MergePointPolicy;

impl SharedBundlePolicy for MergePointPolicy {
  fn shared_bundle_key(
    &self,
    merge_point: NodeId,
    _reaching_entries: &[NodeId],
  ) -> SharedBundleKey {
    SharedBundleKey::MergePoint(merge_point)
  }
}

impl SharedBundleKeying {
  pub fn policy(&self) -> Box<dyn SharedBundlePolicy> {
    match self {
      SharedBundleKeying::EntrySet => Box::new(EntrySetPolicy),
      SharedBundleKeying::MergePoint => Box::new(MergePointPolicy),
    }
  }
}

/// The highest ancestor of each reachable node in the dominator tree below the root.
///
/// Indexed by [`NodeId`]; `None` for the root and unreachable nodes. A node whose immediate
/// dominator is the root is its own merge point.
pub fn merge_points(table: &DominatorTable) -> Vec<Option<NodeId>> {
  let root = table.root();
  let mut merge_points = vec![None; table.as_slice().len()];

  // Dominators exit the depth-first walk after the nodes they dominate, so walking the
  // reverse post order resolves every dominator before its subtree.
  for node_id in table.post_order().iter().rev().copied() {
    let Some(dominator) = table.immediate_dominator(node_id) else {
      continue;
    };

    merge_points[node_id] = if dominator == root {
      Some(node_id)
    } else {
      merge_points[dominator]
    };
  }

  merge_points
}

/// The entries that can load each node, as bit sets over entry positions.
///
/// Computed in one pass over the reverse post order of the dominator table, which is a
/// topological order once the graph is acyclic: every node takes the union of its reachable
/// predecessors' sets, and an entry adds itself. Edges leaving the root are not followed, so an
/// entry is only reached by itself and the entries that import it.
pub struct EntryReachability {
  entries: Vec<NodeId>,
  entry_ordinals: Vec<Option<usize>>,
  reaching: Vec<FixedBitSet>,
}

impl EntryReachability {
  pub fn new<T>(
    graph: &Graph<T>,
    table: &DominatorTable,
    entries: &[NodeId],
  ) -> GraphResult<Self> {
    let root = table.root();
    let mut entry_ordinals = vec![None; graph.node_bound()];
    for (ordinal, entry) in entries.iter().enumerate() {
      entry_ordinals[*entry] = Some(ordinal);
    }

    let mut reaching = vec![FixedBitSet::new(); graph.node_bound()];
    for node_id in table.post_order().iter().rev().copied() {
      if node_id == root {
        continue;
      }

      let mut bits = FixedBitSet::with_capacity(entries.len());
      for predecessor in graph.get_node_ids_connected_to(node_id, EdgeFilter::All)? {
        if predecessor == root || !table.is_reachable(predecessor) {
          continue;
        }
        bits.union_with(&reaching[predecessor]);
      }
      if let Some(ordinal) = entry_ordinals[node_id] {
        bits.insert(ordinal);
      }
      reaching[node_id] = bits;
    }

    Ok(EntryReachability {
      entries: entries.to_vec(),
      entry_ordinals,
      reaching,
    })
  }

  pub fn is_entry(&self, node_id: NodeId) -> bool {
    matches!(self.entry_ordinals.get(node_id), Some(Some(_)))
  }

  /// Every entry that reaches `node_id`; empty for the root and unreachable nodes.
  pub fn reaching_entries(&self, node_id: NodeId) -> &FixedBitSet {
    &self.reaching[node_id]
  }

  /// Converts a bit set from [`Self::reaching_entries`] back to sorted entry ids.
  pub fn entry_ids(&self, reaching: &FixedBitSet) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = reaching.ones().map(|ordinal| self.entries[ordinal]).collect();
    ids.sort_unstable();
    ids
  }
}
