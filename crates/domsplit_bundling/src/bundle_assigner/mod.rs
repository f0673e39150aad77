//! Decides which bundle owns every reachable asset.
//!
//! An asset belongs to the entry whose dominator subtree contains it. Assets that no single
//! entry dominates are hoisted into shared bundles. The grouping of those is delegated to a
//! [`SharedBundlePolicy`], so other hoisting heuristics only need a new policy.

mod shared_bundles;
mod types;

use domsplit_core::graph::{EdgeFilter, Graph, NodeId};
use domsplit_core::GraphResult;
use indexmap::IndexMap;
use tracing::{debug, instrument};

pub use self::shared_bundles::*;
pub use self::types::*;
use crate::dominator_tree::DominatorTable;
use crate::options::BundlerOptions;

#[derive(Debug)]
pub struct BundleAssigner {
  options: BundlerOptions,
  policy: Box<dyn SharedBundlePolicy>,
}

impl Default for BundleAssigner {
  fn default() -> Self {
    Self::new(BundlerOptions::default())
  }
}

impl BundleAssigner {
  pub fn new(options: BundlerOptions) -> Self {
    let policy = options.shared_bundles.policy();
    Self { options, policy }
  }

  /// Replaces the policy selected by [`BundlerOptions::shared_bundles`].
  pub fn with_policy(mut self, policy: impl SharedBundlePolicy + 'static) -> Self {
    self.policy = Box::new(policy);
    self
  }

  /// Direct children of the root in ascending order.
  ///
  /// A root with fewer than two children is a single-entry graph and the root itself is the
  /// entry, as it is whenever [`BundlerOptions::root_is_entry`] is set.
  pub fn entries<T>(&self, graph: &Graph<T>, root: NodeId) -> GraphResult<Vec<NodeId>> {
    let mut entries: Vec<NodeId> = graph
      .get_node_ids_connected_from(root, EdgeFilter::All)?
      .filter(|node_id| *node_id != root)
      .collect();
    entries.sort_unstable();
    entries.dedup();

    if self.options.root_is_entry || entries.len() < 2 {
      return Ok(vec![root]);
    }
    Ok(entries)
  }

  #[instrument(level = "debug", skip_all)]
  pub fn assign<T>(
    &self,
    graph: &Graph<T>,
    table: &DominatorTable,
  ) -> GraphResult<BundleAssignment> {
    let root = table.root();
    let entries = self.entries(graph, root)?;
    let mut builder = AssignmentBuilder::new(graph.node_bound(), self.options.collect_debug);

    for entry in &entries {
      builder.bundle_index(BundleId::Entry(*entry), vec![*entry]);
      builder.decision("entries", DecisionKind::EntryBundleCreated { entry: *entry });
    }

    if entries == [root] {
      for node_id in graph.node_ids().filter(|n| table.is_reachable(*n)) {
        let reason = if node_id == root {
          PlacementReason::Entry
        } else {
          PlacementReason::DominatedByEntry { merge_point: root }
        };
        builder.place(node_id, BundleId::Entry(root), vec![root], reason);
      }
    } else {
      self.place_assets(graph, table, &entries, &mut builder)?;
    }

    let unreachable = table.unreachable_nodes(graph);
    for node_id in &unreachable {
      builder.decision(
        "unreachable",
        DecisionKind::UnreachableSkipped { node_id: *node_id },
      );
    }

    let assignment = builder.finish(entries, unreachable);

    debug!(
      entries = assignment.entries.len(),
      bundles = assignment.bundles.len(),
      shared_bundles = assignment.shared_bundles().count(),
      shared_nodes = assignment.shared_nodes.len(),
      unreachable = assignment.unreachable.len(),
      "bundle assigner: assigned assets"
    );

    Ok(assignment)
  }

  fn place_assets<T>(
    &self,
    graph: &Graph<T>,
    table: &DominatorTable,
    entries: &[NodeId],
    builder: &mut AssignmentBuilder,
  ) -> GraphResult<()> {
    let root = table.root();
    let merge_points = merge_points(table);
    let reachability = EntryReachability::new(graph, table, entries)?;

    // Nodes sharing a merge point share a bundle, so each merge point is resolved once
    let mut resolved: Vec<Option<(BundleId, Vec<NodeId>)>> = vec![None; graph.node_bound()];

    for node_id in graph.node_ids() {
      if node_id == root {
        continue;
      }
      let Some(merge_point) = merge_points.get(node_id).copied().flatten() else {
        continue;
      };

      if reachability.is_entry(merge_point) {
        let reason = if node_id == merge_point {
          PlacementReason::Entry
        } else {
          PlacementReason::DominatedByEntry { merge_point }
        };
        builder.place(node_id, BundleId::Entry(merge_point), vec![merge_point], reason);
        continue;
      }

      if resolved[merge_point].is_none() {
        let reaching = reachability.reaching_entries(merge_point);
        let reaching_entries = reachability.entry_ids(reaching);
        let bundle_id = self.shared_bundle_for(merge_point, &reaching_entries, entries);
        resolved[merge_point] = Some((bundle_id, reaching_entries));
      }

      if let Some((bundle_id, reaching_entries)) = &resolved[merge_point] {
        let reason = PlacementReason::Shared {
          merge_point,
          reaching_entries: reaching_entries.len(),
        };
        builder.place(node_id, bundle_id.clone(), reaching_entries.clone(), reason);
      }
    }

    Ok(())
  }

  /// The shared bundle for assets hoisted out of `merge_point`.
  ///
  /// Every path from the root starts at an entry, so a merge point that no entry dominates is
  /// reached by at least two of them.
  fn shared_bundle_for(
    &self,
    merge_point: NodeId,
    reaching_entries: &[NodeId],
    entries: &[NodeId],
  ) -> BundleId {
    debug_assert!(
      reaching_entries.len() >= 2,
      "merge point {merge_point} is reached by fewer than two entries"
    );

    if reaching_entries.len() == entries.len() {
      return BundleId::Shared(SharedBundleKey::Global);
    }
    BundleId::Shared(self.policy.shared_bundle_key(merge_point, reaching_entries))
  }
}

struct AssignmentBuilder {
  bundles: IndexMap<BundleId, Bundle>,
  assignments: Vec<Option<usize>>,
  shared_nodes: Vec<NodeId>,
  decisions: Option<DecisionLog>,
}

impl AssignmentBuilder {
  fn new(node_bound: usize, collect_debug: bool) -> Self {
    AssignmentBuilder {
      bundles: IndexMap::new(),
      assignments: vec![None; node_bound],
      shared_nodes: Vec::new(),
      decisions: collect_debug.then(DecisionLog::default),
    }
  }

  fn decision(&mut self, phase: &'static str, kind: DecisionKind) {
    if let Some(decisions) = &mut self.decisions {
      decisions.push(phase, kind);
    }
  }

  fn bundle_index(&mut self, bundle_id: BundleId, entries: Vec<NodeId>) -> usize {
    if let Some(index) = self.bundles.get_index_of(&bundle_id) {
      return index;
    }

    if bundle_id.is_shared() {
      self.decision(
        "shared",
        DecisionKind::SharedBundleCreated {
          bundle_id: bundle_id.clone(),
          entries: entries.clone(),
        },
      );
    }

    let (index, _) = self
      .bundles
      .insert_full(bundle_id.clone(), Bundle::new(bundle_id, entries));
    index
  }

  /// Nodes must be placed in ascending id order so bundle asset lists stay sorted.
  fn place(
    &mut self,
    node_id: NodeId,
    bundle_id: BundleId,
    entries: Vec<NodeId>,
    reason: PlacementReason,
  ) {
    let index = self.bundle_index(bundle_id.clone(), entries);
    if let Some((_, bundle)) = self.bundles.get_index_mut(index) {
      bundle.assets.push(node_id);
    }
    self.assignments[node_id] = Some(index);

    if bundle_id.is_shared() {
      self.shared_nodes.push(node_id);
    }

    self.decision(
      "placement",
      DecisionKind::AssetPlaced {
        node_id,
        bundle_id,
        reason,
      },
    );
  }

  fn finish(self, entries: Vec<NodeId>, unreachable: Vec<NodeId>) -> BundleAssignment {
    BundleAssignment {
      entries,
      bundles: self.bundles.into_values().collect(),
      assignments: self.assignments,
      shared_nodes: self.shared_nodes,
      unreachable,
      debug: self.decisions,
    }
  }
}
