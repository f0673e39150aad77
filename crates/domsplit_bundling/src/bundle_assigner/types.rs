use std::fmt;

use domsplit_core::graph::NodeId;
use domsplit_core::hash::{hash_string, IdentifierHasher};
use serde::{Deserialize, Serialize};

/// Identifies a shared bundle independently of the assets that end up in it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SharedBundleKey {
  /// Assets loaded by every entry
  Global,
  /// Assets loaded by exactly this set of entries, sorted ascending
  Entries(Vec<NodeId>),
  /// Assets hoisted out of the dominator subtree of this node
  MergePoint(NodeId),
}

impl fmt::Display for SharedBundleKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SharedBundleKey::Global => write!(f, "global"),
      SharedBundleKey::Entries(entries) => {
        write!(f, "entries:")?;
        for (i, entry) in entries.iter().enumerate() {
          if i > 0 {
            write!(f, ",")?;
          }
          write!(f, "{entry}")?;
        }
        Ok(())
      }
      SharedBundleKey::MergePoint(node_id) => write!(f, "merge-point:{node_id}"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BundleId {
  /// The bundle owned by one entry
  Entry(NodeId),
  Shared(SharedBundleKey),
}

impl BundleId {
  pub fn is_shared(&self) -> bool {
    matches!(self, BundleId::Shared(_))
  }
}

impl fmt::Display for BundleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BundleId::Entry(node_id) => write!(f, "entry:{node_id}"),
      BundleId::Shared(key) => write!(f, "shared:{key}"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
  pub id: BundleId,

  /// Stable placeholder used to reference the bundle before its contents are hashed
  pub hash_reference: String,

  /// Entries that load this bundle, sorted ascending
  pub entries: Vec<NodeId>,

  /// Member assets, sorted ascending
  pub assets: Vec<NodeId>,
}

impl Bundle {
  pub fn new(id: BundleId, entries: Vec<NodeId>) -> Self {
    Bundle {
      hash_reference: hash_string(format!("bundle:{id}")),
      id,
      entries,
      assets: Vec::new(),
    }
  }

  pub fn is_shared(&self) -> bool {
    self.id.is_shared()
  }
}

/// The partition of every reachable asset into bundles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAssignment {
  /// Entry nodes, ascending
  pub entries: Vec<NodeId>,

  /// Entry bundles in entry order, followed by shared bundles in the order they were created
  pub bundles: Vec<Bundle>,

  /// Index into `bundles` for every node id; `None` for the synthetic root and dead code
  pub assignments: Vec<Option<usize>>,

  /// Assets placed in a shared bundle, ascending
  pub shared_nodes: Vec<NodeId>,

  /// Nodes that cannot be reached from the root, ascending
  pub unreachable: Vec<NodeId>,

  #[serde(skip)]
  pub debug: Option<DecisionLog>,
}

impl BundleAssignment {
  pub fn bundle_of(&self, node_id: NodeId) -> Option<&Bundle> {
    let index = self.assignments.get(node_id).copied().flatten()?;
    self.bundles.get(index)
  }

  pub fn bundle_id_of(&self, node_id: NodeId) -> Option<&BundleId> {
    self.bundle_of(node_id).map(|bundle| &bundle.id)
  }

  pub fn bundle(&self, bundle_id: &BundleId) -> Option<&Bundle> {
    self.bundles.iter().find(|bundle| &bundle.id == bundle_id)
  }

  pub fn is_shared(&self, node_id: NodeId) -> bool {
    self.shared_nodes.binary_search(&node_id).is_ok()
  }

  pub fn shared_bundles(&self) -> impl Iterator<Item = &Bundle> {
    self.bundles.iter().filter(|bundle| bundle.is_shared())
  }

  /// Number of nodes that were placed in a bundle.
  pub fn assigned_count(&self) -> usize {
    self.assignments.iter().filter(|a| a.is_some()).count()
  }

  /// Hash of the whole partition, stable across runs, for build caches.
  pub fn content_hash(&self) -> String {
    let mut hasher = IdentifierHasher::new();
    for bundle in &self.bundles {
      hasher.update(bundle.id.to_string().as_bytes());
      hasher.update(b"[");
      for asset in &bundle.assets {
        hasher.update(&(*asset as u64).to_le_bytes());
      }
      hasher.update(b"]");
    }
    hasher.update(b"unreachable[");
    for node_id in &self.unreachable {
      hasher.update(&(*node_id as u64).to_le_bytes());
    }
    hasher.update(b"]");
    format!("{:016x}", hasher.digest())
  }
}

/// Why an asset ended up in its bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementReason {
  /// The asset is an entry
  Entry,
  /// The merge point of the asset is the entry it was placed in
  DominatedByEntry { merge_point: NodeId },
  /// Several entries load the merge point of the asset
  Shared {
    merge_point: NodeId,
    reaching_entries: usize,
  },
}

/// Typed decision event.
///
/// This is intended for debugging and should not be used for correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionKind {
  EntryBundleCreated {
    entry: NodeId,
  },
  SharedBundleCreated {
    bundle_id: BundleId,
    entries: Vec<NodeId>,
  },
  AssetPlaced {
    node_id: NodeId,
    bundle_id: BundleId,
    reason: PlacementReason,
  },
  UnreachableSkipped {
    node_id: NodeId,
  },
}

/// Single decision event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
  /// Monotonically increasing sequence number assigned by the logger.
  pub seq: u64,

  /// Phase name (free-form).
  pub phase: &'static str,

  pub kind: DecisionKind,
}

/// Decisions captured while assigning bundles, in the order they were made.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecisionLog {
  next_seq: u64,
  pub decisions: Vec<Decision>,
}

impl DecisionLog {
  pub fn push(&mut self, phase: &'static str, kind: DecisionKind) {
    let seq = self.next_seq;
    self.next_seq += 1;

    self.decisions.push(Decision { seq, phase, kind });
  }

  pub fn is_empty(&self) -> bool {
    self.decisions.is_empty()
  }

  pub fn len(&self) -> usize {
    self.decisions.len()
  }

  /// The placement decision recorded for `node_id`, if any.
  pub fn placement_of(&self, node_id: NodeId) -> Option<(&BundleId, PlacementReason)> {
    self.decisions.iter().find_map(|decision| match &decision.kind {
      DecisionKind::AssetPlaced {
        node_id: placed,
        bundle_id,
        reason,
      } if *placed == node_id => Some((bundle_id, *reason)),
      _ => None,
    })
  }
}
