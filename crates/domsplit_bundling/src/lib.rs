//! Dominator-based bundle assignment.
//!
//! The pipeline runs in four phases over one [`Graph`]:
//!
//! 1. [`cycle_breaker`] removes edges until the graph is acyclic, using [`scc`] to find cycles
//! 2. [`dominator_tree`] computes the immediate dominator of every reachable node
//! 3. [`bundle_assigner`] places every reachable node in an entry or shared bundle
//! 4. nodes the root cannot reach are reported as dead code
//!
//! [`DominatorBundler`] wires the phases together behind the [`Bundler`] trait.

pub mod bundle_assigner;
pub mod cycle_breaker;
pub mod dominator_tree;
pub mod options;
pub mod scc;

use std::fmt::Debug;

use anyhow::Context;
use domsplit_core::debug_tools::DebugTools;
use domsplit_core::diagnostic::{Diagnostic, Diagnostics};
use domsplit_core::graph::Graph;
use serde::Serialize;
use tracing::{debug, instrument};

use self::bundle_assigner::{BundleAssigner, BundleAssignment};
use self::cycle_breaker::{CycleBreaker, RemovedEdge};
use self::dominator_tree::build_dominator_table;
pub use self::options::{BundlerOptions, SharedBundleKeying};

/// Bundler algorithms take an asset graph and assign every asset to a bundle.
///
/// Implementations may remove edges from the graph (to break cycles) but never touch node
/// payloads.
pub trait Bundler<T> {
  fn bundle(&self, graph: &mut Graph<T>) -> anyhow::Result<BundleOutput>;
}

/// Summary counts from one bundling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleStats {
  pub nodes: usize,
  pub edges: usize,
  pub cycles_broken: usize,
  pub bundles: usize,
  pub shared_bundles: usize,
  pub unreachable: usize,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleOutput {
  pub assignment: BundleAssignment,
  pub removed_edges: Vec<RemovedEdge>,
  pub diagnostics: Diagnostics,
  pub stats: BundleStats,
}

/// Runs cycle breaking, dominance and bundle assignment in order.
#[derive(Debug)]
pub struct DominatorBundler {
  pub options: BundlerOptions,
}

impl Default for DominatorBundler {
  fn default() -> Self {
    Self::new(BundlerOptions::default())
  }
}

impl DominatorBundler {
  /// Also enables any debug tools named in `DOMSPLIT_DEBUG_TOOLS`.
  pub fn new(options: BundlerOptions) -> Self {
    Self::with_debug_tools(options, &DebugTools::from_env())
  }

  pub fn with_debug_tools(options: BundlerOptions, debug_tools: &DebugTools) -> Self {
    Self {
      options: options.with_debug_tools(debug_tools),
    }
  }
}

impl<T: Debug> Bundler<T> for DominatorBundler {
  #[instrument(level = "debug", skip_all)]
  fn bundle(&self, graph: &mut Graph<T>) -> anyhow::Result<BundleOutput> {
    let root = graph
      .root_node_id()
      .context("bundling requires a root node")?;

    let stats = BundleStats {
      nodes: graph.node_count(),
      edges: graph.edge_count(),
      ..BundleStats::default()
    };
    debug!(
      root,
      nodes = stats.nodes,
      edges = stats.edges,
      "dominator bundler: input stats"
    );

    // Phase 1: make the graph acyclic.
    let cycle_report = CycleBreaker::new()
      .break_cycles(graph)
      .context("breaking dependency cycles")?;

    if self.options.emit_graph_dot {
      debug!(dot = %graph.to_dot(), "dominator bundler: acyclic graph");
    }

    // Phase 2: dominance.
    let table = build_dominator_table(graph).context("computing dominators")?;

    // Phase 3: placement.
    let assignment = BundleAssigner::new(self.options.clone())
      .assign(graph, &table)
      .context("assigning assets to bundles")?;

    // Phase 4: diagnostics.
    let mut diagnostics = cycle_report.diagnostics;
    if !assignment.unreachable.is_empty() {
      diagnostics.push(Diagnostic::unreachable_assets(&assignment.unreachable));
    }

    let stats = BundleStats {
      cycles_broken: cycle_report.removed_edges.len(),
      bundles: assignment.bundles.len(),
      shared_bundles: assignment.shared_bundles().count(),
      unreachable: assignment.unreachable.len(),
      ..stats
    };
    debug!(
      cycles_broken = stats.cycles_broken,
      bundles = stats.bundles,
      shared_bundles = stats.shared_bundles,
      unreachable = stats.unreachable,
      diagnostics = diagnostics.len(),
      "dominator bundler: done"
    );

    Ok(BundleOutput {
      assignment,
      removed_edges: cycle_report.removed_edges,
      diagnostics,
      stats,
    })
  }
}
