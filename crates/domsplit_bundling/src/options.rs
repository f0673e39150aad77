use domsplit_core::debug_tools::DebugTools;
use serde::{Deserialize, Serialize};

/// How assets reachable from several entries are grouped into shared bundles.
///
/// Assets reachable from every entry always go to the single global shared bundle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SharedBundleKeying {
  /// One shared bundle per distinct set of entries that load the asset
  #[default]
  EntrySet,
  /// One shared bundle per dominator tree merge point
  MergePoint,
}

/// Configuration for [`DominatorBundler`](crate::DominatorBundler).
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundlerOptions {
  /// Treat the root itself as the only entry even when it has several direct children
  pub root_is_entry: bool,

  pub shared_bundles: SharedBundleKeying,

  /// Record a [`DecisionLog`](crate::bundle_assigner::DecisionLog) on the assignment
  pub collect_debug: bool,

  /// Log the cycle-free graph in graphviz format at debug level
  pub emit_graph_dot: bool,
}

impl BundlerOptions {
  pub fn from_json(json: &str) -> serde_json::Result<Self> {
    serde_json::from_str(json)
  }

  /// Turns on the debug outputs requested through `DOMSPLIT_DEBUG_TOOLS`.
  pub fn with_debug_tools(mut self, debug_tools: &DebugTools) -> Self {
    self.collect_debug |= debug_tools.decision_log;
    self.emit_graph_dot |= debug_tools.graph_dot;
    self
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_empty_object_gives_defaults() {
    assert_eq!(
      BundlerOptions::from_json("{}").unwrap(),
      BundlerOptions::default()
    );
  }

  #[test]
  fn test_parses_camel_case_fields() {
    let options = BundlerOptions::from_json(
      r#"{ "rootIsEntry": true, "sharedBundles": "mergePoint", "collectDebug": true }"#,
    )
    .unwrap();

    assert_eq!(
      options,
      BundlerOptions {
        root_is_entry: true,
        shared_bundles: SharedBundleKeying::MergePoint,
        collect_debug: true,
        emit_graph_dot: false,
      }
    );
  }

  #[test]
  fn test_rejects_unknown_keying() {
    let error = BundlerOptions::from_json(r#"{ "sharedBundles": "bySize" }"#).unwrap_err();

    assert!(error.to_string().contains("unknown variant"));
  }

  #[test]
  fn test_serializes_back_to_camel_case() {
    let value = serde_json::to_value(BundlerOptions::default()).unwrap();

    assert_eq!(
      value,
      serde_json::json!({
        "rootIsEntry": false,
        "sharedBundles": "entrySet",
        "collectDebug": false,
        "emitGraphDot": false,
      })
    );
  }

  #[test]
  fn test_debug_tools_only_turn_options_on() {
    let options = BundlerOptions {
      collect_debug: true,
      ..BundlerOptions::default()
    }
    .with_debug_tools(&DebugTools {
      graph_dot: true,
      decision_log: false,
    });

    assert!(options.collect_debug);
    assert!(options.emit_graph_dot);
  }
}
