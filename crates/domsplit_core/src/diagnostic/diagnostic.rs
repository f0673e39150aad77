use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::graph::EdgeKind;
use crate::graph::NodeId;

pub const UNBREAKABLE_CYCLE: &str = "UnbreakableCycle";
pub const UNREACHABLE_ASSETS: &str = "UnreachableAssets";

/// A user facing report emitted by the partitioner.
///
/// These never fail a build. The driving bundler decides how to surface them.
#[derive(Error, Debug, Deserialize, PartialEq, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  /// A summary user-facing message
  pub message: String,

  /// Indicates where this diagnostic was emitted from
  pub origin: Option<String>,

  /// Name of the diagnostic, e.g. [`UNBREAKABLE_CYCLE`]
  pub name: Option<String>,

  /// Hints for the user
  pub hints: Option<Vec<String>>,

  /// Diagnostic specific metadata
  pub meta: Option<serde_json::Value>,
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message)
  }
}

impl Diagnostic {
  pub fn name_matches<N: AsRef<str>>(&self, name: N) -> bool {
    self.name.as_ref().is_some_and(|n| n == name.as_ref())
  }

  /// A cycle could only be broken by dropping an edge some node depended on for reachability.
  pub fn unbreakable_cycle(from: NodeId, to: NodeId, kind: EdgeKind, reason: &str) -> Self {
    Diagnostic {
      message: format!(
        "Dependency cycle could not be broken without disconnecting a module; removed {kind} edge {from} -> {to}"
      ),
      origin: Some(String::from("cycle_breaker")),
      name: Some(String::from(UNBREAKABLE_CYCLE)),
      hints: Some(vec![String::from(
        "The target module may be duplicated or loaded later than expected. Consider removing the circular import.",
      )]),
      meta: Some(json!({
        "from": from,
        "to": to,
        "kind": kind,
        "reason": reason,
      })),
    }
  }

  /// Nodes that cannot be reached from the root are dead code and are left out of every bundle.
  pub fn unreachable_assets(node_ids: &[NodeId]) -> Self {
    Diagnostic {
      message: format!(
        "{} module(s) are not reachable from any entry and were excluded from bundling",
        node_ids.len()
      ),
      origin: Some(String::from("bundle_assigner")),
      name: Some(String::from(UNREACHABLE_ASSETS)),
      hints: None,
      meta: Some(json!({ "nodeIds": node_ids })),
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn test_unbreakable_cycle_carries_edge_metadata() {
    let diagnostic = Diagnostic::unbreakable_cycle(3, 1, EdgeKind::Async, "forced");

    assert!(diagnostic.name_matches(UNBREAKABLE_CYCLE));
    assert_eq!(
      diagnostic.meta,
      Some(json!({ "from": 3, "to": 1, "kind": "async", "reason": "forced" }))
    );
    assert_eq!(
      diagnostic.to_string(),
      "Dependency cycle could not be broken without disconnecting a module; removed async edge 3 -> 1"
    );
  }

  #[test]
  fn test_serializes_in_camel_case() {
    let diagnostic = Diagnostic::unreachable_assets(&[4, 5]);
    let value = serde_json::to_value(&diagnostic).unwrap();

    assert_eq!(value["name"], json!(UNREACHABLE_ASSETS));
    assert_eq!(value["meta"]["nodeIds"], json!([4, 5]));
    assert!(!diagnostic.name_matches(UNBREAKABLE_CYCLE));
  }
}
