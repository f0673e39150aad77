/// Debug tools for domsplit developers
///
/// To enable a tool, set the `DOMSPLIT_DEBUG_TOOLS` environment variable to a
/// comma-separated list of tool names. For example:
/// `DOMSPLIT_DEBUG_TOOLS="graph-dot,decision-log"`
///
/// You can enable all tools by setting `DOMSPLIT_DEBUG_TOOLS=all`.
pub const DEBUG_TOOLS_ENV_VAR: &str = "DOMSPLIT_DEBUG_TOOLS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugTools {
  /// Log the cycle-free input graph as graphviz at debug level
  pub graph_dot: bool,
  /// Record every placement decision on the bundle assignment
  pub decision_log: bool,
}

impl DebugTools {
  pub fn from_env() -> Self {
    match std::env::var(DEBUG_TOOLS_ENV_VAR) {
      Ok(env_value) => Self::parse(&env_value),
      Err(_) => Self::default(),
    }
  }

  pub fn parse(value: &str) -> Self {
    let mut tools = Self::default();

    for tool in value.split(',') {
      match tool.trim() {
        "all" => {
          tools.graph_dot = true;
          tools.decision_log = true;
          break;
        }
        "graph-dot" => tools.graph_dot = true,
        "decision-log" => tools.decision_log = true,
        "" => continue,
        unknown => {
          tracing::warn!(
            tool = unknown,
            "Unknown debug tool option. Valid options are: graph-dot, decision-log, all"
          );
        }
      }
    }

    tools
  }
}
