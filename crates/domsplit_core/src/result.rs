use thiserror::Error;

use crate::graph::NodeId;

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Structural errors raised by graph operations.
///
/// These are always caller bugs: they abort the bundling pass and are never retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
  #[error("node id {0} does not exist or has been removed")]
  InvalidNodeId(NodeId),

  #[error("the graph has no root node; call set_root_node_id first")]
  MissingRoot,
}

impl GraphError {
  pub fn is_invalid_node_id(&self) -> bool {
    matches!(self, GraphError::InvalidNodeId(_))
  }
}
