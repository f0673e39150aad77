use super::EdgeKind;
use super::Graph;
use super::NodeId;
use crate::GraphError;
use crate::GraphResult;

/// Convenience builder for bundler input graphs rooted at a synthetic root.
///
/// Mirrors how the asset graph is simplified before bundling:
///
/// ```text
/// root -> entry        (sync, entry_asset)
/// a -> b               (sync, sync_dependency)
/// a -> b, root -> b    (async, async_dependency)
/// ```
///
/// Async targets get an extra edge from the root, so they become bundle entries of their
/// own and are loaded on demand by their importer.
pub struct GraphBuilder<T> {
  graph: Graph<T>,
  root: NodeId,
  error: Option<GraphError>,
}

impl<T> GraphBuilder<T> {
  pub fn new(root_payload: T) -> Self {
    let mut graph = Graph::new();
    let root = graph.add_node(root_payload);

    GraphBuilder {
      graph,
      root,
      error: None,
    }
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn entry_asset(&mut self, payload: T) -> NodeId {
    let asset = self.graph.add_node(payload);
    self.edge(self.root, asset, EdgeKind::Sync);
    asset
  }

  pub fn asset(&mut self, payload: T) -> NodeId {
    self.graph.add_node(payload)
  }

  pub fn sync_dependency(&mut self, source: NodeId, target: NodeId) -> &mut Self {
    self.edge(source, target, EdgeKind::Sync);
    self
  }

  pub fn async_dependency(&mut self, source: NodeId, target: NodeId) -> &mut Self {
    self.edge(source, target, EdgeKind::Async);
    self.edge(self.root, target, EdgeKind::Async);
    self
  }

  /// Returns the graph, or the first error hit while wiring edges.
  pub fn build(self) -> GraphResult<Graph<T>> {
    if let Some(error) = self.error {
      return Err(error);
    }

    let mut graph = self.graph;
    graph.set_root_node_id(self.root)?;
    Ok(graph)
  }

  fn edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
    if self.error.is_some() {
      return;
    }

    if let Err(error) = self.graph.add_edge(from, to, kind) {
      self.error = Some(error);
    }
  }
}
