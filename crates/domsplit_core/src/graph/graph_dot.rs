use std::fmt::Debug;

use petgraph::dot::Dot;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;

use super::EdgeKind;
use super::Graph;

/// Graphviz rendering for debugging, enabled through the `graph-dot` debug tool.
impl<T: Debug> Graph<T> {
  /// Copies the graph into a petgraph `StableDiGraph` whose node indexes equal our node ids.
  pub fn to_stable_graph(&self) -> StableDiGraph<String, EdgeKind> {
    let mut result = StableDiGraph::with_capacity(self.node_bound(), self.edge_count());

    for node_id in 0..self.node_bound() {
      let label = match self.node(node_id) {
        Ok(payload) => format!("{node_id}: {payload:?}"),
        Err(_) => String::new(),
      };
      result.add_node(label);
    }

    for edge in self.edges() {
      result.add_edge(NodeIndex::new(edge.from), NodeIndex::new(edge.to), edge.kind);
    }

    for node_id in 0..self.node_bound() {
      if !self.contains_node(node_id) {
        result.remove_node(NodeIndex::new(node_id));
      }
    }

    result
  }

  pub fn to_dot(&self) -> String {
    format!("{}", Dot::new(&self.to_stable_graph()))
  }
}
