use super::Edge;
use super::EdgeFilter;
use super::Graph;
use super::NodeId;
use crate::GraphResult;

/// Callbacks invoked by [`Graph::traverse`].
///
/// `enter` fires when a node is first discovered, `exit` once all of its descendants
/// have been exited. `back_edge` fires for an edge whose target is still being visited
/// (an ancestor on the current DFS path, or the node itself).
pub trait GraphVisitor {
  fn enter(&mut self, _node_id: NodeId) {}

  fn exit(&mut self, _node_id: NodeId) {}

  fn back_edge(&mut self, _edge: Edge) {}
}

/// Collects nodes in the order they are exited.
#[derive(Debug, Default)]
pub struct PostOrderVisitor {
  pub order: Vec<NodeId>,
}

impl GraphVisitor for PostOrderVisitor {
  fn exit(&mut self, node_id: NodeId) {
    self.order.push(node_id);
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
  Unvisited,
  OnPath,
  Done,
}

impl<T> Graph<T> {
  /// Depth-first walk from `start_id`, following edges accepted by `filter` in insertion order.
  ///
  /// Uses an explicit stack, so path length is bounded by memory rather than thread stack size.
  pub fn traverse<V: GraphVisitor>(
    &self,
    visitor: &mut V,
    start_id: NodeId,
    filter: EdgeFilter,
  ) -> GraphResult<()> {
    self.traverse_forest(visitor, [start_id], filter)
  }

  /// Depth-first walk from each of `start_ids` in turn, skipping starts an earlier walk
  /// already reached. Visit state is shared, so every node is entered at most once.
  pub fn traverse_forest<V, I>(
    &self,
    visitor: &mut V,
    start_ids: I,
    filter: EdgeFilter,
  ) -> GraphResult<()>
  where
    V: GraphVisitor,
    I: IntoIterator<Item = NodeId>,
  {
    let mut state = vec![VisitState::Unvisited; self.node_bound()];
    // (node, position of the next outgoing edge to look at)
    let mut stack: Vec<(NodeId, usize)> = Vec::new();

    for start_id in start_ids {
      self.ensure_node(start_id)?;
      if state[start_id] != VisitState::Unvisited {
        continue;
      }

      state[start_id] = VisitState::OnPath;
      visitor.enter(start_id);
      stack.push((start_id, 0));

      while let Some(frame) = stack.last_mut() {
        let node_id = frame.0;
        let edge_count = self.outgoing_slice_len(node_id);
        let mut next_child = None;

        while frame.1 < edge_count {
          let edge = self.outgoing_edge_at(node_id, frame.1);
          frame.1 += 1;

          if !filter.matches(edge.kind) {
            continue;
          }

          match state[edge.to] {
            VisitState::Unvisited => {
              next_child = Some(edge.to);
              break;
            }
            VisitState::OnPath => visitor.back_edge(edge),
            VisitState::Done => {}
          }
        }

        match next_child {
          Some(child) => {
            state[child] = VisitState::OnPath;
            visitor.enter(child);
            stack.push((child, 0));
          }
          None => {
            stack.pop();
            state[node_id] = VisitState::Done;
            visitor.exit(node_id);
          }
        }
      }
    }

    Ok(())
  }

  pub fn post_order(&self, start_id: NodeId, filter: EdgeFilter) -> GraphResult<Vec<NodeId>> {
    let mut visitor = PostOrderVisitor::default();
    self.traverse(&mut visitor, start_id, filter)?;
    Ok(visitor.order)
  }

  /// Marks every node reachable from `start_id`, indexed by [`NodeId`].
  pub fn reachable_from(&self, start_id: NodeId, filter: EdgeFilter) -> GraphResult<Vec<bool>> {
    let mut reachable = vec![false; self.node_bound()];
    for node_id in self.post_order(start_id, filter)? {
      reachable[node_id] = true;
    }
    Ok(reachable)
  }
}
