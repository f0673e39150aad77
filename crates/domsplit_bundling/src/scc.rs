use domsplit_core::graph::{EdgeFilter, Graph, NodeId};
use domsplit_core::GraphResult;
use serde::Serialize;
use tracing::{debug, instrument};

/// A maximal set of mutually reachable nodes, sorted by ascending [`NodeId`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StronglyConnectedComponent {
  pub nodes: Vec<NodeId>,
}

impl StronglyConnectedComponent {
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, node_id: NodeId) -> bool {
    self.nodes.binary_search(&node_id).is_ok()
  }

  /// True for a genuine cycle: more than one node, or a single node importing itself.
  pub fn is_cycle<T>(&self, graph: &Graph<T>) -> bool {
    match self.nodes.as_slice() {
      [] => false,
      [node_id] => graph.has_edge(*node_id, *node_id, EdgeFilter::All),
      _ => true,
    }
  }
}

const UNVISITED: usize = usize::MAX;

/// Tarjan's strongly connected components over every live node, following all edge kinds.
///
/// Components are returned in completion order, which is a reverse topological order of
/// the condensed graph. Starting nodes are tried in ascending id order so disconnected
/// parts of the graph are covered too.
///
/// The depth-first search keeps its own frame stack, so arbitrarily long import chains
/// do not grow the thread stack.
#[instrument(level = "debug", skip_all)]
pub fn find_strongly_connected_components<T>(
  graph: &Graph<T>,
) -> GraphResult<Vec<StronglyConnectedComponent>> {
  let bound = graph.node_bound();
  let mut index = vec![UNVISITED; bound];
  let mut lowlink = vec![0; bound];
  let mut on_stack = vec![false; bound];
  let mut next_index = 0;

  let mut component_stack: Vec<NodeId> = Vec::new();
  let mut call_stack = Vec::new();
  let mut components = Vec::new();

  for start in graph.node_ids() {
    if index[start] != UNVISITED {
      continue;
    }

    index[start] = next_index;
    lowlink[start] = next_index;
    next_index += 1;
    component_stack.push(start);
    on_stack[start] = true;
    call_stack.push((start, graph.get_node_ids_connected_from(start, EdgeFilter::All)?));

    while let Some((node_id, neighbors)) = call_stack.last_mut() {
      let node_id = *node_id;

      match neighbors.next() {
        Some(next) if index[next] == UNVISITED => {
          index[next] = next_index;
          lowlink[next] = next_index;
          next_index += 1;
          component_stack.push(next);
          on_stack[next] = true;
          call_stack.push((next, graph.get_node_ids_connected_from(next, EdgeFilter::All)?));
        }
        Some(next) => {
          if on_stack[next] {
            lowlink[node_id] = lowlink[node_id].min(index[next]);
          }
        }
        None => {
          call_stack.pop();

          if let Some((parent, _)) = call_stack.last() {
            lowlink[*parent] = lowlink[*parent].min(lowlink[node_id]);
          }

          if lowlink[node_id] == index[node_id] {
            let mut nodes = Vec::new();
            while let Some(member) = component_stack.pop() {
              on_stack[member] = false;
              nodes.push(member);
              if member == node_id {
                break;
              }
            }
            nodes.sort_unstable();
            components.push(StronglyConnectedComponent { nodes });
          }
        }
      }
    }
  }

  debug!(
    nodes = graph.node_count(),
    components = components.len(),
    "scc: found strongly connected components"
  );

  Ok(components)
}

/// Components that form a cycle (see [`StronglyConnectedComponent::is_cycle`]).
pub fn find_cycles<T>(graph: &Graph<T>) -> GraphResult<Vec<StronglyConnectedComponent>> {
  Ok(
    find_strongly_connected_components(graph)?
      .into_iter()
      .filter(|component| component.is_cycle(graph))
      .collect(),
  )
}

pub fn is_acyclic<T>(graph: &Graph<T>) -> GraphResult<bool> {
  Ok(find_cycles(graph)?.is_empty())
}
