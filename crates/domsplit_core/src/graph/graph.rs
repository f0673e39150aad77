use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::GraphError;
use crate::GraphResult;

/// Dense node identifier, reused as an index into every per-node table.
///
/// Ids are handed out contiguously from 0 and are never reassigned, even after
/// the node is removed.
pub type NodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
  /// The target is loaded together with the source
  Sync,
  /// The target is loaded lazily (dynamic import)
  Async,
}

impl EdgeKind {
  /// Lower values are dropped first when a cycle can only be broken lossily.
  pub fn removal_priority(&self) -> u8 {
    match self {
      EdgeKind::Async => 0,
      EdgeKind::Sync => 1,
    }
  }
}

impl fmt::Display for EdgeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EdgeKind::Sync => write!(f, "sync"),
      EdgeKind::Async => write!(f, "async"),
    }
  }
}

/// Selects which edges a query or traversal follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EdgeFilter {
  Only(EdgeKind),
  #[default]
  All,
}

impl EdgeFilter {
  pub fn matches(&self, kind: EdgeKind) -> bool {
    match self {
      EdgeFilter::Only(only) => *only == kind,
      EdgeFilter::All => true,
    }
  }
}

impl From<EdgeKind> for EdgeFilter {
  fn from(kind: EdgeKind) -> Self {
    EdgeFilter::Only(kind)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
  pub from: NodeId,
  pub to: NodeId,
  pub kind: EdgeKind,
  /// Insertion sequence number, unique within one graph
  pub seq: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AdjacentEdge {
  node: NodeId,
  kind: EdgeKind,
  seq: u64,
}

/// Directed multigraph over dense [`NodeId`]s with typed edges.
///
/// Outgoing and incoming adjacency lists are kept in edge insertion order so every
/// traversal over the graph is deterministic.
#[derive(Clone, Debug)]
pub struct Graph<T> {
  nodes: Vec<Option<T>>,
  outgoing: Vec<Vec<AdjacentEdge>>,
  incoming: Vec<Vec<AdjacentEdge>>,
  root_node_id: Option<NodeId>,
  node_count: usize,
  edge_count: usize,
  next_edge_seq: u64,
}

impl<T> Default for Graph<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Graph<T> {
  pub fn new() -> Self {
    Graph {
      nodes: Vec::new(),
      outgoing: Vec::new(),
      incoming: Vec::new(),
      root_node_id: None,
      node_count: 0,
      edge_count: 0,
      next_edge_seq: 0,
    }
  }

  pub fn with_capacity(nodes: usize) -> Self {
    Graph {
      nodes: Vec::with_capacity(nodes),
      outgoing: Vec::with_capacity(nodes),
      incoming: Vec::with_capacity(nodes),
      ..Self::new()
    }
  }

  pub fn add_node(&mut self, payload: T) -> NodeId {
    let node_id = self.nodes.len();
    self.nodes.push(Some(payload));
    self.outgoing.push(Vec::new());
    self.incoming.push(Vec::new());
    self.node_count += 1;
    node_id
  }

  /// Removes a node and every edge touching it, returning its payload.
  ///
  /// The id is tombstoned and never reused.
  pub fn remove_node(&mut self, node_id: NodeId) -> GraphResult<T> {
    self.ensure_node(node_id)?;

    let outgoing = std::mem::take(&mut self.outgoing[node_id]);
    for edge in &outgoing {
      if edge.node != node_id {
        self.incoming[edge.node].retain(|e| e.seq != edge.seq);
      }
    }
    self.edge_count -= outgoing.len();

    let incoming = std::mem::take(&mut self.incoming[node_id]);
    for edge in &incoming {
      if edge.node != node_id {
        self.outgoing[edge.node].retain(|e| e.seq != edge.seq);
        self.edge_count -= 1;
      }
    }

    if self.root_node_id == Some(node_id) {
      self.root_node_id = None;
    }

    self.node_count -= 1;
    self.nodes[node_id]
      .take()
      .ok_or(GraphError::InvalidNodeId(node_id))
  }

  pub fn contains_node(&self, node_id: NodeId) -> bool {
    matches!(self.nodes.get(node_id), Some(Some(_)))
  }

  pub fn node(&self, node_id: NodeId) -> GraphResult<&T> {
    match self.nodes.get(node_id) {
      Some(Some(payload)) => Ok(payload),
      _ => Err(GraphError::InvalidNodeId(node_id)),
    }
  }

  /// Live node ids in ascending order.
  pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(node_id, node)| node.as_ref().map(|_| node_id))
  }

  pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &T)> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(node_id, node)| node.as_ref().map(|payload| (node_id, payload)))
  }

  /// Number of live nodes.
  pub fn node_count(&self) -> usize {
    self.node_count
  }

  /// One past the highest id ever handed out. Use this to size per-node tables.
  pub fn node_bound(&self) -> usize {
    self.nodes.len()
  }

  pub fn edge_count(&self) -> usize {
    self.edge_count
  }

  pub fn is_empty(&self) -> bool {
    self.node_count == 0
  }

  /// Adds an edge. Returns `false` when an identical `(from, to, kind)` edge exists.
  pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> GraphResult<bool> {
    self.ensure_node(from)?;
    self.ensure_node(to)?;

    if self.outgoing[from]
      .iter()
      .any(|edge| edge.node == to && edge.kind == kind)
    {
      return Ok(false);
    }

    let seq = self.next_edge_seq;
    self.next_edge_seq += 1;

    self.outgoing[from].push(AdjacentEdge {
      node: to,
      kind,
      seq,
    });
    self.incoming[to].push(AdjacentEdge {
      node: from,
      kind,
      seq,
    });
    self.edge_count += 1;

    Ok(true)
  }

  /// Removes the `(from, to, kind)` edge. Returns `false` if there was no such edge.
  pub fn remove_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> GraphResult<bool> {
    self.ensure_node(from)?;
    self.ensure_node(to)?;

    let Some(position) = self.outgoing[from]
      .iter()
      .position(|edge| edge.node == to && edge.kind == kind)
    else {
      return Ok(false);
    };

    let removed = self.outgoing[from].remove(position);
    self.incoming[to].retain(|edge| edge.seq != removed.seq);
    self.edge_count -= 1;

    Ok(true)
  }

  pub fn has_edge(&self, from: NodeId, to: NodeId, filter: EdgeFilter) -> bool {
    self
      .outgoing
      .get(from)
      .is_some_and(|edges| edges.iter().any(|e| e.node == to && filter.matches(e.kind)))
  }

  pub fn set_root_node_id(&mut self, node_id: NodeId) -> GraphResult<()> {
    self.ensure_node(node_id)?;
    self.root_node_id = Some(node_id);
    Ok(())
  }

  pub fn root_node_id(&self) -> GraphResult<NodeId> {
    self.root_node_id.ok_or(GraphError::MissingRoot)
  }

  pub fn has_root(&self) -> bool {
    self.root_node_id.is_some()
  }

  /// Targets of the outgoing edges of `node_id`, one item per matching edge.
  pub fn get_node_ids_connected_from(
    &self,
    node_id: NodeId,
    filter: EdgeFilter,
  ) -> GraphResult<impl Iterator<Item = NodeId> + '_> {
    self.ensure_node(node_id)?;
    Ok(
      self.outgoing[node_id]
        .iter()
        .filter(move |edge| filter.matches(edge.kind))
        .map(|edge| edge.node),
    )
  }

  /// Sources of the incoming edges of `node_id`, one item per matching edge.
  pub fn get_node_ids_connected_to(
    &self,
    node_id: NodeId,
    filter: EdgeFilter,
  ) -> GraphResult<impl Iterator<Item = NodeId> + '_> {
    self.ensure_node(node_id)?;
    Ok(
      self.incoming[node_id]
        .iter()
        .filter(move |edge| filter.matches(edge.kind))
        .map(|edge| edge.node),
    )
  }

  pub fn outgoing_edges(&self, node_id: NodeId) -> GraphResult<impl Iterator<Item = Edge> + '_> {
    self.ensure_node(node_id)?;
    Ok(self.outgoing[node_id].iter().map(move |edge| Edge {
      from: node_id,
      to: edge.node,
      kind: edge.kind,
      seq: edge.seq,
    }))
  }

  pub fn incoming_edges(&self, node_id: NodeId) -> GraphResult<impl Iterator<Item = Edge> + '_> {
    self.ensure_node(node_id)?;
    Ok(self.incoming[node_id].iter().map(move |edge| Edge {
      from: edge.node,
      to: node_id,
      kind: edge.kind,
      seq: edge.seq,
    }))
  }

  /// Every live edge, in insertion order.
  pub fn edges(&self) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(self.edge_count);
    for (from, adjacent) in self.outgoing.iter().enumerate() {
      edges.extend(adjacent.iter().map(|edge| Edge {
        from,
        to: edge.node,
        kind: edge.kind,
        seq: edge.seq,
      }));
    }
    edges.sort_by_key(|edge| edge.seq);
    edges
  }

  /// Adds a synthetic root with a sync edge to each entry and makes it the graph root.
  ///
  /// Dominance is computed from a single root, so graphs with several entry points are
  /// joined under one node before bundling.
  pub fn insert_super_root(&mut self, payload: T, entries: &[NodeId]) -> GraphResult<NodeId> {
    for entry in entries {
      self.ensure_node(*entry)?;
    }

    let root = self.add_node(payload);
    for entry in entries {
      self.add_edge(root, *entry, EdgeKind::Sync)?;
    }
    self.root_node_id = Some(root);

    Ok(root)
  }

  pub(crate) fn ensure_node(&self, node_id: NodeId) -> GraphResult<()> {
    if self.contains_node(node_id) {
      Ok(())
    } else {
      Err(GraphError::InvalidNodeId(node_id))
    }
  }

  pub(crate) fn outgoing_slice_len(&self, node_id: NodeId) -> usize {
    self.outgoing[node_id].len()
  }

  pub(crate) fn outgoing_edge_at(&self, node_id: NodeId, position: usize) -> Edge {
    let edge = self.outgoing[node_id][position];
    Edge {
      from: node_id,
      to: edge.node,
      kind: edge.kind,
      seq: edge.seq,
    }
  }
}
