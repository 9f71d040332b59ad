//! The authoritative in-memory workflow graph.
//!
//! Collections are held behind `Arc` and mutated copy-on-write: a
//! [`GraphSnapshot`] taken before a mutation never changes, and a mutation
//! that turns out to be a no-op hands back the very same allocations, so
//! observers can diff with [`GraphSnapshot::same_as`].

use super::edge::Edge;
use super::ids::{EdgeId, NodeId};
use super::node::{Node, NodePatch, Position};
use super::validator::sanitize;
use crate::CoreError;
use std::sync::Arc;
use tracing::{debug, error};

/// Immutable view of the graph at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    /// Nodes, unordered
    pub nodes: Arc<Vec<Node>>,
    /// Edges, unordered, possibly dangling
    pub edges: Arc<Vec<Edge>>,
}

impl GraphSnapshot {
    /// Build a snapshot from owned collections
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes: Arc::new(nodes),
            edges: Arc::new(edges),
        }
    }

    /// Look up a node
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Edges that are safe to render or persist
    pub fn valid_edges(&self) -> Vec<Edge> {
        sanitize(&self.nodes, &self.edges)
    }

    /// Both collections are the same allocations as in `other`
    pub fn same_as(&self, other: &GraphSnapshot) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes) && Arc::ptr_eq(&self.edges, &other.edges)
    }
}

/// Mutable owner of the current graph
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: Arc<Vec<Node>>,
    edges: Arc<Vec<Edge>>,
    revision: u64,
}

impl GraphStore {
    /// Create an empty store (new workflow)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `snapshot`
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            revision: 0,
        }
    }

    /// Current contents
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: Arc::clone(&self.nodes),
            edges: Arc::clone(&self.edges),
        }
    }

    /// Number of changes applied since creation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Current nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Current edges, including dangling ones
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Look up an edge
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Whether a node with `id` exists
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    fn bump(&mut self) -> GraphSnapshot {
        self.revision += 1;
        self.snapshot()
    }

    /// Append a node. Fails if the id is already taken.
    pub fn add_node(&mut self, node: Node) -> Result<GraphSnapshot, CoreError> {
        if self.contains_node(&node.id) {
            error!(node_id = %node.id, "Rejected node with duplicate id");
            return Err(CoreError::DuplicateId(node.id.0));
        }

        debug!(node_id = %node.id, kind = ?node.kind, "Node added");
        Arc::make_mut(&mut self.nodes).push(node);
        Ok(self.bump())
    }

    /// Append an edge unless it is a self-loop or its ordered pair is already connected
    pub fn add_edge(&mut self, edge: Edge) -> GraphSnapshot {
        if edge.is_self_loop() {
            debug!(node_id = %edge.source, "Ignored self-loop edge");
            return self.snapshot();
        }
        if self
            .edges
            .iter()
            .any(|e| e.connects_same_pair(&edge.source, &edge.target))
        {
            debug!(source = %edge.source, target = %edge.target, "Pair already connected");
            return self.snapshot();
        }

        debug!(edge_id = %edge.id, source = %edge.source, target = %edge.target, "Edge added");
        Arc::make_mut(&mut self.edges).push(edge);
        self.bump()
    }

    /// Merge `patch` into the node. Unknown ids are ignored.
    pub fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> GraphSnapshot {
        let Some(index) = self.nodes.iter().position(|n| &n.id == id) else {
            debug!(node_id = %id, "Update for missing node ignored");
            return self.snapshot();
        };
        if patch.is_empty() {
            return self.snapshot();
        }

        Arc::make_mut(&mut self.nodes)[index].apply(patch);
        self.bump()
    }

    /// Remove a node and, in the same step, every edge touching it
    pub fn remove_node(&mut self, id: &NodeId) -> GraphSnapshot {
        if !self.contains_node(id) {
            return self.snapshot();
        }

        Arc::make_mut(&mut self.nodes).retain(|n| &n.id != id);
        let touching = self.edges.iter().filter(|e| e.touches(id)).count();
        if touching > 0 {
            Arc::make_mut(&mut self.edges).retain(|e| !e.touches(id));
        }

        debug!(node_id = %id, edges_removed = touching, "Node removed");
        self.bump()
    }

    /// Remove one edge; endpoints are untouched
    pub fn remove_edge(&mut self, id: &EdgeId) -> GraphSnapshot {
        if self.edge(id).is_none() {
            return self.snapshot();
        }

        Arc::make_mut(&mut self.edges).retain(|e| &e.id != id);
        debug!(edge_id = %id, "Edge removed");
        self.bump()
    }

    /// Update a node's position only
    pub fn set_node_position(&mut self, id: &NodeId, position: Position) -> GraphSnapshot {
        match self.nodes.iter().position(|n| &n.id == id) {
            Some(index) if self.nodes[index].position != position => {
                Arc::make_mut(&mut self.nodes)[index].position = position;
                self.bump()
            }
            _ => self.snapshot(),
        }
    }

    /// Replace the whole graph (load, undo)
    pub fn replace(&mut self, snapshot: GraphSnapshot) -> GraphSnapshot {
        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        self.bump()
    }
}
