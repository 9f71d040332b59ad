//! Structural edge validation.
//!
//! An edge is renderable and persistable only when both endpoints resolve to
//! a node currently in the graph and the endpoints differ. Invalid edges are
//! filtered out here and nowhere else; the graph store keeps them so they
//! come back if a missing endpoint reappears.

use super::edge::Edge;
use super::ids::NodeId;
use super::node::Node;
use std::collections::HashSet;

/// Outcome of splitting an edge set into valid and dangling edges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizeReport {
    /// Edges that reference two distinct existing nodes
    pub valid: Vec<Edge>,
    /// Edges that were filtered out
    pub dropped: Vec<Edge>,
}

fn node_ids(nodes: &[Node]) -> HashSet<&NodeId> {
    nodes.iter().map(|n| &n.id).collect()
}

fn is_structurally_valid(ids: &HashSet<&NodeId>, edge: &Edge) -> bool {
    !edge.is_self_loop() && ids.contains(&edge.source) && ids.contains(&edge.target)
}

/// Keep the edges whose endpoints both resolve to a node in `nodes`.
///
/// Pure and O(N + E). Order of the surviving edges is preserved.
pub fn sanitize(nodes: &[Node], edges: &[Edge]) -> Vec<Edge> {
    let ids = node_ids(nodes);
    edges
        .iter()
        .filter(|edge| is_structurally_valid(&ids, edge))
        .cloned()
        .collect()
}

/// Like [`sanitize`] but also returns what was dropped
pub fn sanitize_report(nodes: &[Node], edges: &[Edge]) -> SanitizeReport {
    let ids = node_ids(nodes);
    let (valid, dropped) = edges
        .iter()
        .cloned()
        .partition(|edge| is_structurally_valid(&ids, edge));
    SanitizeReport { valid, dropped }
}
