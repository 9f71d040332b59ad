use super::ids::{EdgeId, NodeId};
use super::node::null_as_default;
use serde::{Deserialize, Serialize};

/// Edge type assigned when none is given
pub const DEFAULT_EDGE_TYPE: &str = "default";

fn default_edge_type() -> String {
    DEFAULT_EDGE_TYPE.to_string()
}

/// Directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique within the graph
    pub id: EdgeId,

    /// Upstream node
    pub source: NodeId,

    /// Downstream node
    pub target: NodeId,

    /// Optional label
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,

    /// Edge type
    #[serde(rename = "type", default = "default_edge_type")]
    pub edge_type: String,
}

impl Edge {
    /// Create an unlabelled edge of the default type
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            label: String::new(),
            edge_type: default_edge_type(),
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Source and target are the same node
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// The edge has `node_id` as one of its endpoints
    pub fn touches(&self, node_id: &NodeId) -> bool {
        &self.source == node_id || &self.target == node_id
    }

    /// Runs from `source` to `target`
    pub fn connects_same_pair(&self, source: &NodeId, target: &NodeId) -> bool {
        &self.source == source && &self.target == target
    }
}
