//! Contract between the editor session and the interactive rendering surface.
//!
//! The surface owns drawing, hit-testing and live positions. It reports user
//! interaction as [`CanvasEvent`]s and receives sanitized element sets back.

use crate::domain::edge::Edge;
use crate::domain::ids::{EdgeId, NodeId};
use crate::domain::node::{Node, Position};

/// Something the user did on the canvas
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// A palette item was dropped; `payload` is the drag data (JSON)
    Drop {
        /// Serialized [`PaletteItem`](super::palette::PaletteItem)
        payload: String,
        /// Drop coordinates in canvas space
        position: Position,
    },
    /// A node was tapped
    NodeTap(NodeId),
    /// An edge was tapped
    EdgeTap(EdgeId),
    /// Empty canvas was tapped
    BackgroundTap,
    /// A node was dragged
    PositionChanged {
        /// The dragged node
        node: NodeId,
        /// Its new position
        position: Position,
    },
    /// A key was pressed while the canvas had the window
    Key {
        /// Which key
        key: Key,
        /// A text input currently has focus
        text_input_focused: bool,
    },
}

/// Keys the editor reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// Delete
    Delete,
    /// Backspace
    Backspace,
    /// Escape
    Escape,
    /// Anything else
    Other(String),
}

impl Key {
    /// Delete or Backspace
    pub fn is_delete(&self) -> bool {
        matches!(self, Key::Delete | Key::Backspace)
    }
}

/// The single selected element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing selected
    #[default]
    None,
    /// One node
    Node(NodeId),
    /// One edge
    Edge(EdgeId),
}

impl Selection {
    /// Selected node, if any
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Selection::Node(id) => Some(id),
            _ => None,
        }
    }

    /// Selected edge, if any
    pub fn edge(&self) -> Option<&EdgeId> {
        match self {
            Selection::Edge(id) => Some(id),
            _ => None,
        }
    }
}

/// Rendering surface driven by the editor session
pub trait RenderSurface {
    /// Replace the drawn elements. Edges are already sanitized.
    fn set_elements(&mut self, nodes: &[Node], edges: &[Edge]);

    /// Show the connect-mode affordance on `node`, or clear it
    fn set_pending_source(&mut self, node: Option<&NodeId>);

    /// Reflect the current selection
    fn set_selection(&mut self, selection: &Selection);

    /// Positions as currently laid out on the surface
    fn node_positions(&self) -> Vec<(NodeId, Position)>;
}

/// Test double that records what it was told
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Render surface that keeps every push for later assertions
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        /// Every element set pushed, oldest first
        pub pushes: Vec<(Vec<Node>, Vec<Edge>)>,
        /// Current pending-source affordance
        pub pending_source: Option<NodeId>,
        /// Current selection highlight
        pub selection: Selection,
        /// Positions the surface reports; seeded from pushes, overridable by drags
        pub positions: HashMap<NodeId, Position>,
    }

    impl RecordingSurface {
        /// Create an empty surface
        pub fn new() -> Self {
            Self::default()
        }

        /// Most recent push
        pub fn last(&self) -> Option<&(Vec<Node>, Vec<Edge>)> {
            self.pushes.last()
        }

        /// Node ids in the most recent push
        pub fn rendered_node_ids(&self) -> Vec<String> {
            self.last()
                .map(|(nodes, _)| nodes.iter().map(|n| n.id.0.clone()).collect())
                .unwrap_or_default()
        }

        /// Edge ids in the most recent push
        pub fn rendered_edge_ids(&self) -> Vec<String> {
            self.last()
                .map(|(_, edges)| edges.iter().map(|e| e.id.0.clone()).collect())
                .unwrap_or_default()
        }

        /// Simulate the user dragging a node without telling the session
        pub fn move_node(&mut self, id: &NodeId, position: Position) {
            self.positions.insert(id.clone(), position);
        }
    }

    impl RenderSurface for RecordingSurface {
        fn set_elements(&mut self, nodes: &[Node], edges: &[Edge]) {
            self.positions = nodes.iter().map(|n| (n.id.clone(), n.position)).collect();
            self.pushes.push((nodes.to_vec(), edges.to_vec()));
        }

        fn set_pending_source(&mut self, node: Option<&NodeId>) {
            self.pending_source = node.cloned();
        }

        fn set_selection(&mut self, selection: &Selection) {
            self.selection = selection.clone();
        }

        fn node_positions(&self) -> Vec<(NodeId, Position)> {
            self.positions
                .iter()
                .map(|(id, position)| (id.clone(), *position))
                .collect()
        }
    }
}
