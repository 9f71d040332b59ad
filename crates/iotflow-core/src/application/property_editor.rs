//! Debounced property editing for the selected node.
//!
//! Every keystroke updates a local draft and restarts one pending deadline.
//! When the deadline passes the draft becomes a single [`NodePatch`]. There is
//! exactly one pending slot: seeding a different node discards it.

use std::time::Duration;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::ids::NodeId;
use crate::domain::node::{Config, Node, NodePatch};

#[derive(Debug, Clone)]
struct Draft {
    node_id: NodeId,
    label: String,
    config: Config,
}

/// Local edit buffer bound to at most one node
#[derive(Debug)]
pub struct PropertyEditor {
    window: Duration,
    draft: Option<Draft>,
    deadline: Option<Instant>,
}

impl PropertyEditor {
    /// Create an editor committing `window` after the last keystroke
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            draft: None,
            deadline: None,
        }
    }

    /// Bind to `node`, dropping any uncommitted edit
    pub fn seed(&mut self, node: &Node) {
        self.discard_pending();
        self.draft = Some(Draft {
            node_id: node.id.clone(),
            label: node.label.clone(),
            config: node.config.clone(),
        });
    }

    /// Unbind, dropping any uncommitted edit
    pub fn clear(&mut self) {
        self.discard_pending();
        self.draft = None;
    }

    fn discard_pending(&mut self) {
        if let (Some(draft), Some(_)) = (&self.draft, self.deadline.take()) {
            debug!(node_id = %draft.node_id, "Discarded pending property edit");
        }
    }

    /// Node the editor is bound to
    pub fn target(&self) -> Option<&NodeId> {
        self.draft.as_ref().map(|d| &d.node_id)
    }

    /// Label as currently typed
    pub fn label(&self) -> Option<&str> {
        self.draft.as_ref().map(|d| d.label.as_str())
    }

    /// Config as currently edited
    pub fn config(&self) -> Option<&Config> {
        self.draft.as_ref().map(|d| &d.config)
    }

    /// When the pending edit commits, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether an edit is waiting to commit
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Edit the label. Ignored when unbound.
    pub fn set_label(&mut self, label: impl Into<String>, now: Instant) {
        if let Some(draft) = self.draft.as_mut() {
            draft.label = label.into();
            self.touch(now);
        }
    }

    /// Set one config field. Ignored when unbound.
    pub fn set_config_field(&mut self, key: impl Into<String>, value: Value, now: Instant) {
        if let Some(draft) = self.draft.as_mut() {
            draft.config.insert(key.into(), value);
            self.touch(now);
        }
    }

    /// Remove one config field. Ignored when unbound.
    pub fn remove_config_field(&mut self, key: &str, now: Instant) {
        if let Some(draft) = self.draft.as_mut() {
            if draft.config.remove(key).is_some() {
                self.touch(now);
            }
        }
    }

    /// The commit, if its deadline has passed at `now`
    pub fn take_due(&mut self, now: Instant) -> Option<(NodeId, NodePatch)> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.flush(),
            _ => None,
        }
    }

    /// The pending commit regardless of its deadline
    pub fn flush(&mut self) -> Option<(NodeId, NodePatch)> {
        self.deadline.take()?;
        let draft = self.draft.as_ref()?;
        Some((
            draft.node_id.clone(),
            NodePatch {
                label: Some(draft.label.clone()),
                config: Some(draft.config.clone()),
                ..NodePatch::default()
            },
        ))
    }
}
