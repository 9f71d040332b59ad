//! Bounded undo/redo over graph snapshots

use std::collections::VecDeque;

use crate::domain::graph_store::GraphSnapshot;

/// Undo and redo stacks of whole-graph snapshots
#[derive(Debug)]
pub struct GraphHistory {
    undo_stack: VecDeque<GraphSnapshot>,
    redo_stack: Vec<GraphSnapshot>,
    max_history: usize,
}

impl GraphHistory {
    /// Keep at most `max_history` undo steps
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_history: max_history.max(1),
        }
    }

    /// Remember `before` as the state preceding a change. Clears redo.
    pub fn record(&mut self, before: GraphSnapshot) {
        if self.undo_stack.len() == self.max_history {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(before);
        self.redo_stack.clear();
    }

    /// Step back from `current`
    pub fn undo(&mut self, current: GraphSnapshot) -> Option<GraphSnapshot> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Step forward from `current`
    pub fn redo(&mut self, current: GraphSnapshot) -> Option<GraphSnapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push_back(current);
        Some(next)
    }

    /// Whether an undo step exists
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether a redo step exists
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Replace every stored snapshot for which `f` returns a new one
    pub fn rewrite<F>(&mut self, mut f: F)
    where
        F: FnMut(&GraphSnapshot) -> Option<GraphSnapshot>,
    {
        for snapshot in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            if let Some(rewritten) = f(snapshot) {
                *snapshot = rewritten;
            }
        }
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::NodeId;
    use crate::domain::node::{Node, NodeKind};

    fn graph(ids: &[&str]) -> GraphSnapshot {
        GraphSnapshot::new(
            ids.iter()
                .map(|id| Node::new(NodeId::from(*id), NodeKind::Process, *id))
                .collect(),
            vec![],
        )
    }

    #[test]
    fn test_undo_then_redo() {
        let mut history = GraphHistory::with_max_history(10);
        let empty = graph(&[]);
        let one = graph(&["a"]);

        history.record(empty.clone());
        let restored = history.undo(one.clone()).unwrap();
        assert!(restored.same_as(&empty));
        assert!(history.can_redo());

        let forward = history.redo(restored).unwrap();
        assert!(forward.same_as(&one));
        assert!(!history.can_redo());
        assert!(history.can_undo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = GraphHistory::with_max_history(10);
        history.record(graph(&[]));
        history.undo(graph(&["a"]));
        assert!(history.can_redo());

        history.record(graph(&["b"]));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_oldest_step_is_evicted() {
        let mut history = GraphHistory::with_max_history(2);
        let first = graph(&["1"]);
        history.record(first.clone());
        history.record(graph(&["2"]));
        history.record(graph(&["3"]));

        let mut current = graph(&["4"]);
        let mut steps = Vec::new();
        while let Some(previous) = history.undo(current.clone()) {
            steps.push(previous.clone());
            current = previous;
        }

        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| !s.same_as(&first)));
    }

    #[test]
    fn test_empty_history() {
        let mut history = GraphHistory::with_max_history(3);
        assert!(history.undo(graph(&[])).is_none());
        assert!(history.redo(graph(&[])).is_none());
    }
}
