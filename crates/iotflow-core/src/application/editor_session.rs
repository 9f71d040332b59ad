//! One editing session: the graph store, the surface it drives and the
//! interaction state around them (selection, connect mode, property editor,
//! undo history, in-flight save).
//!
//! All mutations go through here and happen on the caller's thread. Every
//! structural change re-renders the sanitized graph; position drags only
//! update the store because the surface already shows them.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::canvas::{CanvasEvent, Key, RenderSurface, Selection};
use super::history::GraphHistory;
use super::palette::PaletteItem;
use super::property_editor::PropertyEditor;
use super::workflow_persistence_service::{
    LoadedWorkflow, SaveAttempt, SaveOutcome, SaveRequest, WorkflowPersistenceService,
};
use crate::config::EditorConfig;
use crate::domain::edge::Edge;
use crate::domain::graph_store::{GraphSnapshot, GraphStore};
use crate::domain::ids::{device_node_id, IdAllocator, NodeId, SensorId, UserId, WorkflowId};
use crate::domain::node::{Node, NodeKind, NodePatch, Position};
use crate::domain::repository::WorkflowKey;
use crate::CoreError;

/// Name and storage identity of the workflow being edited
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowMeta {
    /// Storage id once saved or loaded
    pub id: Option<WorkflowId>,
    /// Workflow name
    pub name: String,
    /// Description
    pub description: String,
    /// Visible to other users
    pub is_public: bool,
}

/// A save that has been started and not yet finished
#[derive(Debug, Clone)]
pub struct PendingSave {
    /// What to save
    pub request: SaveRequest,
    /// The graph as of the start of the save
    pub snapshot: GraphSnapshot,
}

/// Canvas synchronizer and property editor binding
pub struct EditorSession<S: RenderSurface> {
    store: GraphStore,
    surface: S,
    ids: IdAllocator,
    selection: Selection,
    connect_mode: bool,
    pending_source: Option<NodeId>,
    property_editor: PropertyEditor,
    history: GraphHistory,
    meta: WorkflowMeta,
    saving: bool,
    rendered: Option<GraphSnapshot>,
}

impl<S: RenderSurface> EditorSession<S> {
    /// Start a new, empty workflow on `surface`
    pub fn new(surface: S, config: &EditorConfig) -> Self {
        Self::with_id_allocator(surface, config, IdAllocator::new(config.id_scheme))
    }

    /// Start a new, empty workflow with an explicit id allocator
    pub fn with_id_allocator(surface: S, config: &EditorConfig, ids: IdAllocator) -> Self {
        let mut session = Self {
            store: GraphStore::new(),
            surface,
            ids,
            selection: Selection::None,
            connect_mode: false,
            pending_source: None,
            property_editor: PropertyEditor::new(config.debounce_window()),
            history: GraphHistory::with_max_history(config.history_limit),
            meta: WorkflowMeta::default(),
            saving: false,
            rendered: None,
        };
        session.render();
        session
    }

    /// The graph store
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// The rendering surface
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The rendering surface, mutably
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Current selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Property editor bound to the selected node
    pub fn property_editor(&self) -> &PropertyEditor {
        &self.property_editor
    }

    /// Workflow name and identity
    pub fn meta(&self) -> &WorkflowMeta {
        &self.meta
    }

    /// Workflow name and identity, editable
    pub fn meta_mut(&mut self) -> &mut WorkflowMeta {
        &mut self.meta
    }

    /// Connect mode is on
    pub fn connect_mode(&self) -> bool {
        self.connect_mode
    }

    /// Armed connect source
    pub fn pending_source(&self) -> Option<&NodeId> {
        self.pending_source.as_ref()
    }

    /// A save has been started and not finished
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Whether undo is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether redo is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Push the sanitized graph to the surface if it changed since the last push
    fn render(&mut self) {
        let snapshot = self.store.snapshot();
        if self
            .rendered
            .as_ref()
            .is_some_and(|last| last.same_as(&snapshot))
        {
            return;
        }

        let edges = snapshot.valid_edges();
        debug!(
            nodes = snapshot.nodes.len(),
            edges = edges.len(),
            revision = self.store.revision(),
            "Rendering graph"
        );
        self.surface.set_elements(&snapshot.nodes, &edges);
        self.rendered = Some(snapshot);
    }

    /// Record and render a structural change. Returns false for a no-op.
    fn commit(&mut self, before: GraphSnapshot, after: GraphSnapshot) -> bool {
        if after.same_as(&before) {
            return false;
        }
        self.history.record(before);
        self.reconcile();
        self.render();
        true
    }

    /// Drop selection and connect state that points at vanished elements
    fn reconcile(&mut self) {
        let stale = match &self.selection {
            Selection::None => false,
            Selection::Node(id) => !self.store.contains_node(id),
            Selection::Edge(id) => self.store.edge(id).map_or(true, |edge| {
                !self.store.contains_node(&edge.source) || !self.store.contains_node(&edge.target)
            }),
        };
        if stale {
            self.select(Selection::None);
        }

        let orphaned = self
            .pending_source
            .as_ref()
            .is_some_and(|source| !self.store.contains_node(source));
        if orphaned {
            self.disarm();
        }
    }

    fn select(&mut self, selection: Selection) {
        if selection == self.selection {
            return;
        }

        match &selection {
            Selection::Node(id) => match self.store.node(id) {
                Some(node) => self.property_editor.seed(node),
                None => return,
            },
            _ => self.property_editor.clear(),
        }

        self.surface.set_selection(&selection);
        self.selection = selection;
    }

    fn disarm(&mut self) {
        if self.pending_source.take().is_some() {
            self.surface.set_pending_source(None);
        }
    }

    /// Turn two-click connect mode on or off
    pub fn set_connect_mode(&mut self, enabled: bool) {
        self.connect_mode = enabled;
        if !enabled {
            self.disarm();
        }
    }

    /// Apply one event from the surface
    pub fn handle(&mut self, event: CanvasEvent) -> Result<(), CoreError> {
        match event {
            CanvasEvent::Drop { payload, position } => {
                let item = PaletteItem::from_payload(&payload)?;
                self.drop_item(item, position)
            }
            CanvasEvent::NodeTap(id) => {
                self.tap_node(id);
                Ok(())
            }
            CanvasEvent::EdgeTap(id) => {
                self.disarm();
                if self.store.edge(&id).is_some() {
                    self.select(Selection::Edge(id));
                }
                Ok(())
            }
            CanvasEvent::BackgroundTap => {
                self.disarm();
                self.select(Selection::None);
                Ok(())
            }
            CanvasEvent::PositionChanged { node, position } => {
                self.store.set_node_position(&node, position);
                Ok(())
            }
            CanvasEvent::Key {
                key,
                text_input_focused,
            } => {
                if text_input_focused {
                    return Ok(());
                }
                if key.is_delete() {
                    self.delete_selected();
                } else if key == Key::Escape {
                    self.disarm();
                }
                Ok(())
            }
        }
    }

    /// Place a palette item at `position`.
    ///
    /// A device already on the canvas is not placed twice.
    pub fn drop_item(&mut self, item: PaletteItem, position: Position) -> Result<(), CoreError> {
        let node = match item.kind {
            NodeKind::Device => {
                let Some(device_id) = item.device_id else {
                    warn!(label = %item.label, "Device palette item without device id");
                    return Err(CoreError::ValidationError(
                        "device item is missing its device id".to_string(),
                    ));
                };
                let id = device_node_id(device_id);
                if self.store.contains_node(&id) {
                    debug!(node_id = %id, "Device already on canvas");
                    return Ok(());
                }
                Node::new(id, NodeKind::Device, item.label).with_device(device_id)
            }
            kind => {
                let id = self.ids.ephemeral_id(kind.id_prefix());
                let node = Node::new(id, kind, item.label);
                match item.sensor_id {
                    Some(sensor_id) if kind == NodeKind::Sensor => node.with_sensor(sensor_id),
                    _ => node,
                }
            }
        };

        let before = self.store.snapshot();
        let after = self
            .store
            .add_node(node.with_config(item.config).at(position))?;
        self.commit(before, after);
        Ok(())
    }

    fn tap_node(&mut self, id: NodeId) {
        if !self.store.contains_node(&id) {
            debug!(node_id = %id, "Tap on unknown node ignored");
            return;
        }

        if !self.connect_mode {
            self.select(Selection::Node(id));
            return;
        }

        match self.pending_source.take() {
            None => {
                self.surface.set_pending_source(Some(&id));
                self.pending_source = Some(id);
            }
            Some(source) => {
                self.surface.set_pending_source(None);
                if source != id {
                    self.connect(&source, &id);
                }
            }
        }
    }

    /// Connect `source` to `target`. Returns false when nothing changed.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> bool {
        let edge = Edge::new(
            self.ids.edge_id(source, target),
            source.clone(),
            target.clone(),
        );
        let before = self.store.snapshot();
        let after = self.store.add_edge(edge);
        self.commit(before, after)
    }

    /// Delete the selected node (with its edges) or the selected edge
    pub fn delete_selected(&mut self) -> bool {
        let before = self.store.snapshot();
        let after = match &self.selection {
            Selection::None => return false,
            Selection::Node(id) => self.store.remove_node(id),
            Selection::Edge(id) => self.store.remove_edge(id),
        };
        self.commit(before, after)
    }

    /// Edit the selected node's label
    pub fn edit_label(&mut self, label: impl Into<String>, now: Instant) {
        self.property_editor.set_label(label, now);
    }

    /// Set a config field on the selected node
    pub fn edit_config_field(&mut self, key: impl Into<String>, value: Value, now: Instant) {
        self.property_editor.set_config_field(key, value, now);
    }

    /// Remove a config field from the selected node
    pub fn remove_config_field(&mut self, key: &str, now: Instant) {
        self.property_editor.remove_config_field(key, now);
    }

    fn apply_patch(&mut self, id: NodeId, patch: NodePatch) -> bool {
        let unchanged = self.store.node(&id).map_or(true, |node| {
            patch.label.as_ref().map_or(true, |label| label == &node.label)
                && patch.config.as_ref().map_or(true, |config| config == &node.config)
        });
        if unchanged {
            return false;
        }

        let before = self.store.snapshot();
        let after = self.store.update_node(&id, patch);
        self.commit(before, after)
    }

    /// Commit the pending property edit if its window has passed
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.property_editor.take_due(now) {
            Some((id, patch)) => self.apply_patch(id, patch),
            None => false,
        }
    }

    /// Wait for the pending property edit and commit it
    pub async fn run_pending_commit(&mut self) -> bool {
        let Some(deadline) = self.property_editor.deadline() else {
            return false;
        };
        sleep_until(deadline).await;
        self.tick(Instant::now())
    }

    /// Step back one structural change
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo(self.store.snapshot()) else {
            return false;
        };
        self.restore(previous);
        true
    }

    /// Re-apply an undone change
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo(self.store.snapshot()) else {
            return false;
        };
        self.restore(next);
        true
    }

    fn restore(&mut self, snapshot: GraphSnapshot) {
        self.store.replace(snapshot);
        self.reconcile();
        if let Some(node) = self.selection.node().and_then(|id| self.store.node(id)) {
            self.property_editor.seed(node);
        }
        self.render();
    }

    /// Copy live positions from the surface into the store.
    ///
    /// Returns how many nodes moved.
    pub fn capture_positions(&mut self) -> usize {
        let revision = self.store.revision();
        for (id, position) in self.surface.node_positions() {
            self.store.set_node_position(&id, position);
        }
        (self.store.revision() - revision) as usize
    }

    /// Start a save owned by `owner`.
    ///
    /// Commits any pending property edit and captures positions first. Only
    /// one save may be outstanding.
    pub fn begin_save(&mut self, owner: UserId) -> Result<PendingSave, CoreError> {
        if self.saving {
            return Err(CoreError::ValidationError(
                "a save is already in progress".to_string(),
            ));
        }

        if let Some((id, patch)) = self.property_editor.flush() {
            self.apply_patch(id, patch);
        }
        self.capture_positions();
        self.saving = true;

        Ok(PendingSave {
            request: SaveRequest {
                workflow_id: self.meta.id,
                name: self.meta.name.clone(),
                description: self.meta.description.clone(),
                is_public: self.meta.is_public,
                owner,
            },
            snapshot: self.store.snapshot(),
        })
    }

    /// Finish a save started with [`begin_save`](Self::begin_save).
    ///
    /// Sensor ids registered during the attempt are adopted into the live
    /// graph and the undo history even when the save failed, so a retry never
    /// registers them twice.
    pub fn finish_save(&mut self, attempt: impl Into<SaveAttempt>) -> Result<SaveOutcome, CoreError> {
        self.saving = false;
        let attempt = attempt.into();

        if !attempt.registered_sensors.is_empty() {
            for (node_id, sensor_id) in &attempt.registered_sensors {
                self.store.update_node(node_id, NodePatch::sensor(*sensor_id));
            }
            self.history
                .rewrite(|snapshot| with_sensor_ids(snapshot, &attempt.registered_sensors));
            self.render();
            debug!(
                sensors = attempt.registered_sensors.len(),
                "Adopted registered sensor ids"
            );
        }

        let outcome = attempt.result?;
        self.meta.id = Some(outcome.workflow_id);
        self.meta.name = outcome.payload.name.clone();
        self.render();

        info!(workflow_id = %outcome.workflow_id, "Editor adopted saved workflow");
        Ok(outcome)
    }

    /// Save through `service` and adopt the result
    pub async fn save(
        &mut self,
        service: &WorkflowPersistenceService,
        owner: UserId,
    ) -> Result<SaveOutcome, CoreError> {
        let pending = self.begin_save(owner)?;
        let attempt = service
            .attempt_save(&pending.request, &pending.snapshot)
            .await;
        self.finish_save(attempt)
    }

    /// Load a workflow, replacing the current graph only on success
    pub async fn load(
        &mut self,
        service: &WorkflowPersistenceService,
        key: &WorkflowKey,
        user: UserId,
    ) -> Result<(), CoreError> {
        let loaded = service.load(key, user).await?;
        self.open(loaded);
        Ok(())
    }

    /// Replace the whole session state with a loaded workflow
    pub fn open(&mut self, loaded: LoadedWorkflow) {
        self.reset_interaction();
        self.store
            .replace(GraphSnapshot::new(loaded.graph.nodes, loaded.graph.edges));
        self.meta = WorkflowMeta {
            id: Some(loaded.id),
            name: loaded.name,
            description: loaded.description,
            is_public: loaded.is_public,
        };
        self.render();
    }

    /// Discard everything and start an empty workflow
    pub fn new_workflow(&mut self) {
        self.reset_interaction();
        self.store.replace(GraphSnapshot::default());
        self.meta = WorkflowMeta::default();
        self.render();
    }

    fn reset_interaction(&mut self) {
        self.disarm();
        self.select(Selection::None);
        self.property_editor.clear();
        self.history.clear();
    }
}

/// `snapshot` with unregistered sensors back-filled from `registered`
fn with_sensor_ids(
    snapshot: &GraphSnapshot,
    registered: &[(NodeId, SensorId)],
) -> Option<GraphSnapshot> {
    let lookup = |node: &Node| {
        registered
            .iter()
            .find(|(id, _)| id == &node.id)
            .map(|(_, sensor_id)| *sensor_id)
    };

    if !snapshot
        .nodes
        .iter()
        .any(|n| n.is_unregistered_sensor() && lookup(n).is_some())
    {
        return None;
    }

    let nodes = snapshot
        .nodes
        .iter()
        .map(|node| match lookup(node) {
            Some(sensor_id) if node.is_unregistered_sensor() => node.clone().with_sensor(sensor_id),
            _ => node.clone(),
        })
        .collect();

    Some(GraphSnapshot {
        nodes: Arc::new(nodes),
        edges: Arc::clone(&snapshot.edges),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::canvas::testing::RecordingSurface;
    use crate::domain::ids::{DeviceId, EdgeId, IdScheme, ManualTimeSource};
    use crate::domain::payload::DecodedGraph;
    use serde_json::json;
    use std::time::Duration;

    fn session() -> (EditorSession<RecordingSurface>, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::at(1_700_000_000_000));
        let ids = IdAllocator::with_time_source(IdScheme::Timestamp, clock.clone());
        let session =
            EditorSession::with_id_allocator(RecordingSurface::new(), &EditorConfig::default(), ids);
        (session, clock)
    }

    fn drop_event(item: PaletteItem, x: f64, y: f64) -> CanvasEvent {
        CanvasEvent::Drop {
            payload: item.to_payload().unwrap(),
            position: Position::new(x, y),
        }
    }

    fn device(id: i64) -> PaletteItem {
        PaletteItem {
            kind: NodeKind::Device,
            label: format!("Device {}", id),
            config: Default::default(),
            device_id: Some(DeviceId(id)),
            sensor_id: None,
        }
    }

    fn delete_key() -> CanvasEvent {
        CanvasEvent::Key {
            key: Key::Delete,
            text_input_focused: false,
        }
    }

    /// device-7 -> sensor -> process, returns the sensor and process ids
    fn wired(session: &mut EditorSession<RecordingSurface>, clock: &ManualTimeSource) -> (NodeId, NodeId) {
        session.handle(drop_event(device(7), 0.0, 0.0)).unwrap();
        session
            .handle(drop_event(PaletteItem::template(NodeKind::Sensor), 100.0, 0.0))
            .unwrap();
        clock.advance(1);
        session
            .handle(drop_event(PaletteItem::template(NodeKind::Process), 200.0, 0.0))
            .unwrap();

        let sensor = session.store().nodes()[1].id.clone();
        let process = session.store().nodes()[2].id.clone();
        clock.advance(1);
        session.connect(&NodeId::from("device-7"), &sensor);
        clock.advance(1);
        session.connect(&sensor, &process);
        (sensor, process)
    }

    #[test]
    fn test_device_drop_is_idempotent() {
        let (mut session, _) = session();
        session.handle(drop_event(device(7), 10.0, 20.0)).unwrap();
        let pushes = session.surface().pushes.len();

        session.handle(drop_event(device(7), 50.0, 50.0)).unwrap();

        assert_eq!(session.store().nodes().len(), 1);
        let node = &session.store().nodes()[0];
        assert_eq!(node.id.as_str(), "device-7");
        assert_eq!(node.backing_device_id, Some(DeviceId(7)));
        assert_eq!(node.position, Position::new(10.0, 20.0));
        assert_eq!(session.surface().pushes.len(), pushes);
    }

    #[test]
    fn test_sensor_drops_create_distinct_nodes() {
        let (mut session, clock) = session();
        let item = PaletteItem::template(NodeKind::Sensor);
        session.handle(drop_event(item.clone(), 0.0, 0.0)).unwrap();
        clock.advance(5);
        session.handle(drop_event(item, 0.0, 0.0)).unwrap();

        let ids = session.surface().rendered_node_ids();
        assert_eq!(ids, vec!["sensor-1700000000000", "sensor-1700000000005"]);
        assert!(session.store().nodes().iter().all(Node::is_unregistered_sensor));
    }

    #[test]
    fn test_same_millisecond_drop_is_rejected() {
        let (mut session, _) = session();
        let item = PaletteItem::template(NodeKind::Output);
        session.handle(drop_event(item.clone(), 0.0, 0.0)).unwrap();

        let err = session.handle(drop_event(item, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId(_)));
        assert_eq!(session.store().nodes().len(), 1);
    }

    #[test]
    fn test_device_item_without_device_id() {
        let (mut session, _) = session();
        let mut item = device(1);
        item.device_id = None;

        let err = session.handle(drop_event(item, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn test_two_click_connect() {
        let (mut session, clock) = session();
        session.handle(drop_event(device(1), 0.0, 0.0)).unwrap();
        session.handle(drop_event(device(2), 0.0, 0.0)).unwrap();
        session.set_connect_mode(true);

        session.handle(CanvasEvent::NodeTap(NodeId::from("device-1"))).unwrap();
        assert_eq!(session.surface().pending_source, Some(NodeId::from("device-1")));

        session.handle(CanvasEvent::NodeTap(NodeId::from("device-2"))).unwrap();
        assert!(session.pending_source().is_none());
        assert!(session.surface().pending_source.is_none());
        assert_eq!(session.store().edges().len(), 1);

        // same gesture again: pair already connected
        clock.advance(1);
        session.handle(CanvasEvent::NodeTap(NodeId::from("device-1"))).unwrap();
        session.handle(CanvasEvent::NodeTap(NodeId::from("device-2"))).unwrap();
        assert_eq!(session.store().edges().len(), 1);
    }

    #[test]
    fn test_clicking_same_node_twice_disarms() {
        let (mut session, _) = session();
        session.handle(drop_event(device(1), 0.0, 0.0)).unwrap();
        session.set_connect_mode(true);

        session.handle(CanvasEvent::NodeTap(NodeId::from("device-1"))).unwrap();
        session.handle(CanvasEvent::NodeTap(NodeId::from("device-1"))).unwrap();

        assert!(session.pending_source().is_none());
        assert!(session.store().edges().is_empty());
    }

    #[test]
    fn test_selection_is_exclusive() {
        let (mut session, clock) = session();
        wired(&mut session, &clock);
        let edge_id = session.store().edges()[0].id.clone();

        session.handle(CanvasEvent::NodeTap(NodeId::from("device-7"))).unwrap();
        assert_eq!(session.selection(), &Selection::Node(NodeId::from("device-7")));
        assert_eq!(session.property_editor().target(), Some(&NodeId::from("device-7")));

        session.handle(CanvasEvent::EdgeTap(edge_id.clone())).unwrap();
        assert_eq!(session.selection(), &Selection::Edge(edge_id));
        assert!(session.property_editor().target().is_none());

        session.handle(CanvasEvent::BackgroundTap).unwrap();
        assert_eq!(session.selection(), &Selection::None);
        assert_eq!(session.surface().selection, Selection::None);
    }

    #[test]
    fn test_delete_key_cascades_and_clears_selection() {
        let (mut session, clock) = session();
        let (sensor, _) = wired(&mut session, &clock);
        session.handle(CanvasEvent::NodeTap(sensor.clone())).unwrap();

        session
            .handle(CanvasEvent::Key {
                key: Key::Backspace,
                text_input_focused: true,
            })
            .unwrap();
        assert!(session.store().contains_node(&sensor));

        session.handle(delete_key()).unwrap();

        assert!(!session.store().contains_node(&sensor));
        assert!(session.store().edges().is_empty());
        assert_eq!(session.selection(), &Selection::None);
        assert!(session.surface().rendered_edge_ids().is_empty());
    }

    #[test]
    fn test_delete_selected_edge_keeps_endpoints() {
        let (mut session, clock) = session();
        wired(&mut session, &clock);
        let edge_id = session.store().edges()[0].id.clone();

        session.handle(CanvasEvent::EdgeTap(edge_id.clone())).unwrap();
        session.handle(delete_key()).unwrap();

        assert!(session.store().edge(&edge_id).is_none());
        assert_eq!(session.store().nodes().len(), 3);
        assert_eq!(session.store().edges().len(), 1);
    }

    #[test]
    fn test_dangling_edges_are_never_rendered() {
        let (mut session, _) = session();
        session.open(LoadedWorkflow {
            id: WorkflowId(1),
            name: "Legacy".into(),
            description: String::new(),
            is_public: false,
            graph: DecodedGraph {
                nodes: vec![Node::new(NodeId::from("a"), NodeKind::Process, "A")],
                edges: vec![
                    Edge::new(EdgeId::from("dangling"), NodeId::from("a"), NodeId::from("b")),
                ],
            },
        });

        assert_eq!(session.surface().rendered_node_ids(), vec!["a"]);
        assert!(session.surface().rendered_edge_ids().is_empty());
        // still held by the store
        assert_eq!(session.store().edges().len(), 1);
    }

    #[test]
    fn test_position_drag_does_not_rerender() {
        let (mut session, _) = session();
        session.handle(drop_event(device(1), 0.0, 0.0)).unwrap();
        let pushes = session.surface().pushes.len();

        session
            .handle(CanvasEvent::PositionChanged {
                node: NodeId::from("device-1"),
                position: Position::new(40.0, 80.0),
            })
            .unwrap();

        assert_eq!(session.surface().pushes.len(), pushes);
        assert_eq!(session.store().nodes()[0].position, Position::new(40.0, 80.0));
        assert!(session.undo());
        assert!(session.store().nodes().is_empty());
    }

    #[test]
    fn test_capture_positions_reads_surface() {
        let (mut session, _) = session();
        session.handle(drop_event(device(1), 0.0, 0.0)).unwrap();
        session
            .surface_mut()
            .move_node(&NodeId::from("device-1"), Position::new(300.0, 120.0));

        assert_eq!(session.capture_positions(), 1);
        assert_eq!(session.store().nodes()[0].position, Position::new(300.0, 120.0));
        assert_eq!(session.capture_positions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_property_edit_commits_after_quiet_window() {
        let (mut session, _) = session();
        session.handle(drop_event(device(1), 0.0, 0.0)).unwrap();
        session.handle(CanvasEvent::NodeTap(NodeId::from("device-1"))).unwrap();

        session.edit_label("Pu", Instant::now());
        tokio::time::advance(Duration::from_millis(200)).await;
        session.edit_label("Pump", Instant::now());
        session.edit_config_field("flowRate", json!(12), Instant::now());
        tokio::time::advance(Duration::from_millis(299)).await;

        assert!(!session.tick(Instant::now()));
        assert_eq!(session.store().nodes()[0].label, "Device 1");

        assert!(session.run_pending_commit().await);
        let node = &session.store().nodes()[0];
        assert_eq!(node.label, "Pump");
        assert_eq!(node.config["flowRate"], json!(12));
        assert_eq!(session.surface().last().unwrap().0[0].label, "Pump");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_selection_discards_pending_edit() {
        let (mut session, _) = session();
        session.handle(drop_event(device(1), 0.0, 0.0)).unwrap();
        session.handle(drop_event(device(2), 0.0, 0.0)).unwrap();

        session.handle(CanvasEvent::NodeTap(NodeId::from("device-1"))).unwrap();
        session.edit_label("renamed", Instant::now());
        session.handle(CanvasEvent::NodeTap(NodeId::from("device-2"))).unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!session.run_pending_commit().await);
        assert_eq!(session.store().nodes()[0].label, "Device 1");
        assert_eq!(session.property_editor().label(), Some("Device 2"));
    }

    #[test]
    fn test_undo_restores_cascaded_edges() {
        let (mut session, clock) = session();
        let (sensor, _) = wired(&mut session, &clock);
        session.handle(CanvasEvent::NodeTap(sensor.clone())).unwrap();
        session.handle(delete_key()).unwrap();
        assert!(session.store().edges().is_empty());

        assert!(session.undo());
        assert!(session.store().contains_node(&sensor));
        assert_eq!(session.surface().rendered_edge_ids().len(), 2);

        assert!(session.redo());
        assert!(!session.store().contains_node(&sensor));
        assert!(!session.can_redo());
    }

    #[test]
    fn test_second_begin_save_is_refused() {
        let (mut session, _) = session();
        session.meta_mut().name = "Greenhouse".into();

        let pending = session.begin_save(UserId(1)).unwrap();
        assert_eq!(pending.request.name, "Greenhouse");
        assert!(session.is_saving());

        let err = session.begin_save(UserId(1)).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let err = session
            .finish_save(Err::<SaveOutcome, _>(CoreError::RepositoryError("offline".into())))
            .unwrap_err();
        assert!(matches!(err, CoreError::RepositoryError(_)));
        assert!(!session.is_saving());
        assert!(session.meta().id.is_none());
    }

    #[test]
    fn test_failed_save_adopts_partial_registrations() {
        let (mut session, clock) = session();
        let item = PaletteItem::template(NodeKind::Sensor);
        session.handle(drop_event(item.clone(), 0.0, 0.0)).unwrap();
        clock.advance(1);
        session.handle(drop_event(item, 100.0, 0.0)).unwrap();
        let first = session.store().nodes()[0].id.clone();
        let second = session.store().nodes()[1].id.clone();
        session.meta_mut().name = "Greenhouse".into();

        session.begin_save(UserId(1)).unwrap();
        let err = session
            .finish_save(SaveAttempt {
                result: Err(CoreError::SensorRegistrationFailed("503".into())),
                registered_sensors: vec![(first.clone(), SensorId(8))],
            })
            .unwrap_err();

        assert!(matches!(err, CoreError::SensorRegistrationFailed(_)));
        assert!(!session.is_saving());
        assert!(session.meta().id.is_none());
        assert_eq!(
            session.store().node(&first).unwrap().backing_sensor_id,
            Some(SensorId(8))
        );
        assert!(session.store().node(&second).unwrap().is_unregistered_sensor());
        assert_eq!(session.surface().last().unwrap().0[0].backing_sensor_id, Some(SensorId(8)));

        // the retry only sees the second sensor as unsaved
        let pending = session.begin_save(UserId(1)).unwrap();
        let unsaved: Vec<_> = pending
            .snapshot
            .nodes
            .iter()
            .filter(|n| n.is_unregistered_sensor())
            .map(|n| n.id.clone())
            .collect();
        assert_eq!(unsaved, vec![second]);
    }

    #[test]
    fn test_adopted_sensor_ids_survive_undo() {
        let (mut session, clock) = session();
        let (sensor, _) = wired(&mut session, &clock);
        session.meta_mut().name = "Greenhouse".into();

        let pending = session.begin_save(UserId(1)).unwrap();
        let outcome = SaveOutcome {
            workflow_id: WorkflowId(11),
            payload: crate::domain::payload::WorkflowPayload {
                name: "Greenhouse".into(),
                description: String::new(),
                nodes: vec![],
                edges: vec![],
                device_sensor_links: vec![],
                user_id: pending.request.owner,
                is_public: false,
            },
            registered_sensors: vec![(sensor.clone(), SensorId(42))],
            dropped_edges: 0,
        };
        session.finish_save(Ok(outcome)).unwrap();

        assert_eq!(session.meta().id, Some(WorkflowId(11)));
        assert_eq!(
            session.store().node(&sensor).unwrap().backing_sensor_id,
            Some(SensorId(42))
        );

        while session.undo() {
            if let Some(node) = session.store().node(&sensor) {
                assert_eq!(node.backing_sensor_id, Some(SensorId(42)));
            }
        }
    }
}
