use crate::{
    application::palette::{build_palette, PaletteItem},
    domain::graph_store::GraphSnapshot,
    domain::ids::{NodeId, SensorId, UserId, WorkflowId},
    domain::links::derive_links,
    domain::node::Node,
    domain::payload::{encode_elements, DecodedGraph, WorkflowPayload},
    domain::repository::{
        DeviceCatalog, DeviceSummary, SensorRegistration, SensorRegistry, StoredWorkflow,
        WorkflowKey, WorkflowRepository, WorkflowSummary,
    },
    domain::validator::sanitize_report,
    CoreError,
};
use std::sync::Arc;

/// What the user asked to save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// Existing workflow to overwrite; `None` creates a new one
    pub workflow_id: Option<WorkflowId>,
    /// Required, non-blank
    pub name: String,
    /// Free text
    pub description: String,
    /// Visible to other users
    pub is_public: bool,
    /// Who is saving
    pub owner: UserId,
}

/// Result of a successful save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// Storage id of the saved workflow
    pub workflow_id: WorkflowId,
    /// Exactly what was written
    pub payload: WorkflowPayload,
    /// Sensor ids obtained during this save, per node
    pub registered_sensors: Vec<(NodeId, SensorId)>,
    /// Dangling or self-loop edges left out of the payload
    pub dropped_edges: usize,
}

/// Everything a save produced, including sensor ids obtained before a failure.
///
/// Registrations cannot be rolled back, so the caller adopts
/// `registered_sensors` whether or not `result` is `Ok`; otherwise a retry
/// would register the same nodes again.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveAttempt {
    /// Outcome of the save
    pub result: Result<SaveOutcome, CoreError>,
    /// Sensor ids obtained during this attempt, per node
    pub registered_sensors: Vec<(NodeId, SensorId)>,
}

impl From<Result<SaveOutcome, CoreError>> for SaveAttempt {
    fn from(result: Result<SaveOutcome, CoreError>) -> Self {
        let registered_sensors = match &result {
            Ok(outcome) => outcome.registered_sensors.clone(),
            Err(_) => Vec::new(),
        };
        Self {
            result,
            registered_sensors,
        }
    }
}

/// A workflow read back from storage
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWorkflow {
    /// Storage id
    pub id: WorkflowId,
    /// Workflow name
    pub name: String,
    /// Description
    pub description: String,
    /// Visible to other users
    pub is_public: bool,
    /// Normalized elements
    pub graph: DecodedGraph,
}

/// Save/load pipeline between the editor and its collaborators
pub struct WorkflowPersistenceService {
    /// Sensor registration collaborator
    sensor_registry: Arc<dyn SensorRegistry>,

    /// Device listing collaborator
    device_catalog: Arc<dyn DeviceCatalog>,

    /// Workflow storage
    workflow_repo: Arc<dyn WorkflowRepository>,
}

impl WorkflowPersistenceService {
    /// Create a new persistence service
    pub fn new(
        sensor_registry: Arc<dyn SensorRegistry>,
        device_catalog: Arc<dyn DeviceCatalog>,
        workflow_repo: Arc<dyn WorkflowRepository>,
    ) -> Self {
        Self {
            sensor_registry,
            device_catalog,
            workflow_repo,
        }
    }

    async fn owned(&self, id: WorkflowId, owner: UserId) -> Result<StoredWorkflow, CoreError> {
        let stored = self
            .workflow_repo
            .find(&WorkflowKey::Id(id))
            .await?
            .ok_or_else(|| CoreError::WorkflowNotFound(WorkflowKey::Id(id).to_string()))?;

        if stored.payload.user_id != owner {
            tracing::warn!(
                workflow_id = %id,
                owner = %stored.payload.user_id,
                requested_by = %owner,
                "Workflow access denied"
            );
            return Err(CoreError::NotAuthorized(format!(
                "workflow {} belongs to another user",
                id
            )));
        }

        Ok(stored)
    }

    /// Register every sensor node that has no backing id yet, in place.
    ///
    /// Stops at the first failure; sensors registered before it stay in
    /// `registered`.
    async fn register_sensors(
        &self,
        nodes: &mut [Node],
        workflow_name: &str,
        registered: &mut Vec<(NodeId, SensorId)>,
    ) -> Result<(), CoreError> {
        for node in nodes.iter_mut().filter(|n| n.is_unregistered_sensor()) {
            let registration = SensorRegistration {
                name: node.label.clone(),
                sensor_type: node.sensor_type().to_string(),
                description: format!("Created from workflow '{}'", workflow_name),
                config: node.config.clone(),
            };

            let sensor_id = match self.sensor_registry.register_sensor(&registration).await {
                Ok(id) => id,
                Err(err) => {
                    tracing::error!(node_id = %node.id, error = %err, "Sensor registration failed");
                    return Err(match err {
                        CoreError::SensorRegistrationFailed(_) => err,
                        other => CoreError::SensorRegistrationFailed(format!(
                            "sensor '{}' ({}): {}",
                            node.label, node.id, other
                        )),
                    });
                }
            };

            tracing::info!(node_id = %node.id, sensor_id = %sensor_id, "Sensor registered");
            node.backing_sensor_id = Some(sensor_id);
            registered.push((node.id.clone(), sensor_id));
        }

        Ok(())
    }

    /// Validate, register sensors, derive links and write the workflow once.
    ///
    /// `snapshot` is not modified. Callers that keep the graph around should
    /// use [`attempt_save`](Self::attempt_save) so sensor ids obtained before
    /// a failure are not lost.
    pub async fn save(
        &self,
        request: &SaveRequest,
        snapshot: &GraphSnapshot,
    ) -> Result<SaveOutcome, CoreError> {
        self.attempt_save(request, snapshot).await.result
    }

    /// Like [`save`](Self::save), also reporting registrations made before a failure
    pub async fn attempt_save(&self, request: &SaveRequest, snapshot: &GraphSnapshot) -> SaveAttempt {
        let mut registered_sensors = Vec::new();
        let result = self
            .save_with(request, snapshot, &mut registered_sensors)
            .await;

        if result.is_err() && !registered_sensors.is_empty() {
            tracing::warn!(
                sensors_registered = registered_sensors.len(),
                "Save failed after registering sensors"
            );
        }

        SaveAttempt {
            result,
            registered_sensors,
        }
    }

    async fn save_with(
        &self,
        request: &SaveRequest,
        snapshot: &GraphSnapshot,
        registered_sensors: &mut Vec<(NodeId, SensorId)>,
    ) -> Result<SaveOutcome, CoreError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(CoreError::ValidationError(
                "workflow name is required".to_string(),
            ));
        }

        if let Some(id) = request.workflow_id {
            self.owned(id, request.owner).await?;
        }

        let mut nodes: Vec<Node> = snapshot.nodes.as_ref().clone();
        let report = sanitize_report(&nodes, &snapshot.edges);
        if !report.dropped.is_empty() {
            tracing::warn!(
                dropped = report.dropped.len(),
                "Leaving invalid edges out of saved workflow"
            );
        }

        self.register_sensors(&mut nodes, name, registered_sensors)
            .await?;
        let device_sensor_links = derive_links(&nodes, &report.valid);
        let (encoded_nodes, encoded_edges) = encode_elements(&nodes, &report.valid)?;

        let payload = WorkflowPayload {
            name: name.to_string(),
            description: request.description.clone(),
            nodes: encoded_nodes,
            edges: encoded_edges,
            device_sensor_links,
            user_id: request.owner,
            is_public: request.is_public,
        };

        let workflow_id = match request.workflow_id {
            Some(id) => {
                self.workflow_repo.update(id, &payload).await?;
                id
            }
            None => self.workflow_repo.save(&payload).await?,
        };

        tracing::info!(
            workflow_id = %workflow_id,
            nodes = payload.nodes.len(),
            edges = payload.edges.len(),
            links = payload.device_sensor_links.len(),
            sensors_registered = registered_sensors.len(),
            "Workflow saved"
        );

        Ok(SaveOutcome {
            workflow_id,
            payload,
            registered_sensors: registered_sensors.clone(),
            dropped_edges: report.dropped.len(),
        })
    }

    /// Fetch, authorize and normalize a stored workflow
    pub async fn load(&self, key: &WorkflowKey, user: UserId) -> Result<LoadedWorkflow, CoreError> {
        let stored = self
            .workflow_repo
            .find(key)
            .await?
            .ok_or_else(|| CoreError::WorkflowNotFound(key.to_string()))?;

        if stored.payload.user_id != user {
            tracing::warn!(key = %key, requested_by = %user, "Workflow access denied");
            return Err(CoreError::NotAuthorized(format!(
                "workflow {} belongs to another user",
                key
            )));
        }

        let graph = stored.payload.decode()?;

        tracing::info!(
            workflow_id = %stored.id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Workflow loaded"
        );

        Ok(LoadedWorkflow {
            id: stored.id,
            name: stored.payload.name,
            description: stored.payload.description,
            is_public: stored.payload.is_public,
            graph,
        })
    }

    /// Delete a workflow owned by `owner`
    pub async fn delete_workflow(&self, id: WorkflowId, owner: UserId) -> Result<(), CoreError> {
        self.owned(id, owner).await?;
        self.workflow_repo.delete(id).await?;

        tracing::info!(workflow_id = %id, "Workflow deleted");
        Ok(())
    }

    /// Workflows owned by `owner`
    pub async fn list_workflows(&self, owner: UserId) -> Result<Vec<WorkflowSummary>, CoreError> {
        self.workflow_repo.list_for_owner(owner).await
    }

    /// Devices available for placement
    pub async fn list_devices(&self) -> Result<Vec<DeviceSummary>, CoreError> {
        self.device_catalog.list_devices().await
    }

    /// Devices followed by the built-in node templates
    pub async fn palette(&self) -> Result<Vec<PaletteItem>, CoreError> {
        let devices = self.list_devices().await?;
        Ok(build_palette(&devices))
    }
}
