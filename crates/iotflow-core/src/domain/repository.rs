//! Collaborator traits for the IoTFlow core
//!
//! The core never talks to a transport directly. Sensor registration, the
//! device catalog and workflow storage are injected as trait objects so the
//! same pipeline runs against HTTP clients in production and in-memory
//! implementations in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ids::{DeviceId, SensorId, UserId, WorkflowId};
use super::node::Config;
use super::payload::WorkflowPayload;
use crate::CoreError;

/// Request sent to the sensor registration collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRegistration {
    /// Sensor name (the node label)
    pub name: String,
    /// Sensor type (`config.sensorType` or `CUSTOM`)
    #[serde(rename = "type")]
    pub sensor_type: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// The node config
    #[serde(default)]
    pub config: Config,
}

/// Device entry used to populate the palette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Backing device id
    pub device_id: DeviceId,
    /// Display name
    pub name: String,
    /// Device type
    #[serde(rename = "type")]
    pub device_type: String,
    /// Device config
    #[serde(default)]
    pub config: Config,
}

/// A payload as held by workflow storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWorkflow {
    /// Storage id
    pub id: WorkflowId,
    /// The payload
    #[serde(flatten)]
    pub payload: WorkflowPayload,
}

/// Listing entry for a stored workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    /// Storage id
    pub id: WorkflowId,
    /// Workflow name
    pub name: String,
    /// Description
    pub description: String,
    /// Node count
    pub node_count: usize,
    /// Edge count
    pub edge_count: usize,
    /// Visible to other users
    pub is_public: bool,
}

impl From<&StoredWorkflow> for WorkflowSummary {
    fn from(stored: &StoredWorkflow) -> Self {
        Self {
            id: stored.id,
            name: stored.payload.name.clone(),
            description: stored.payload.description.clone(),
            node_count: stored.payload.nodes.len(),
            edge_count: stored.payload.edges.len(),
            is_public: stored.payload.is_public,
        }
    }
}

/// How to look a workflow up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowKey {
    /// By storage id
    Id(WorkflowId),
    /// By workflow name
    Name(String),
}

impl std::fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowKey::Id(id) => write!(f, "id {}", id),
            WorkflowKey::Name(name) => write!(f, "name '{}'", name),
        }
    }
}

/// Registers ad-hoc sensors with the external sensor service.
///
/// Not idempotent: calling twice creates two sensors.
#[async_trait]
pub trait SensorRegistry: Send + Sync {
    /// Register a sensor and return its backing id
    async fn register_sensor(&self, registration: &SensorRegistration) -> Result<SensorId, CoreError>;
}

/// Read-only view of the devices the user can place
#[async_trait]
pub trait DeviceCatalog: Send + Sync {
    /// List devices
    async fn list_devices(&self) -> Result<Vec<DeviceSummary>, CoreError>;
}

/// Storage for workflow payloads
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Store a new workflow and return its id
    async fn save(&self, payload: &WorkflowPayload) -> Result<WorkflowId, CoreError>;

    /// Overwrite an existing workflow
    async fn update(&self, id: WorkflowId, payload: &WorkflowPayload) -> Result<(), CoreError>;

    /// Find a workflow by id or name
    async fn find(&self, key: &WorkflowKey) -> Result<Option<StoredWorkflow>, CoreError>;

    /// Delete a workflow
    async fn delete(&self, id: WorkflowId) -> Result<(), CoreError>;

    /// List workflows owned by `owner`
    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<WorkflowSummary>, CoreError>;
}
