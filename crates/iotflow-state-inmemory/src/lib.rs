//! In-memory collaborators for the IoTFlow workflow editor
//!
//! This crate provides in-memory implementations of the collaborator
//! interfaces defined in iotflow-core. It backs tests, the offline CLI and
//! local development where no sensor service or workflow store is running.

use std::sync::Arc;

pub mod repositories;
pub use repositories::{InMemoryDeviceCatalog, InMemorySensorRegistry, InMemoryWorkflowRepository};

use iotflow_core::{
    domain::repository::{DeviceCatalog, DeviceSummary, SensorRegistry, WorkflowRepository},
    WorkflowPersistenceService,
};

/// Provider for in-memory collaborators sharing one set of storage
pub struct InMemoryStateStoreProvider {
    sensors: Arc<InMemorySensorRegistry>,
    devices: Arc<InMemoryDeviceCatalog>,
    workflows: Arc<InMemoryWorkflowRepository>,
}

impl InMemoryStateStoreProvider {
    /// Create a provider with an empty device catalog
    pub fn new() -> Self {
        Self::with_devices(Vec::new())
    }

    /// Create a provider whose catalog lists `devices`
    pub fn with_devices(devices: Vec<DeviceSummary>) -> Self {
        Self {
            sensors: Arc::new(InMemorySensorRegistry::new()),
            devices: Arc::new(InMemoryDeviceCatalog::new(devices)),
            workflows: Arc::new(InMemoryWorkflowRepository::new()),
        }
    }

    /// Create collaborators as trait objects
    pub fn create_repositories(
        &self,
    ) -> (
        Arc<dyn SensorRegistry>,
        Arc<dyn DeviceCatalog>,
        Arc<dyn WorkflowRepository>,
    ) {
        (
            self.sensors.clone(),
            self.devices.clone(),
            self.workflows.clone(),
        )
    }

    /// Create a persistence service wired to these collaborators
    pub fn create_service(&self) -> WorkflowPersistenceService {
        let (sensors, devices, workflows) = self.create_repositories();
        WorkflowPersistenceService::new(sensors, devices, workflows)
    }

    /// The sensor registry, for inspection
    pub fn sensors(&self) -> &Arc<InMemorySensorRegistry> {
        &self.sensors
    }

    /// The device catalog
    pub fn devices(&self) -> &Arc<InMemoryDeviceCatalog> {
        &self.devices
    }

    /// The workflow store, for inspection
    pub fn workflows(&self) -> &Arc<InMemoryWorkflowRepository> {
        &self.workflows
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
