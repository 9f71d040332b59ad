use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use async_trait::async_trait;

use iotflow_core::{
    domain::ids::{SensorId, UserId, WorkflowId},
    domain::payload::WorkflowPayload,
    domain::repository::{
        DeviceCatalog, DeviceSummary, SensorRegistration, SensorRegistry, StoredWorkflow,
        WorkflowKey, WorkflowRepository, WorkflowSummary,
    },
    CoreError,
};

/// In-memory implementation of the SensorRegistry
pub struct InMemorySensorRegistry {
    sensors: Arc<RwLock<HashMap<i64, SensorRegistration>>>,
    next_id: AtomicI64,
    calls: AtomicUsize,
    unavailable: AtomicBool,
    failing_call: AtomicUsize,
}

impl InMemorySensorRegistry {
    /// Create an empty registry; ids start at 1
    pub fn new() -> Self {
        Self {
            sensors: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicI64::new(1),
            calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            failing_call: AtomicUsize::new(0),
        }
    }

    /// Make every following registration fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail only the `call`-th registration attempt (1-based, counting all attempts)
    pub fn fail_call(&self, call: usize) {
        self.failing_call.store(call, Ordering::SeqCst);
    }

    /// Number of registration attempts, failed ones included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Look up a registered sensor
    pub async fn get(&self, id: SensorId) -> Option<SensorRegistration> {
        self.sensors.read().await.get(&id.0).cloned()
    }

    /// Number of registered sensors
    pub async fn registered_count(&self) -> usize {
        self.sensors.read().await.len()
    }
}

impl Default for InMemorySensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorRegistry for InMemorySensorRegistry {
    async fn register_sensor(&self, registration: &SensorRegistration) -> Result<SensorId, CoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.unavailable.load(Ordering::SeqCst) || self.failing_call.load(Ordering::SeqCst) == call {
            warn!(name = %registration.name, "Sensor registry unavailable");
            return Err(CoreError::RepositoryError(
                "sensor service unavailable".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut sensors = self.sensors.write().await;
        sensors.insert(id, registration.clone());

        debug!(sensor_id = id, name = %registration.name, "Registered sensor");
        Ok(SensorId(id))
    }
}

/// In-memory implementation of the DeviceCatalog
pub struct InMemoryDeviceCatalog {
    devices: Arc<RwLock<Vec<DeviceSummary>>>,
}

impl InMemoryDeviceCatalog {
    /// Create a catalog listing `devices`
    pub fn new(devices: Vec<DeviceSummary>) -> Self {
        Self {
            devices: Arc::new(RwLock::new(devices)),
        }
    }

    /// Add a device to the catalog
    pub async fn add_device(&self, device: DeviceSummary) {
        self.devices.write().await.push(device);
    }
}

#[async_trait]
impl DeviceCatalog for InMemoryDeviceCatalog {
    async fn list_devices(&self) -> Result<Vec<DeviceSummary>, CoreError> {
        Ok(self.devices.read().await.clone())
    }
}

/// In-memory implementation of the WorkflowRepository
pub struct InMemoryWorkflowRepository {
    workflows: Arc<RwLock<HashMap<i64, StoredWorkflow>>>,
    next_id: AtomicI64,
    writes: AtomicUsize,
    read_only: AtomicBool,
}

impl InMemoryWorkflowRepository {
    /// Create an empty repository; ids start at 1
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicI64::new(1),
            writes: AtomicUsize::new(0),
            read_only: AtomicBool::new(false),
        }
    }

    /// Reject every following save and update (or accept them again)
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), CoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            warn!("Workflow store rejected write");
            return Err(CoreError::RepositoryError("workflow store is read-only".to_string()));
        }
        Ok(())
    }

    /// Number of successful saves and updates
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Insert a payload as-is, bypassing the editor (legacy fixtures)
    pub async fn insert_raw(&self, payload: WorkflowPayload) -> WorkflowId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut workflows = self.workflows.write().await;
        workflows.insert(
            id,
            StoredWorkflow {
                id: WorkflowId(id),
                payload,
            },
        );
        WorkflowId(id)
    }
}

impl Default for InMemoryWorkflowRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save(&self, payload: &WorkflowPayload) -> Result<WorkflowId, CoreError> {
        self.check_writable()?;
        let id = self.insert_raw(payload.clone()).await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(workflow_id = %id, name = %payload.name, "Stored workflow");
        Ok(id)
    }

    async fn update(&self, id: WorkflowId, payload: &WorkflowPayload) -> Result<(), CoreError> {
        self.check_writable()?;
        let mut workflows = self.workflows.write().await;
        let stored = workflows
            .get_mut(&id.0)
            .ok_or_else(|| CoreError::WorkflowNotFound(WorkflowKey::Id(id).to_string()))?;
        stored.payload = payload.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(workflow_id = %id, "Updated workflow");
        Ok(())
    }

    async fn find(&self, key: &WorkflowKey) -> Result<Option<StoredWorkflow>, CoreError> {
        let workflows = self.workflows.read().await;
        let found = match key {
            WorkflowKey::Id(id) => workflows.get(&id.0).cloned(),
            // Names are not unique; the oldest wins
            WorkflowKey::Name(name) => workflows
                .values()
                .filter(|w| &w.payload.name == name)
                .min_by_key(|w| w.id.0)
                .cloned(),
        };
        Ok(found)
    }

    async fn delete(&self, id: WorkflowId) -> Result<(), CoreError> {
        let mut workflows = self.workflows.write().await;
        match workflows.remove(&id.0) {
            Some(_) => Ok(()),
            None => Err(CoreError::WorkflowNotFound(WorkflowKey::Id(id).to_string())),
        }
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<WorkflowSummary>, CoreError> {
        let workflows = self.workflows.read().await;
        let mut summaries: Vec<WorkflowSummary> = workflows
            .values()
            .filter(|w| w.payload.user_id == owner)
            .map(WorkflowSummary::from)
            .collect();
        summaries.sort_by_key(|s| s.id.0);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotflow_core::domain::node::Config;

    fn payload(name: &str, owner: i64) -> WorkflowPayload {
        WorkflowPayload {
            name: name.to_string(),
            description: String::new(),
            nodes: vec![],
            edges: vec![],
            device_sensor_links: vec![],
            user_id: UserId(owner),
            is_public: false,
        }
    }

    fn registration(name: &str) -> SensorRegistration {
        SensorRegistration {
            name: name.to_string(),
            sensor_type: "CUSTOM".to_string(),
            description: String::new(),
            config: Config::new(),
        }
    }

    #[tokio::test]
    async fn test_sensor_registry_assigns_sequential_ids() -> Result<(), CoreError> {
        let registry = InMemorySensorRegistry::new();

        let first = registry.register_sensor(&registration("a")).await?;
        let second = registry.register_sensor(&registration("a")).await?;

        assert_eq!(first, SensorId(1));
        assert_eq!(second, SensorId(2));
        assert_eq!(registry.registered_count().await, 2);
        assert_eq!(registry.get(first).await.unwrap().name, "a");
        Ok(())
    }

    #[tokio::test]
    async fn test_unavailable_registry_counts_attempts() {
        let registry = InMemorySensorRegistry::new();
        registry.set_unavailable(true);

        let err = registry.register_sensor(&registration("a")).await.unwrap_err();

        assert!(matches!(err, CoreError::RepositoryError(_)));
        assert_eq!(registry.call_count(), 1);
        assert_eq!(registry.registered_count().await, 0);
    }

    #[tokio::test]
    async fn test_fail_call_fails_only_that_attempt() {
        let registry = InMemorySensorRegistry::new();
        registry.fail_call(2);

        assert!(registry.register_sensor(&registration("a")).await.is_ok());
        assert!(registry.register_sensor(&registration("b")).await.is_err());
        assert_eq!(registry.register_sensor(&registration("b")).await, Ok(SensorId(2)));
        assert_eq!(registry.call_count(), 3);
    }

    #[tokio::test]
    async fn test_read_only_store_rejects_writes() {
        let repo = InMemoryWorkflowRepository::new();
        repo.set_read_only(true);

        let err = repo.save(&payload("Greenhouse", 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::RepositoryError(_)));
        assert_eq!(repo.write_count(), 0);

        repo.set_read_only(false);
        assert!(repo.save(&payload("Greenhouse", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_workflow_repository_lifecycle() -> Result<(), CoreError> {
        let repo = InMemoryWorkflowRepository::new();

        let id = repo.save(&payload("Greenhouse", 1)).await?;
        tokio_test::assert_ok!(repo.update(id, &payload("Greenhouse v2", 1)).await);

        let found = repo.find(&WorkflowKey::Id(id)).await?.unwrap();
        assert_eq!(found.payload.name, "Greenhouse v2");
        assert!(repo.find(&WorkflowKey::Name("Greenhouse".into())).await?.is_none());
        assert_eq!(repo.write_count(), 2);

        repo.delete(id).await?;
        assert!(repo.find(&WorkflowKey::Id(id)).await?.is_none());
        assert!(matches!(
            repo.delete(id).await,
            Err(CoreError::WorkflowNotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_name_prefers_oldest() -> Result<(), CoreError> {
        let repo = InMemoryWorkflowRepository::new();
        let first = repo.save(&payload("Dup", 1)).await?;
        repo.save(&payload("Dup", 2)).await?;

        let found = repo.find(&WorkflowKey::Name("Dup".into())).await?.unwrap();
        assert_eq!(found.id, first);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_workflow() {
        let repo = InMemoryWorkflowRepository::new();
        let err = repo.update(WorkflowId(99), &payload("x", 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::WorkflowNotFound(_)));
        assert_eq!(repo.write_count(), 0);
    }

    #[tokio::test]
    async fn test_list_for_owner_filters_and_sorts() -> Result<(), CoreError> {
        let repo = InMemoryWorkflowRepository::new();
        repo.save(&payload("b", 1)).await?;
        repo.save(&payload("other", 2)).await?;
        repo.save(&payload("c", 1)).await?;

        let listed = repo.list_for_owner(UserId(1)).await?;
        let names: Vec<&str> = listed.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        Ok(())
    }
}
