use super::ids::{DeviceId, NodeId, SensorId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Kind-specific node parameters
pub type Config = serde_json::Map<String, Value>;

/// Sensor type sent to registration when a sensor node does not name one
pub const DEFAULT_SENSOR_TYPE: &str = "CUSTOM";

/// Pipeline stage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Reads a physical or virtual sensor
    Sensor,
    /// Bound to an externally-owned device
    Device,
    /// Transforms data
    Process,
    /// Branches on a comparison
    Condition,
    /// Emits an action (notification, actuator, webhook)
    Output,
}

impl NodeKind {
    /// Prefix used for ids minted for this kind
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeKind::Sensor => "sensor",
            NodeKind::Device => "device",
            NodeKind::Process => "process",
            NodeKind::Condition => "condition",
            NodeKind::Output => "output",
        }
    }
}

/// Canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Create a position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One stage of an authored workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique within the graph, stable across save/load
    pub id: NodeId,

    /// Node kind
    #[serde(alias = "type")]
    pub kind: NodeKind,

    /// User-visible name
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,

    /// Kind-specific parameters
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: Config,

    /// Backing device, only on device nodes
    #[serde(
        default,
        rename = "deviceId",
        alias = "backingDeviceId",
        skip_serializing_if = "Option::is_none"
    )]
    pub backing_device_id: Option<DeviceId>,

    /// Backing sensor, absent until the sensor is registered
    #[serde(
        default,
        rename = "sensorId",
        alias = "backingSensorId",
        skip_serializing_if = "Option::is_none"
    )]
    pub backing_sensor_id: Option<SensorId>,

    /// Canvas position as of the last capture
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: Position,
}

impl Node {
    /// Create a node with an empty config at the origin
    pub fn new(id: NodeId, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            config: Config::new(),
            backing_device_id: None,
            backing_sensor_id: None,
            position: Position::default(),
        }
    }

    /// Set the config
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the position
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Set the backing device
    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.backing_device_id = Some(device_id);
        self
    }

    /// Set the backing sensor
    pub fn with_sensor(mut self, sensor_id: SensorId) -> Self {
        self.backing_sensor_id = Some(sensor_id);
        self
    }

    /// A sensor node that has not been registered yet
    pub fn is_unregistered_sensor(&self) -> bool {
        self.kind == NodeKind::Sensor && self.backing_sensor_id.is_none()
    }

    /// `config.sensorType`, falling back to [`DEFAULT_SENSOR_TYPE`]
    pub fn sensor_type(&self) -> &str {
        self.config
            .get("sensorType")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SENSOR_TYPE)
    }

    /// Merge a partial update into this node. Fields absent from the patch are kept.
    pub fn apply(&mut self, patch: NodePatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(config) = patch.config {
            self.config = config;
        }
        if let Some(device_id) = patch.backing_device_id {
            self.backing_device_id = Some(device_id);
        }
        if let Some(sensor_id) = patch.backing_sensor_id {
            self.backing_sensor_id = Some(sensor_id);
        }
    }
}

/// Partial node update. Position is deliberately absent: it has its own path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    /// New label
    pub label: Option<String>,
    /// Replacement config
    pub config: Option<Config>,
    /// Backing device
    pub backing_device_id: Option<DeviceId>,
    /// Backing sensor
    pub backing_sensor_id: Option<SensorId>,
}

impl NodePatch {
    /// Patch that only changes the label
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Patch that only replaces the config
    pub fn config(config: Config) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Patch that only back-fills the sensor id
    pub fn sensor(sensor_id: SensorId) -> Self {
        Self {
            backing_sensor_id: Some(sensor_id),
            ..Self::default()
        }
    }

    /// Whether applying the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.config.is_none()
            && self.backing_device_id.is_none()
            && self.backing_sensor_id.is_none()
    }
}

/// Treat an explicit `null` like a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
