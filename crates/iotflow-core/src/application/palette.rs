//! Items the user can drag onto the canvas

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::ids::{DeviceId, SensorId};
use crate::domain::node::{Config, NodeKind, DEFAULT_SENSOR_TYPE};
use crate::domain::repository::DeviceSummary;
use crate::CoreError;

/// A draggable palette entry, also the drag payload format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteItem {
    /// Kind of node the drop creates
    #[serde(alias = "type")]
    pub kind: NodeKind,
    /// Initial label
    #[serde(default)]
    pub label: String,
    /// Initial config
    #[serde(default)]
    pub config: Config,
    /// Backing device, required for device items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Already-registered sensor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<SensorId>,
}

fn object(value: Value) -> Config {
    match value {
        Value::Object(map) => map,
        _ => Config::new(),
    }
}

impl PaletteItem {
    /// Entry for a catalogued device
    pub fn device(device: &DeviceSummary) -> Self {
        Self {
            kind: NodeKind::Device,
            label: device.name.clone(),
            config: device.config.clone(),
            device_id: Some(device.device_id),
            sensor_id: None,
        }
    }

    /// Built-in template for a non-device kind
    pub fn template(kind: NodeKind) -> Self {
        let (label, config) = match kind {
            NodeKind::Sensor => (
                "New Sensor",
                json!({ "sensorType": DEFAULT_SENSOR_TYPE, "unit": "" }),
            ),
            NodeKind::Process => ("Process", json!({ "operation": "average", "window": 60 })),
            NodeKind::Condition => (
                "Condition",
                json!({ "field": "value", "operator": ">", "compareValue": 0 }),
            ),
            NodeKind::Output => ("Output", json!({ "outputType": "notification" })),
            NodeKind::Device => ("Device", json!({})),
        };

        Self {
            kind,
            label: label.to_string(),
            config: object(config),
            device_id: None,
            sensor_id: None,
        }
    }

    /// Serialize as drag data
    pub fn to_payload(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode drag data
    pub fn from_payload(payload: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Device entries followed by the fixed templates
pub fn build_palette(devices: &[DeviceSummary]) -> Vec<PaletteItem> {
    devices
        .iter()
        .map(PaletteItem::device)
        .chain(
            [
                NodeKind::Sensor,
                NodeKind::Process,
                NodeKind::Condition,
                NodeKind::Output,
            ]
            .into_iter()
            .map(PaletteItem::template),
        )
        .collect()
}
