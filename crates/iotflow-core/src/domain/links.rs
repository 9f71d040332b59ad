use super::edge::Edge;
use super::ids::{DeviceId, NodeId, SensorId};
use super::node::{Config, Node, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Which sensor is wired to which device, derived from edge topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSensorLink {
    /// Backing device of the source node
    pub device_id: DeviceId,
    /// Backing sensor of the target node
    pub sensor_id: SensorId,
    /// The sensor node's config
    #[serde(default)]
    pub config: Config,
}

/// Derive one link per `Device -> Sensor` edge.
///
/// Callers pass already-sanitized edges. Pairs whose device or sensor has no
/// backing id are skipped with a warning; after save-time registration every
/// sensor is backed.
pub fn derive_links(nodes: &[Node], edges: &[Edge]) -> Vec<DeviceSensorLink> {
    let by_id: HashMap<&NodeId, &Node> = nodes.iter().map(|n| (&n.id, n)).collect();
    let mut links = Vec::new();

    for edge in edges {
        let (Some(source), Some(target)) = (by_id.get(&edge.source), by_id.get(&edge.target))
        else {
            continue;
        };
        if source.kind != NodeKind::Device || target.kind != NodeKind::Sensor {
            continue;
        }

        match (source.backing_device_id, target.backing_sensor_id) {
            (Some(device_id), Some(sensor_id)) => links.push(DeviceSensorLink {
                device_id,
                sensor_id,
                config: target.config.clone(),
            }),
            _ => warn!(
                edge_id = %edge.id,
                device_node = %source.id,
                sensor_node = %target.id,
                "Skipping device-sensor link without backing ids"
            ),
        }
    }

    links
}
