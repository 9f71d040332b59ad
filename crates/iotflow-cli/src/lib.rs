//! Offline operations over stored workflow payload files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use iotflow_core::domain::payload::encode_elements;
use iotflow_core::{derive_links, sanitize_report, CoreError, DeviceSensorLink, WorkflowPayload};

/// Summary printed by `iotflow inspect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    /// Workflow name
    pub name: String,
    /// Node count per kind
    pub kinds: BTreeMap<&'static str, usize>,
    /// Sensor nodes that would be registered on the next save
    pub unregistered_sensors: usize,
    /// Renderable edges
    pub valid_edges: usize,
    /// Ids of dangling or self-loop edges
    pub dropped_edges: Vec<String>,
    /// Links derived from the valid edges
    pub links: Vec<DeviceSensorLink>,
}

/// Read and parse a payload file
pub fn read_payload(path: &Path) -> anyhow::Result<WorkflowPayload> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a workflow payload", path.display()))
}

/// Summarize a payload
pub fn inspect(payload: &WorkflowPayload) -> Result<InspectReport, CoreError> {
    let graph = payload.decode()?;
    let report = sanitize_report(&graph.nodes, &graph.edges);

    let mut kinds = BTreeMap::new();
    for node in &graph.nodes {
        *kinds.entry(node.kind.id_prefix()).or_insert(0) += 1;
    }

    Ok(InspectReport {
        name: payload.name.clone(),
        kinds,
        unregistered_sensors: graph.nodes.iter().filter(|n| n.is_unregistered_sensor()).count(),
        valid_edges: report.valid.len(),
        dropped_edges: report.dropped.iter().map(|e| e.id.to_string()).collect(),
        links: derive_links(&graph.nodes, &report.valid),
    })
}

/// Rewrite a payload into canonical elements, without invalid edges and with fresh links
pub fn normalize(payload: &WorkflowPayload) -> Result<WorkflowPayload, CoreError> {
    let graph = payload.decode()?;
    let report = sanitize_report(&graph.nodes, &graph.edges);
    let (nodes, edges) = encode_elements(&graph.nodes, &report.valid)?;

    tracing::debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        dropped = report.dropped.len(),
        "Payload normalized"
    );

    Ok(WorkflowPayload {
        nodes,
        edges,
        device_sensor_links: derive_links(&graph.nodes, &report.valid),
        ..payload.clone()
    })
}

/// Device-sensor links implied by a payload's edges
pub fn links(payload: &WorkflowPayload) -> Result<Vec<DeviceSensorLink>, CoreError> {
    let graph = payload.decode()?;
    let valid = iotflow_core::sanitize(&graph.nodes, &graph.edges);
    Ok(derive_links(&graph.nodes, &valid))
}
