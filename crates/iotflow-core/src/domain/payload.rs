//! Persisted workflow payload and element normalization.
//!
//! Elements travel as JSON objects tagged with a `group` discriminant
//! (`"nodes"` / `"edges"`). Stored payloads come from several producers, so
//! decoding is tolerant: the singular spellings are accepted, an element
//! without a discriminant that carries both `source` and `target` is an edge,
//! edges without an id get a deterministic one, and edge elements missing an
//! endpoint are dropped.

use super::edge::Edge;
use super::ids::UserId;
use super::links::DeviceSensorLink;
use super::node::Node;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

/// Name of the discriminant field on every element
pub const GROUP_FIELD: &str = "group";

/// Element discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementGroup {
    /// A node element
    #[serde(rename = "nodes", alias = "node")]
    Nodes,
    /// An edge element
    #[serde(rename = "edges", alias = "edge")]
    Edges,
}

impl ElementGroup {
    /// Canonical wire spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementGroup::Nodes => "nodes",
            ElementGroup::Edges => "edges",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "nodes" | "node" => Some(ElementGroup::Nodes),
            "edges" | "edge" => Some(ElementGroup::Edges),
            _ => None,
        }
    }
}

/// Workflow as handed to and returned by the storage collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPayload {
    /// Workflow name, required at save time
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Node elements
    #[serde(default)]
    pub nodes: Vec<Value>,

    /// Edge elements
    #[serde(default)]
    pub edges: Vec<Value>,

    /// Links derived at save time
    #[serde(default)]
    pub device_sensor_links: Vec<DeviceSensorLink>,

    /// Owner
    pub user_id: UserId,

    /// Visible to other users
    #[serde(default)]
    pub is_public: bool,
}

/// Nodes and edges recovered from a payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedGraph {
    /// Nodes with unique ids
    pub nodes: Vec<Node>,
    /// Edges in canonical shape, possibly dangling
    pub edges: Vec<Edge>,
}

/// Canonical `{group: "nodes", ...}` element for a node
pub fn encode_node(node: &Node) -> Result<Value, CoreError> {
    let mut value = serde_json::to_value(node)?;
    if let Value::Object(map) = &mut value {
        map.insert(GROUP_FIELD.to_string(), Value::from(ElementGroup::Nodes.as_str()));
    }
    Ok(value)
}

/// Canonical `{group: "edges", id, source, target, label, type}` element
pub fn encode_edge(edge: &Edge) -> Value {
    serde_json::json!({
        "group": ElementGroup::Edges.as_str(),
        "id": edge.id,
        "source": edge.source,
        "target": edge.target,
        "label": edge.label,
        "type": edge.edge_type,
    })
}

/// Canonical elements for a whole graph, nodes then edges
pub fn encode_elements(nodes: &[Node], edges: &[Edge]) -> Result<(Vec<Value>, Vec<Value>), CoreError> {
    let nodes = nodes.iter().map(encode_node).collect::<Result<_, _>>()?;
    let edges = edges.iter().map(encode_edge).collect();
    Ok((nodes, edges))
}

/// `fallback` is the group of the array the element was found in
fn classify(map: &Map<String, Value>, fallback: ElementGroup) -> ElementGroup {
    if let Some(tag) = map.get(GROUP_FIELD) {
        match tag.as_str().and_then(ElementGroup::parse) {
            Some(group) => return group,
            None => warn!(group = %tag, "Unknown element group, inferring from fields"),
        }
    }

    if map.contains_key("source") && map.contains_key("target") {
        ElementGroup::Edges
    } else {
        fallback
    }
}

/// `None` for an edge element missing an endpoint; it could never be valid
fn decode_edge(mut map: Map<String, Value>, index: usize) -> Result<Option<Edge>, CoreError> {
    let endpoint = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
    let (Some(source), Some(target)) = (endpoint("source"), endpoint("target")) else {
        warn!(index, id = ?map.get("id"), "Dropping edge element without both endpoints");
        return Ok(None);
    };

    let missing_id = !matches!(map.get("id"), Some(Value::String(id)) if !id.is_empty());
    if missing_id {
        let id = format!("edge-{}-{}-{}", source, target, index);
        map.insert("id".to_string(), Value::from(id));
    }
    Ok(Some(serde_json::from_value(Value::Object(map))?))
}

/// Partition and normalize raw elements.
///
/// Both arrays are scanned because legacy payloads mix edges into `nodes`.
/// An untagged element without endpoints takes the group of its array. A
/// repeated node or edge id keeps the first occurrence.
pub fn decode_elements(nodes: &[Value], edges: &[Value]) -> Result<DecodedGraph, CoreError> {
    let mut decoded = DecodedGraph::default();
    let mut seen_nodes = HashSet::new();
    let mut seen_edges = HashSet::new();

    let tagged = nodes
        .iter()
        .map(|element| (element, ElementGroup::Nodes))
        .chain(edges.iter().map(|element| (element, ElementGroup::Edges)));

    for (index, (element, fallback)) in tagged.enumerate() {
        let Value::Object(map) = element else {
            return Err(CoreError::SerializationError(format!(
                "element {} is not an object",
                index
            )));
        };

        match classify(map, fallback) {
            ElementGroup::Edges => {
                let Some(edge) = decode_edge(map.clone(), index)? else {
                    continue;
                };
                if seen_edges.insert(edge.id.clone()) {
                    decoded.edges.push(edge);
                } else {
                    warn!(edge_id = %edge.id, "Dropping edge with repeated id");
                }
            }
            ElementGroup::Nodes => {
                let node: Node = serde_json::from_value(element.clone())?;
                if seen_nodes.insert(node.id.clone()) {
                    decoded.nodes.push(node);
                } else {
                    warn!(node_id = %node.id, "Dropping node with repeated id");
                }
            }
        }
    }

    Ok(decoded)
}

impl WorkflowPayload {
    /// Decode the elements of this payload
    pub fn decode(&self) -> Result<DecodedGraph, CoreError> {
        decode_elements(&self.nodes, &self.edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{DeviceId, EdgeId, NodeId, SensorId};
    use crate::domain::node::{NodeKind, Position};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_encoded_elements_carry_group() {
        let node = Node::new(NodeId::from("sensor-1"), NodeKind::Sensor, "Temp").with_sensor(SensorId(4));
        let edge = Edge::new(EdgeId::from("e1"), NodeId::from("device-1"), NodeId::from("sensor-1"));

        let node_value = encode_node(&node).unwrap();
        let edge_value = encode_edge(&edge);

        assert_eq!(node_value["group"], json!("nodes"));
        assert_eq!(node_value["sensorId"], json!(4));
        assert_eq!(
            edge_value,
            json!({
                "group": "edges",
                "id": "e1",
                "source": "device-1",
                "target": "sensor-1",
                "label": "",
                "type": "default"
            })
        );
    }

    #[test]
    fn test_encode_then_decode_preserves_graph() {
        let nodes = vec![
            Node::new(NodeId::from("device-2"), NodeKind::Device, "Pump")
                .with_device(DeviceId(2))
                .at(Position::new(120.5, -30.0)),
            Node::new(NodeId::from("output-9"), NodeKind::Output, "Alert"),
        ];
        let edges = vec![Edge::new(EdgeId::from("e1"), NodeId::from("device-2"), NodeId::from("output-9"))
            .with_label("on fault")];

        let raw_nodes: Vec<Value> = nodes.iter().map(|n| encode_node(n).unwrap()).collect();
        let raw_edges: Vec<Value> = edges.iter().map(encode_edge).collect();

        let decoded = decode_elements(&raw_nodes, &raw_edges).unwrap();
        assert_eq!(decoded.nodes, nodes);
        assert_eq!(decoded.edges, edges);
    }

    #[test]
    fn test_legacy_edge_without_group_inside_nodes_array() {
        let raw_nodes = vec![
            json!({"id": "a", "kind": "process"}),
            json!({"id": "b", "kind": "output"}),
            json!({"source": "a", "target": "b"}),
        ];

        let decoded = decode_elements(&raw_nodes, &[]).unwrap();

        assert_eq!(decoded.nodes.len(), 2);
        assert_eq!(decoded.edges.len(), 1);
        let edge = &decoded.edges[0];
        assert_eq!(edge.id.as_str(), "edge-a-b-2");
        assert_eq!(edge.label, "");
        assert_eq!(edge.edge_type, "default");
    }

    #[test]
    fn test_singular_group_spelling_is_accepted() {
        let raw = vec![
            json!({"group": "node", "id": "a", "kind": "process"}),
            json!({"group": "edge", "id": "e", "source": "a", "target": "a"}),
        ];

        let decoded = decode_elements(&raw, &[]).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert_eq!(decoded.edges.len(), 1);
    }

    #[test]
    fn test_explicit_group_beats_field_heuristic() {
        // tagged node that also happens to carry source/target keys
        let raw = vec![json!({
            "group": "nodes",
            "id": "condition-1",
            "kind": "condition",
            "source": "x",
            "target": "y"
        })];

        let decoded = decode_elements(&raw, &[]).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert!(decoded.edges.is_empty());
    }

    #[test]
    fn test_repeated_node_id_keeps_first() {
        let raw = vec![
            json!({"id": "a", "kind": "process", "label": "first"}),
            json!({"id": "a", "kind": "process", "label": "second"}),
        ];

        let decoded = decode_elements(&raw, &[]).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert_eq!(decoded.nodes[0].label, "first");
    }

    #[test]
    fn test_repeated_edge_id_keeps_first() {
        let raw_nodes = vec![
            json!({"id": "a", "kind": "process"}),
            json!({"id": "b", "kind": "output"}),
            json!({"id": "c", "kind": "output"}),
        ];
        let raw_edges = vec![
            json!({"group": "edges", "id": "e1", "source": "a", "target": "b"}),
            json!({"group": "edges", "id": "e1", "source": "a", "target": "c"}),
        ];

        let decoded = decode_elements(&raw_nodes, &raw_edges).unwrap();
        assert_eq!(decoded.edges.len(), 1);
        assert_eq!(decoded.edges[0].target, NodeId::from("b"));
    }

    #[test]
    fn test_untagged_element_in_edges_array_stays_an_edge() {
        let raw_nodes = vec![json!({"id": "a", "kind": "process"})];
        let raw_edges = vec![
            json!({"id": "half", "source": "a"}),
            json!({"id": "orphan"}),
            json!({"source": "a", "target": "b"}),
        ];

        // neither endpoint-less element is read as a node, and the load survives
        let decoded = decode_elements(&raw_nodes, &raw_edges).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        let ids: Vec<&str> = decoded.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["edge-a-b-3"]);
    }

    #[test]
    fn test_non_object_element_is_rejected() {
        let err = decode_elements(&[json!(3)], &[]).unwrap_err();
        assert!(matches!(err, CoreError::SerializationError(_)));
    }

    #[test]
    fn test_payload_wire_field_names() {
        let payload = WorkflowPayload {
            name: "Greenhouse".into(),
            description: String::new(),
            nodes: vec![],
            edges: vec![],
            device_sensor_links: vec![DeviceSensorLink {
                device_id: DeviceId(7),
                sensor_id: SensorId(42),
                config: Default::default(),
            }],
            user_id: UserId(1),
            is_public: false,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["userId"], json!(1));
        assert_eq!(value["isPublic"], json!(false));
        assert_eq!(value["deviceSensorLinks"][0]["device_id"], json!(7));
        assert_eq!(value["deviceSensorLinks"][0]["sensor_id"], json!(42));
    }
}
