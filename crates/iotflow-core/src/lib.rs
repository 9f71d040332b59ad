//!
//! IoTFlow Core - workflow graph editor for the IoTFlow platform
//!
//! This crate holds the workflow graph model, the structural rules it must
//! satisfy, the editing session that keeps a rendering surface in step with
//! it, and the pipeline that turns it into a stored payload and back.
//! Transports and storage live behind the collaborator traits in
//! [`domain::repository`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - graph model, invariants and collaborator interfaces
pub mod domain;

/// Application services - editing session and persistence pipeline
pub mod application;

/// Editor configuration
pub mod config;

/// Error types
pub mod error;

// Re-export key types
pub use config::EditorConfig;
pub use error::CoreError;

// Re-export main API types for easy use
pub use application::canvas::{CanvasEvent, Key, RenderSurface, Selection};
pub use application::editor_session::{EditorSession, PendingSave, WorkflowMeta};
pub use application::palette::PaletteItem;
pub use application::workflow_persistence_service::{
    LoadedWorkflow, SaveAttempt, SaveOutcome, SaveRequest, WorkflowPersistenceService,
};
pub use domain::edge::Edge;
pub use domain::graph_store::{GraphSnapshot, GraphStore};
pub use domain::ids::{
    device_node_id, DeviceId, EdgeId, IdAllocator, IdScheme, NodeId, SensorId, UserId, WorkflowId,
};
pub use domain::links::{derive_links, DeviceSensorLink};
pub use domain::node::{Config, Node, NodeKind, NodePatch, Position};
pub use domain::payload::{DecodedGraph, WorkflowPayload};
pub use domain::repository::{
    DeviceCatalog, DeviceSummary, SensorRegistration, SensorRegistry, StoredWorkflow, WorkflowKey,
    WorkflowRepository, WorkflowSummary,
};
pub use domain::validator::{sanitize, sanitize_report, SanitizeReport};
