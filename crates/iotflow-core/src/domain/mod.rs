/// Identifier value objects and allocation
pub mod ids;

/// Workflow nodes
pub mod node;

/// Workflow edges
pub mod edge;

/// Copy-on-write graph store
pub mod graph_store;

/// Structural edge validation
pub mod validator;

/// Device-sensor link derivation
pub mod links;

/// Persisted payload and element normalization
pub mod payload;

/// Collaborator interfaces
pub mod repository;
