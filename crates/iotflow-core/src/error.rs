use thiserror::Error;

/// Core error type for the IoTFlow workflow editor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A node id collided with one already in the graph
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Validation error (missing workflow name, bad request)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The sensor registration collaborator rejected or failed a request
    #[error("Sensor registration failed: {0}")]
    SensorRegistrationFailed(String),

    /// Workflow not found
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Workflow is owned by another user
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Collaborator or transport failure
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether the error should be shown to the person editing the workflow.
    ///
    /// Duplicate ids are contract violations and are reported as defects instead.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            CoreError::ValidationError(_)
                | CoreError::SensorRegistrationFailed(_)
                | CoreError::WorkflowNotFound(_)
                | CoreError::NotAuthorized(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
