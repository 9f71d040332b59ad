//! Configuration for the workflow editor
//!
//! Values come from defaults overridden by `IOTFLOW_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::ids::IdScheme;
use crate::CoreError;

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Property editor commit delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Shape of freshly minted node and edge ids
    #[serde(default)]
    pub id_scheme: IdScheme,

    /// Maximum number of undo steps kept
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Default tracing filter
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_history_limit() -> usize {
    50
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            id_scheme: IdScheme::default(),
            history_limit: default_history_limit(),
            log_filter: default_log_filter(),
        }
    }
}

impl EditorConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Start with defaults
        let mut config = Self::default();

        if let Some(value) = lookup("IOTFLOW_DEBOUNCE_MS") {
            match value.parse::<u64>() {
                Ok(ms) => config.debounce_ms = ms,
                Err(_) => warn!("Invalid IOTFLOW_DEBOUNCE_MS value: {}", value),
            }
        }

        if let Some(value) = lookup("IOTFLOW_ID_SCHEME") {
            match value.parse::<IdScheme>() {
                Ok(scheme) => config.id_scheme = scheme,
                Err(e) => warn!("Invalid IOTFLOW_ID_SCHEME value: {}", e),
            }
        }

        if let Some(value) = lookup("IOTFLOW_HISTORY_LIMIT") {
            match value.parse::<usize>() {
                Ok(limit) => config.history_limit = limit,
                Err(_) => warn!("Invalid IOTFLOW_HISTORY_LIMIT value: {}", value),
            }
        }

        if let Some(filter) = lookup("IOTFLOW_LOG_FILTER") {
            config.log_filter = filter;
        }

        config.validate()?;

        info!(
            debounce_ms = config.debounce_ms,
            id_scheme = ?config.id_scheme,
            history_limit = config.history_limit,
            "Editor configuration loaded"
        );

        Ok(config)
    }

    /// Reject values the editor cannot work with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.debounce_ms == 0 {
            return Err(CoreError::ConfigurationError(
                "debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(CoreError::ConfigurationError(
                "history_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Debounce window as a duration
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
