//! Monitoring setup for the IoTFlow tools.

pub mod logging;

pub use logging::{init_logging, LogExt};

/// Configuration for initializing logging
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Service name attached to startup logs
    pub service_name: String,
    /// Log level filter (e.g., "info,iotflow_core=debug"); `RUST_LOG` wins
    pub log_filter: String,
    /// Emit JSON lines instead of pretty output
    pub enable_json_logging: bool,
    /// Include source file and line
    pub with_source_location: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "iotflow".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
            with_source_location: false,
        }
    }
}

impl MonitoringConfig {
    /// Default config for `service_name` filtered by `log_filter`
    pub fn new(service_name: impl Into<String>, log_filter: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_filter: log_filter.into(),
            ..Self::default()
        }
    }
}
