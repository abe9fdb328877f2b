use serde::Deserialize;

/// Logging and metrics configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "switchplane_core=debug".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Port the Prometheus exporter listens on. `None` disables the metrics server.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), metrics_port: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
