use serde::Deserialize;

use super::endpoint::EndpointConfig;
use super::l2fib::L2FibConfig;
use super::telemetry::TelemetryConfig;

/// Top-level configuration for the data-plane core.
///
/// Policer instances carry no global configuration (spec.md §6) — they are
/// created at runtime via [`crate::policer::PolicerRegistry::add`].
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub l2fib: L2FibConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
