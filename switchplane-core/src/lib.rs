#![forbid(unsafe_code)]

pub mod collab;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod l2fib;
pub mod pacer;
pub mod policer;
pub mod telemetry;

pub use config::{load_from_path, Config, EndpointConfig, L2FibConfig, TelemetryConfig};
pub use endpoint::{EndpointRegistry, PortAllocator};
pub use error::{DataplaneError, Result};
pub use l2fib::{L2FibTable, MacAger};
pub use pacer::TxPacer;
pub use policer::PolicerRegistry;
