mod endpoint;
mod l2fib;
mod loader;
mod root;
mod telemetry;
mod validator;

pub use endpoint::EndpointConfig;
pub use l2fib::L2FibConfig;
pub use loader::load_from_path;
pub use root::Config;
pub use telemetry::TelemetryConfig;
pub use validator::validate;
