mod config;
mod registry;

pub use config::{to_runtime, Action, PolicerConfig, PolicerRuntime, PolicerType, RateUnit, Rounding};
pub use registry::{CounterSnapshot, PolicerCounterSnapshot, PolicerRegistry, Verdict};
