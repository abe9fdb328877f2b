use serde::Deserialize;

/// Transport endpoint registry and port allocator sizing (spec.md §6).
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Number of hash shards.
    #[serde(default = "default_buckets")]
    pub buckets: u32,
    /// Memory budget in bytes.
    #[serde(default = "default_memory")]
    pub memory: u64,
    /// Lower bound (inclusive) of the ephemeral port range.
    #[serde(default = "default_min_port")]
    pub port_allocator_min_src_port: u16,
    /// Upper bound (exclusive) of the ephemeral port range.
    #[serde(default = "default_max_port")]
    pub port_allocator_max_src_port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
            memory: default_memory(),
            port_allocator_min_src_port: default_min_port(),
            port_allocator_max_src_port: default_max_port(),
        }
    }
}

fn default_buckets() -> u32 {
    250_000
}

fn default_memory() -> u64 {
    512 << 20
}

fn default_min_port() -> u16 {
    1024
}

fn default_max_port() -> u16 {
    65535
}
