use serde::Deserialize;

/// L2-FIB backing-store sizing (spec.md §6).
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct L2FibConfig {
    /// Number of hash shards. Must be a power of two.
    #[serde(default = "default_num_buckets")]
    pub num_buckets: u32,
    /// Memory budget in bytes, used to derive a max-entries cap.
    #[serde(default = "default_table_size")]
    pub table_size: u64,
}

impl Default for L2FibConfig {
    fn default() -> Self {
        Self { num_buckets: default_num_buckets(), table_size: default_table_size() }
    }
}

fn default_num_buckets() -> u32 {
    65536
}

fn default_table_size() -> u64 {
    16 * 1024 * 1024
}
