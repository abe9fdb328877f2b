use crate::config::Config;
use crate::error::{DataplaneError, Result};

pub fn validate(config: &Config) -> Result<()> {
    if !config.l2fib.num_buckets.is_power_of_two() {
        return Err(DataplaneError::Invalid(format!(
            "l2fib.num_buckets must be a power of two, got {}",
            config.l2fib.num_buckets
        )));
    }
    if config.l2fib.table_size == 0 {
        return Err(DataplaneError::Invalid("l2fib.table_size must be > 0".into()));
    }
    if config.endpoint.buckets == 0 {
        return Err(DataplaneError::Invalid("endpoint.buckets must be > 0".into()));
    }
    if config.endpoint.port_allocator_min_src_port >= config.endpoint.port_allocator_max_src_port
    {
        return Err(DataplaneError::Invalid(
            "endpoint.port_allocator_min_src_port must be < port_allocator_max_src_port".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, L2FibConfig};

    #[test]
    fn rejects_non_power_of_two_buckets() {
        let cfg = Config {
            l2fib: L2FibConfig { num_buckets: 100, table_size: 1024 },
            ..Default::default()
        };
        assert!(matches!(validate(&cfg), Err(DataplaneError::Invalid(_))));
    }

    #[test]
    fn rejects_inverted_port_range() {
        let cfg = Config {
            endpoint: EndpointConfig {
                port_allocator_min_src_port: 40000,
                port_allocator_max_src_port: 1024,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(validate(&cfg), Err(DataplaneError::Invalid(_))));
    }

    #[test]
    fn accepts_defaults() {
        assert!(validate(&Config::default()).is_ok());
    }
}
