use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use std::sync::Arc;

use crate::collab::{FibLookup, InterfaceTable, SessionLookup6Tuple};
use crate::config::EndpointConfig;
use crate::error::{DataplaneError, Result};
use crate::l2fib::SW_IF_INDEX_INVALID;
use crate::telemetry::Metrics;

use super::key::{EndpointKey, TransportProto};
use super::registry::EndpointRegistry;

/// A remote `(IP, port)` an outbound connection is being opened toward.
/// `port == 0` means "any", matching spec.md §8 scenario 5.
#[derive(Debug, Clone, Copy)]
pub struct RemoteTarget {
    pub ip: IpAddr,
    pub port: u16,
}

fn next_xorshift32(seed: u32) -> u32 {
    let mut x = if seed == 0 { 0x9e37_79b9 } else { seed };
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

/// Randomized source-port allocator with 6-tuple-aware port reuse — spec.md
/// §4.3. One instance is shared by every allocation on the control thread;
/// its `seed` is the only mutable state, advanced with a lock-free
/// compare-exchange loop rather than under the registry's locks.
pub struct PortAllocator {
    min_port: u16,
    max_port: u16,
    seed: AtomicU32,
    max_tries_seen: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl PortAllocator {
    pub fn new(min_port: u16, max_port: u16) -> Self {
        let seed = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0x2545_f491);
        Self {
            min_port,
            max_port,
            seed: AtomicU32::new(seed.max(1)),
            max_tries_seen: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn from_config(cfg: &EndpointConfig) -> Self {
        Self::new(cfg.port_allocator_min_src_port, cfg.port_allocator_max_src_port)
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Diagnostics: the largest number of tries any single allocation has
    /// needed so far (spec.md §4.3 "track the worst-case retry count").
    pub fn max_tries_seen(&self) -> u64 {
        self.max_tries_seen.load(Ordering::Relaxed)
    }

    fn record_tries(&self, tries: u64) {
        let _ = self.max_tries_seen.fetch_max(tries, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        if let Some(m) = &self.metrics {
            m.endpoint_allocation_failures_total.add(1, &[]);
        }
    }

    fn draw_candidate(&self) -> u16 {
        let mut seed = self.seed.load(Ordering::Relaxed);
        loop {
            let next = next_xorshift32(seed);
            match self.seed.compare_exchange_weak(seed, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => {
                    let span = u32::from(self.max_port - self.min_port);
                    return self.min_port + ((next & 0xFFFF) % span) as u16;
                }
                Err(actual) => seed = actual,
            }
        }
    }

    /// Tries up to `max - min` random candidates in `[min, max)`. A
    /// candidate that collides in the registry falls back to the 6-tuple
    /// predicate: if the full `(fib, local_ip, remote_ip, port, remote_port,
    /// proto)` tuple is not already in use by some other session, the
    /// colliding port is shared rather than rejected (spec.md §4.3 — several
    /// outbound connections may share one source port when the full 6-tuple
    /// still distinguishes them).
    pub fn alloc_port(
        &self,
        registry: &EndpointRegistry,
        proto: TransportProto,
        fib_index: u32,
        local_ip: IpAddr,
        remote: Option<RemoteTarget>,
        session_lookup: Option<&dyn SessionLookup6Tuple>,
    ) -> Result<u16> {
        if self.min_port >= self.max_port {
            return Err(DataplaneError::Invalid("port_allocator_min_src_port must be < max_src_port".to_string()));
        }
        let tries = u64::from(self.max_port - self.min_port);

        for attempt in 1..=tries {
            let candidate = self.draw_candidate();
            let key = EndpointKey::new(proto, fib_index, local_ip, candidate);

            match registry.mark_used(key) {
                Ok(_) => {
                    self.record_tries(attempt);
                    return Ok(candidate);
                }
                Err(DataplaneError::InUse) => {
                    if let (Some(remote), Some(lookup)) = (remote, session_lookup) {
                        let tuple_exists = lookup.exists(
                            fib_index,
                            local_ip,
                            remote.ip,
                            candidate,
                            remote.port,
                            proto.wire_proto(),
                        );
                        if !tuple_exists {
                            registry.share(&key)?;
                            self.record_tries(attempt);
                            return Ok(candidate);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        self.record_tries(tries);
        self.record_failure();
        Err(DataplaneError::NoPort)
    }

    /// Resolves an implicit local IP (via FIB + interface-table lookup when
    /// the caller didn't supply one), opportunistically flushes the
    /// endpoint freelist, and either reserves the caller's explicit source
    /// port or falls back to [`alloc_port`].
    #[allow(clippy::too_many_arguments)]
    pub fn allocate_local_endpoint(
        &self,
        registry: &EndpointRegistry,
        proto: TransportProto,
        fib_index: u32,
        local_ip: Option<IpAddr>,
        explicit_local_port: Option<u16>,
        remote: RemoteTarget,
        fib: &dyn FibLookup,
        if_table: &dyn InterfaceTable,
        session_lookup: Option<&dyn SessionLookup6Tuple>,
    ) -> Result<(IpAddr, u16)> {
        registry.cleanup_freelist();

        let resolved_local_ip = match local_ip {
            Some(ip) => ip,
            None => {
                let sw_if_index = fib.resolve(fib_index, remote.ip).ok_or(DataplaneError::NoRoute)?;
                if sw_if_index == SW_IF_INDEX_INVALID {
                    return Err(DataplaneError::NoInterface);
                }
                match remote.ip {
                    IpAddr::V4(_) => {
                        if_table.first_ipv4(sw_if_index).map(IpAddr::V4).ok_or(DataplaneError::NoIp)?
                    }
                    IpAddr::V6(_) => {
                        if_table.first_ipv6(sw_if_index).map(IpAddr::V6).ok_or(DataplaneError::NoIp)?
                    }
                }
            }
        };

        if let Some(port) = explicit_local_port {
            let key = EndpointKey::new(proto, fib_index, resolved_local_ip, port);
            return match registry.mark_used(key) {
                Ok(_) => Ok((resolved_local_ip, port)),
                Err(DataplaneError::InUse) => {
                    let tuple_free = session_lookup
                        .map(|lookup| {
                            !lookup.exists(
                                fib_index,
                                resolved_local_ip,
                                remote.ip,
                                port,
                                remote.port,
                                proto.wire_proto(),
                            )
                        })
                        .unwrap_or(false);
                    if tuple_free {
                        registry.share(&key)?;
                        Ok((resolved_local_ip, port))
                    } else {
                        self.record_failure();
                        Err(DataplaneError::InUse)
                    }
                }
                Err(e) => {
                    self.record_failure();
                    Err(e)
                }
            };
        }

        let port =
            self.alloc_port(registry, proto, fib_index, resolved_local_ip, Some(remote), session_lookup)?;
        Ok((resolved_local_ip, port))
    }
}
