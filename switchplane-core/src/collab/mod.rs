//! Trait-object seams for the systems this crate never owns: bridge-domain
//! and interface tables, FIB lookup, the session layer's 6-tuple predicate,
//! the forwarding feature graph, and the MAC event subscriber.
//!
//! Every core (`l2fib`, `policer`, `endpoint`) is built and tested against
//! these traits rather than against any concrete implementation, the same
//! way the connection path in this workspace is built against
//! `CryptoSource`/`Reload` rather than a specific certificate store.

mod direction;
mod event;

pub mod testing;

pub use direction::Direction;
pub use event::{MacEvent, MacEventAction};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Read/write view onto bridge-domain state the L2-FIB ager needs.
pub trait BridgeDomainTable: Send + Sync {
    fn is_valid(&self, bd_index: u16) -> bool;

    fn seq_num(&self, bd_index: u16) -> Option<u8>;

    /// Bumps the rolling sequence number, invalidating every L2-FIB entry
    /// whose stored `sn` no longer matches.
    fn bump_seq_num(&self, bd_index: u16);

    /// Minutes of inactivity before a learned entry ages out; `0` disables aging.
    fn mac_age(&self, bd_index: u16) -> Option<u8>;

    fn learn_count(&self, bd_index: u16) -> u32;

    fn set_learn_count(&self, bd_index: u16, count: u32);

    fn learn_limit(&self, bd_index: u16) -> Option<u32>;

    /// Every bridge domain index currently provisioned; used by `flush_all`
    /// and `clear` to enumerate what needs bumping or zeroing.
    fn valid_bd_indices(&self) -> Vec<u16>;
}

/// Read/write view onto interface state the L2-FIB ager and the endpoint
/// registry's IP resolution path need.
pub trait InterfaceTable: Send + Sync {
    fn input_seq_num(&self, sw_if_index: u32) -> Option<u8>;

    /// Bumps the interface's input sequence number, used by `flush_interface`.
    fn bump_input_seq_num(&self, sw_if_index: u32);

    fn first_ipv4(&self, sw_if_index: u32) -> Option<Ipv4Addr>;

    fn first_ipv6(&self, sw_if_index: u32) -> Option<Ipv6Addr>;
}

/// Prefix lookup, returning the resolving interface for a destination.
pub trait FibLookup: Send + Sync {
    fn resolve(&self, fib_index: u32, dst: IpAddr) -> Option<u32>;
}

/// The session layer's 6-tuple existence predicate, consulted by the port
/// allocator when a candidate source port is already in use for some other
/// remote.
pub trait SessionLookup6Tuple: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn exists(
        &self,
        fib_index: u32,
        local_ip: IpAddr,
        remote_ip: IpAddr,
        local_port: u16,
        remote_port: u16,
        proto: u8,
    ) -> bool;
}

/// Enables or disables a named data-plane feature on a named feature arc of
/// an interface, e.g. `policer-input` on the `device-input` arc for RX, or
/// `policer-output` on each of the `ip4-output`/`ip6-output` arcs for TX.
pub trait FeatureGraph: Send + Sync {
    fn enable(&self, sw_if_index: u32, arc: &str, feature: &str, dir: Direction);

    fn disable(&self, sw_if_index: u32, arc: &str, feature: &str, dir: Direction);
}

/// The single subscriber that receives batched MAC learn/move/delete events
/// from the L2-FIB ager. `publish` returns `false` when the subscriber's
/// queue is full; the ager logs a warning and drops the batch rather than
/// blocking the scan.
pub trait MacEventClient: Send + Sync {
    fn publish(&self, batch: Vec<MacEvent>) -> bool;
}
