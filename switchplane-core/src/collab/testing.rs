//! In-memory test doubles for the collaborator traits. These back the
//! integration tests for `l2fib`, `policer`, and `endpoint` — none of them
//! talk to a real forwarding graph.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Mutex, RwLock};

use super::{BridgeDomainTable, Direction, FeatureGraph, FibLookup, MacEvent, MacEventClient, SessionLookup6Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeDomainState {
    pub seq_num: u8,
    pub mac_age: u8,
    pub learn_count: u32,
    pub learn_limit: u32,
}

/// A plain `HashMap`-backed bridge-domain table. Every index inserted via
/// [`InMemoryBridgeDomainTable::provision`] is considered valid.
#[derive(Default)]
pub struct InMemoryBridgeDomainTable {
    inner: RwLock<HashMap<u16, BridgeDomainState>>,
}

impl InMemoryBridgeDomainTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provision(&self, bd_index: u16, state: BridgeDomainState) {
        self.inner.write().unwrap().insert(bd_index, state);
    }

    pub fn state(&self, bd_index: u16) -> Option<BridgeDomainState> {
        self.inner.read().unwrap().get(&bd_index).copied()
    }
}

impl BridgeDomainTable for InMemoryBridgeDomainTable {
    fn is_valid(&self, bd_index: u16) -> bool {
        self.inner.read().unwrap().contains_key(&bd_index)
    }

    fn seq_num(&self, bd_index: u16) -> Option<u8> {
        self.inner.read().unwrap().get(&bd_index).map(|s| s.seq_num)
    }

    fn bump_seq_num(&self, bd_index: u16) {
        if let Some(s) = self.inner.write().unwrap().get_mut(&bd_index) {
            s.seq_num = s.seq_num.wrapping_add(1);
        }
    }

    fn mac_age(&self, bd_index: u16) -> Option<u8> {
        self.inner.read().unwrap().get(&bd_index).map(|s| s.mac_age)
    }

    fn learn_count(&self, bd_index: u16) -> u32 {
        self.inner.read().unwrap().get(&bd_index).map(|s| s.learn_count).unwrap_or(0)
    }

    fn set_learn_count(&self, bd_index: u16, count: u32) {
        if let Some(s) = self.inner.write().unwrap().get_mut(&bd_index) {
            s.learn_count = count;
        }
    }

    fn learn_limit(&self, bd_index: u16) -> Option<u32> {
        self.inner.read().unwrap().get(&bd_index).map(|s| s.learn_limit)
    }

    fn valid_bd_indices(&self) -> Vec<u16> {
        self.inner.read().unwrap().keys().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceState {
    pub input_seq_num: u8,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

#[derive(Default)]
pub struct InMemoryInterfaceTable {
    inner: RwLock<HashMap<u32, InterfaceState>>,
}

impl InMemoryInterfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provision(&self, sw_if_index: u32, state: InterfaceState) {
        self.inner.write().unwrap().insert(sw_if_index, state);
    }
}

impl super::InterfaceTable for InMemoryInterfaceTable {
    fn input_seq_num(&self, sw_if_index: u32) -> Option<u8> {
        self.inner.read().unwrap().get(&sw_if_index).map(|s| s.input_seq_num)
    }

    fn bump_input_seq_num(&self, sw_if_index: u32) {
        if let Some(s) = self.inner.write().unwrap().get_mut(&sw_if_index) {
            s.input_seq_num = s.input_seq_num.wrapping_add(1);
        }
    }

    fn first_ipv4(&self, sw_if_index: u32) -> Option<Ipv4Addr> {
        self.inner.read().unwrap().get(&sw_if_index).and_then(|s| s.ipv4)
    }

    fn first_ipv6(&self, sw_if_index: u32) -> Option<Ipv6Addr> {
        self.inner.read().unwrap().get(&sw_if_index).and_then(|s| s.ipv6)
    }
}

/// A FIB double that resolves every destination in `routes` to a fixed
/// interface and nothing else.
#[derive(Default)]
pub struct InMemoryFibLookup {
    routes: RwLock<HashMap<(u32, IpAddr), u32>>,
}

impl InMemoryFibLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&self, fib_index: u32, dst: IpAddr, sw_if_index: u32) {
        self.routes.write().unwrap().insert((fib_index, dst), sw_if_index);
    }
}

impl FibLookup for InMemoryFibLookup {
    fn resolve(&self, fib_index: u32, dst: IpAddr) -> Option<u32> {
        self.routes.read().unwrap().get(&(fib_index, dst)).copied()
    }
}

/// A 6-tuple predicate double backed by an explicit set of tuples the test
/// considers already in use.
#[derive(Default)]
pub struct InMemorySessionLookup6Tuple {
    tuples: RwLock<std::collections::HashSet<(u32, IpAddr, IpAddr, u16, u16, u8)>>,
}

impl InMemorySessionLookup6Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mark_in_use(
        &self,
        fib_index: u32,
        local_ip: IpAddr,
        remote_ip: IpAddr,
        local_port: u16,
        remote_port: u16,
        proto: u8,
    ) {
        self.tuples.write().unwrap().insert((fib_index, local_ip, remote_ip, local_port, remote_port, proto));
    }
}

impl SessionLookup6Tuple for InMemorySessionLookup6Tuple {
    fn exists(
        &self,
        fib_index: u32,
        local_ip: IpAddr,
        remote_ip: IpAddr,
        local_port: u16,
        remote_port: u16,
        proto: u8,
    ) -> bool {
        self.tuples.read().unwrap().contains(&(fib_index, local_ip, remote_ip, local_port, remote_port, proto))
    }
}

/// Records every `enable`/`disable` call instead of acting on a real
/// forwarding graph.
#[derive(Default)]
pub struct RecordingFeatureGraph {
    calls: Mutex<Vec<(u32, String, String, Direction, bool)>>,
}

impl RecordingFeatureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(u32, String, String, Direction, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl FeatureGraph for RecordingFeatureGraph {
    fn enable(&self, sw_if_index: u32, arc: &str, feature: &str, dir: Direction) {
        self.calls.lock().unwrap().push((sw_if_index, arc.to_string(), feature.to_string(), dir, true));
    }

    fn disable(&self, sw_if_index: u32, arc: &str, feature: &str, dir: Direction) {
        self.calls.lock().unwrap().push((sw_if_index, arc.to_string(), feature.to_string(), dir, false));
    }
}

/// Collects every batch published to it. An optional `capacity` simulates a
/// bounded event queue: once the total number of buffered events would
/// exceed it, `publish` starts returning `false`.
#[derive(Default)]
pub struct RecordingMacEventClient {
    capacity: Option<usize>,
    batches: Mutex<Vec<Vec<MacEvent>>>,
}

impl RecordingMacEventClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: Some(capacity), batches: Mutex::new(Vec::new()) }
    }

    pub fn batches(&self) -> Vec<Vec<MacEvent>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<MacEvent> {
        self.batches.lock().unwrap().iter().flatten().copied().collect()
    }
}

impl MacEventClient for RecordingMacEventClient {
    fn publish(&self, batch: Vec<MacEvent>) -> bool {
        let mut batches = self.batches.lock().unwrap();
        let buffered: usize = batches.iter().map(Vec::len).sum();
        if let Some(cap) = self.capacity {
            if buffered + batch.len() > cap {
                return false;
            }
        }
        batches.push(batch);
        true
    }
}
