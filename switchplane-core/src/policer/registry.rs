use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use ahash::AHashMap;

use crate::collab::{Direction, FeatureGraph};
use crate::error::{DataplaneError, Result};
use crate::telemetry::Metrics;

use super::config::{to_runtime, PolicerConfig, PolicerRuntime};

#[derive(Debug, Default)]
struct PolicerCounters {
    conform: (AtomicU64, AtomicU64),
    exceed: (AtomicU64, AtomicU64),
    violate: (AtomicU64, AtomicU64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicerCounterSnapshot {
    pub conform: CounterSnapshot,
    pub exceed: CounterSnapshot,
    pub violate: CounterSnapshot,
}

/// A single packet's policing verdict, produced by a policer's own
/// hot-path node. Classifying a packet is out of scope here — this enum is
/// only the shape `PolicerRegistry::record` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Conform,
    Exceed,
    Violate,
}

struct PolicerSlot {
    name: String,
    config: PolicerConfig,
    runtime: PolicerRuntime,
    thread_index: Option<u32>,
    counters: PolicerCounters,
}

/// Named token-bucket registry: a dense pool of policers/configs, a
/// name index, and the `policer_index_by_sw_if_index[dir]` interface
/// bindings — spec.md §4.2.
pub struct PolicerRegistry {
    policers: RwLock<Vec<Option<PolicerSlot>>>,
    free_slots: Mutex<Vec<u32>>,
    index_by_name: RwLock<AHashMap<String, u32>>,
    bound_by_sw_if: [RwLock<AHashMap<u32, u32>>; 2],
    feature_graph: Option<Arc<dyn FeatureGraph>>,
    metrics: Option<Arc<Metrics>>,
    num_workers: u32,
}

impl PolicerRegistry {
    pub fn new(num_workers: u32) -> Self {
        Self {
            policers: RwLock::new(Vec::new()),
            free_slots: Mutex::new(Vec::new()),
            index_by_name: RwLock::new(AHashMap::new()),
            bound_by_sw_if: [RwLock::new(AHashMap::new()), RwLock::new(AHashMap::new())],
            feature_graph: None,
            metrics: None,
            num_workers,
        }
    }

    pub fn with_feature_graph(mut self, graph: Arc<dyn FeatureGraph>) -> Self {
        self.feature_graph = Some(graph);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn add(&self, name: &str, cfg: PolicerConfig) -> Result<u32> {
        if self.index_by_name.read().unwrap().contains_key(name) {
            return Err(DataplaneError::Exists);
        }
        let runtime = to_runtime(&cfg)?;

        let slot = PolicerSlot {
            name: name.to_string(),
            config: cfg,
            runtime,
            thread_index: None,
            counters: PolicerCounters::default(),
        };

        let mut policers = self.policers.write().unwrap();
        let index = if let Some(index) = self.free_slots.lock().unwrap().pop() {
            policers[index as usize] = Some(slot);
            index
        } else {
            let index = policers.len() as u32;
            policers.push(Some(slot));
            index
        };
        drop(policers);

        self.index_by_name.write().unwrap().insert(name.to_string(), index);
        Ok(index)
    }

    pub fn update(&self, index: u32, cfg: PolicerConfig) -> Result<()> {
        let runtime = to_runtime(&cfg)?;
        let mut policers = self.policers.write().unwrap();
        let slot = policers
            .get_mut(index as usize)
            .and_then(Option::as_mut)
            .ok_or(DataplaneError::NotFound)?;
        slot.config = cfg;
        slot.runtime = runtime;
        slot.thread_index = None;
        slot.counters = PolicerCounters::default();
        Ok(())
    }

    pub fn del(&self, index: u32) -> Result<()> {
        let mut policers = self.policers.write().unwrap();
        let slot = policers.get_mut(index as usize).and_then(Option::take).ok_or(DataplaneError::NotFound)?;
        drop(policers);
        self.index_by_name.write().unwrap().remove(&slot.name);
        self.free_slots.lock().unwrap().push(index);
        Ok(())
    }

    pub fn reset(&self, index: u32) -> Result<()> {
        let mut policers = self.policers.write().unwrap();
        let slot = policers.get_mut(index as usize).and_then(Option::as_mut).ok_or(DataplaneError::NotFound)?;
        slot.runtime.current_bucket = slot.runtime.current_limit;
        slot.runtime.extended_bucket = slot.runtime.extended_limit;
        Ok(())
    }

    pub fn bind(&self, index: u32, worker: u32, bind: bool) -> Result<()> {
        let mut policers = self.policers.write().unwrap();
        let slot = policers.get_mut(index as usize).and_then(Option::as_mut).ok_or(DataplaneError::NotFound)?;
        if bind {
            if worker >= self.num_workers {
                return Err(DataplaneError::WorkerInvalid);
            }
            slot.thread_index = Some(worker);
        } else {
            slot.thread_index = None;
        }
        Ok(())
    }

    pub fn thread_index(&self, index: u32) -> Result<Option<u32>> {
        let policers = self.policers.read().unwrap();
        policers.get(index as usize).and_then(Option::as_ref).map(|s| s.thread_index).ok_or(DataplaneError::NotFound)
    }

    /// Binds or unbinds a policer to an interface in a direction, enabling
    /// "policer-input" on the `device-input` arc for RX, or "policer-output"
    /// on both the `ip4-output` and `ip6-output` arcs for TX — the original's
    /// `policer_input` makes exactly these two calls for TX since a bound
    /// interface may carry both address families (spec.md line 97).
    pub fn input(&self, index: u32, sw_if_index: u32, dir: Direction, apply: bool) -> Result<()> {
        if !self.exists(index) {
            return Err(DataplaneError::NotFound);
        }
        let mut bound = self.bound_by_sw_if[dir.index()].write().unwrap();
        if apply {
            bound.insert(sw_if_index, index);
        } else {
            bound.remove(&sw_if_index);
        }
        drop(bound);

        if let Some(graph) = &self.feature_graph {
            let arcs: &[&str] = match dir {
                Direction::Rx => &["device-input"],
                Direction::Tx => &["ip4-output", "ip6-output"],
            };
            let feature = match dir {
                Direction::Rx => "policer-input",
                Direction::Tx => "policer-output",
            };
            for arc in arcs {
                if apply {
                    graph.enable(sw_if_index, arc, feature, dir);
                } else {
                    graph.disable(sw_if_index, arc, feature, dir);
                }
            }
        }
        Ok(())
    }

    pub fn bound_policer(&self, sw_if_index: u32, dir: Direction) -> Option<u32> {
        self.bound_by_sw_if[dir.index()].read().unwrap().get(&sw_if_index).copied()
    }

    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.index_by_name.read().unwrap().get(name).copied()
    }

    fn exists(&self, index: u32) -> bool {
        self.policers.read().unwrap().get(index as usize).map(Option::is_some).unwrap_or(false)
    }

    pub fn runtime(&self, index: u32) -> Result<PolicerRuntime> {
        self.policers
            .read()
            .unwrap()
            .get(index as usize)
            .and_then(Option::as_ref)
            .map(|s| s.runtime)
            .ok_or(DataplaneError::NotFound)
    }

    /// Records one packet's policing verdict against the combined
    /// conform/exceed/violate counters for `index` (spec.md §3.3, §4.2).
    pub fn record(&self, index: u32, verdict: Verdict, bytes: u64) -> Result<()> {
        let policers = self.policers.read().unwrap();
        let slot = policers.get(index as usize).and_then(Option::as_ref).ok_or(DataplaneError::NotFound)?;
        let (packets_ctr, bytes_ctr) = match verdict {
            Verdict::Conform => (&slot.counters.conform.0, &slot.counters.conform.1),
            Verdict::Exceed => (&slot.counters.exceed.0, &slot.counters.exceed.1),
            Verdict::Violate => (&slot.counters.violate.0, &slot.counters.violate.1),
        };
        packets_ctr.fetch_add(1, Ordering::Relaxed);
        bytes_ctr.fetch_add(bytes, Ordering::Relaxed);

        if let Some(m) = &self.metrics {
            let attrs = [opentelemetry::KeyValue::new("policer", slot.name.clone())];
            match verdict {
                Verdict::Conform => m.policer_conform_total.add(1, &attrs),
                Verdict::Exceed => m.policer_exceed_total.add(1, &attrs),
                Verdict::Violate => m.policer_violate_total.add(1, &attrs),
            }
        }
        Ok(())
    }

    pub fn counters(&self, index: u32) -> Result<PolicerCounterSnapshot> {
        let policers = self.policers.read().unwrap();
        let slot = policers.get(index as usize).and_then(Option::as_ref).ok_or(DataplaneError::NotFound)?;
        Ok(PolicerCounterSnapshot {
            conform: CounterSnapshot {
                packets: slot.counters.conform.0.load(Ordering::Relaxed),
                bytes: slot.counters.conform.1.load(Ordering::Relaxed),
            },
            exceed: CounterSnapshot {
                packets: slot.counters.exceed.0.load(Ordering::Relaxed),
                bytes: slot.counters.exceed.1.load(Ordering::Relaxed),
            },
            violate: CounterSnapshot {
                packets: slot.counters.violate.0.load(Ordering::Relaxed),
                bytes: slot.counters.violate.1.load(Ordering::Relaxed),
            },
        })
    }
}
