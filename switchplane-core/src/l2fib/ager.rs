use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::collab::{MacEvent, MacEventAction, MacEventClient};

use super::bridge_domain::BridgeDomainConfig;
use super::key::{composite_sn, EntryFlags, L2FibValue};
use super::table::L2FibTable;

const YIELD_EVERY: Duration = Duration::from_micros(20);
const YIELD_FOR: Duration = Duration::from_micros(100);
const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_MACS_IN_EVENT: usize = 128;

/// Background scanner for a single [`L2FibTable`]. Runs as a cooperative
/// task: it never holds a shard lock across an await point, and yields
/// roughly every 20us of wall time spent scanning so it never starves the
/// forwarding workers sharing the same runtime.
pub struct MacAger {
    table: Arc<L2FibTable>,
    event_client: Option<Arc<dyn MacEventClient>>,
    max_macs_in_event: usize,
    scan_interval: Duration,
    event_only: AtomicBool,
}

impl MacAger {
    pub fn new(table: Arc<L2FibTable>) -> Self {
        Self {
            table,
            event_client: None,
            max_macs_in_event: DEFAULT_MAX_MACS_IN_EVENT,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            event_only: AtomicBool::new(false),
        }
    }

    pub fn with_event_client(mut self, client: Arc<dyn MacEventClient>) -> Self {
        self.event_client = Some(client);
        self
    }

    pub fn with_max_macs_in_event(mut self, max: usize) -> Self {
        self.max_macs_in_event = max;
        self
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn set_event_only(&self, value: bool) {
        self.event_only.store(value, Ordering::Relaxed);
    }

    /// Runs scans forever, waking on either the table's explicit flush
    /// notifications or the periodic timer. `now_min` supplies the coarse
    /// minutes-mod-256 clock; this crate owns no clock of its own.
    pub async fn run(&self, now_min: impl Fn() -> u8) -> ! {
        loop {
            tokio::select! {
                _ = self.table.ager_wake.notified() => {}
                _ = tokio::time::sleep(self.scan_interval) => {}
            }
            self.scan(now_min()).await;
        }
    }

    /// Runs exactly one pass over every shard. Public so tests can drive
    /// aging deterministically without waiting on the timer.
    pub async fn scan(&self, now_min: u8) {
        let mut global_tally: u32 = 0;
        let mut bd_tallies: AHashMap<u16, u32> = AHashMap::new();
        let mut event_batch: Vec<MacEvent> = Vec::new();
        let mut last_pause = Instant::now();
        let event_only = self.event_only.load(Ordering::Relaxed);

        for shard_idx in 0..self.table.shard_count() {
            let mut aged = 0u64;
            {
                let mut guard = self.table.shard_by_index(shard_idx).write().unwrap();
                let mut to_delete = Vec::new();

                for (key, cell) in guard.iter() {
                    let value = L2FibValue::from_u64(cell.load(Ordering::Acquire));
                    let bd_index = key.bd_index();
                    let flags = value.flags();

                    if !flags.contains(EntryFlags::AGE_NOT) {
                        global_tally += 1;
                        *bd_tallies.entry(bd_index).or_insert(0) += 1;
                    }

                    // spec.md §4.1 step 2: the clear-and-skip only applies when a
                    // client is actually subscribed to receive the event; with no
                    // client there is nothing to settle, so the entry falls straight
                    // through to the same pass's staleness/age checks below.
                    if flags.contains(EntryFlags::LEARN_EVENT_PENDING) && self.event_client.is_some() {
                        let action = if flags.contains(EntryFlags::LEARN_MOVED) {
                            MacEventAction::Move
                        } else {
                            MacEventAction::Add
                        };
                        event_batch.push(MacEvent {
                            mac: key.mac(),
                            bd_index,
                            sw_if_index: value.sw_if_index(),
                            action,
                        });
                        let mut cleared = flags;
                        cleared.remove(EntryFlags::LEARN_EVENT_PENDING);
                        cleared.remove(EntryFlags::LEARN_MOVED);
                        cell.store(value.with_flags(cleared).as_u64(), Ordering::Release);
                        continue;
                    }

                    if event_only || flags.contains(EntryFlags::AGE_NOT) {
                        continue;
                    }

                    let bd = BridgeDomainConfig::snapshot(self.table.bd_table().as_ref(), bd_index);
                    let current_sn = composite_sn(
                        bd.map(|b| b.seq_num).unwrap_or(0),
                        self.table.if_table().input_seq_num(value.sw_if_index()).unwrap_or(0),
                    );
                    let stale = current_sn != value.sn();

                    let should_age = if stale {
                        true
                    } else {
                        let mac_age = bd.map(|b| b.mac_age).unwrap_or(0);
                        if mac_age == 0 {
                            false
                        } else {
                            let delta = now_min.wrapping_sub(value.timestamp());
                            delta >= mac_age
                        }
                    };

                    if should_age {
                        if self.event_client.is_some() {
                            event_batch.push(MacEvent {
                                mac: key.mac(),
                                bd_index,
                                sw_if_index: value.sw_if_index(),
                                action: MacEventAction::Delete,
                            });
                        }
                        to_delete.push(*key);
                        global_tally -= 1;
                        if let Some(count) = bd_tallies.get_mut(&bd_index) {
                            *count -= 1;
                        }
                    }
                }

                aged = to_delete.len() as u64;
                for key in &to_delete {
                    guard.remove(key);
                }
            }

            if aged > 0 {
                self.table.release_many(aged);
                if let Some(m) = self.table.metrics() {
                    m.l2fib_ages_total.add(aged, &[]);
                    m.l2fib_entries.add(-(aged as i64), &[]);
                }
            }

            if event_batch.len() >= self.max_macs_in_event {
                self.flush_events(&mut event_batch);
            }

            if last_pause.elapsed() >= YIELD_EVERY {
                tokio::time::sleep(YIELD_FOR).await;
                last_pause = Instant::now();
            }
        }

        self.flush_events(&mut event_batch);

        self.table.set_global_learn_count(global_tally);
        for bd_index in self.table.bd_table().valid_bd_indices() {
            let count = bd_tallies.get(&bd_index).copied().unwrap_or(0);
            self.table.bd_table().set_learn_count(bd_index, count);
        }
    }

    fn flush_events(&self, batch: &mut Vec<MacEvent>) {
        if batch.is_empty() {
            return;
        }
        let Some(client) = &self.event_client else {
            batch.clear();
            return;
        };
        let to_send = std::mem::take(batch);
        let count = to_send.len();
        if !client.publish(to_send) {
            tracing::warn!(count, "L2-FIB ager: event subscriber queue full, dropping MAC event batch");
        }
    }
}
