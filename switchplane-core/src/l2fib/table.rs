use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use tokio::sync::Notify;

use crate::collab::{BridgeDomainTable, InterfaceTable};
use crate::config::L2FibConfig;
use crate::error::{DataplaneError, Result};
use crate::telemetry::Metrics;

use super::key::{composite_sn, EntryFlags, L2FibKey, L2FibValue, SW_IF_INDEX_INVALID};

const MAX_SHARDS: usize = 64;

/// Bytes a single packed (key, value) pair occupies — spec.md §3.1's
/// 64-bit key plus 64-bit value. `table_size` (spec.md §6) divided by this
/// is the entry budget enforced before any new key is admitted.
const PACKED_KV_BYTES: u64 = 16;

fn shard_index(key: L2FibKey, shard_count: usize) -> usize {
    let mut x = key.as_u64();
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    (x as usize) % shard_count
}

pub(crate) type Shard = RwLock<AHashMap<L2FibKey, AtomicU64>>;

/// Concurrent MAC-address table: a sharded `RwLock<AHashMap>` substitutes
/// for the bucketized bihash, with per-key reads and updates still going
/// through a single `AtomicU64`, so the 16-byte (key, value) pair a reader
/// observes is always either fully pre- or fully post-update.
pub struct L2FibTable {
    shards: Vec<Shard>,
    global_learn_count: AtomicU32,
    entry_count: AtomicU64,
    max_entries: u64,
    bd_table: Arc<dyn BridgeDomainTable>,
    if_table: Arc<dyn InterfaceTable>,
    pub(crate) ager_wake: Notify,
    metrics: Option<Arc<Metrics>>,
}

impl L2FibTable {
    pub fn new(
        cfg: &L2FibConfig,
        bd_table: Arc<dyn BridgeDomainTable>,
        if_table: Arc<dyn InterfaceTable>,
    ) -> Self {
        let shard_count = (cfg.num_buckets as usize).clamp(1, MAX_SHARDS);
        let per_shard_capacity = ((cfg.num_buckets as usize) / shard_count).max(1);
        let shards =
            (0..shard_count).map(|_| RwLock::new(AHashMap::with_capacity(per_shard_capacity))).collect();
        Self {
            shards,
            global_learn_count: AtomicU32::new(0),
            entry_count: AtomicU64::new(0),
            max_entries: (cfg.table_size / PACKED_KV_BYTES).max(1),
            bd_table,
            if_table,
            ager_wake: Notify::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn global_learn_count(&self) -> u32 {
        self.global_learn_count.load(Ordering::Acquire)
    }

    fn shard(&self, key: L2FibKey) -> &Shard {
        &self.shards[shard_index(key, self.shards.len())]
    }

    pub(crate) fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub(crate) fn shard_by_index(&self, idx: usize) -> &Shard {
        &self.shards[idx]
    }

    pub(crate) fn bd_table(&self) -> &Arc<dyn BridgeDomainTable> {
        &self.bd_table
    }

    pub(crate) fn if_table(&self) -> &Arc<dyn InterfaceTable> {
        &self.if_table
    }

    pub(crate) fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    pub(crate) fn set_global_learn_count(&self, count: u32) {
        self.global_learn_count.store(count, Ordering::Release);
    }

    fn current_sn(&self, bd_index: u16, sw_if_index: u32) -> u16 {
        let bd_seq = self.bd_table.seq_num(bd_index).unwrap_or(0);
        let if_seq = self.if_table.input_seq_num(sw_if_index).unwrap_or(0);
        composite_sn(bd_seq, if_seq)
    }

    /// Reserves room for one new key against the `table_size` memory
    /// budget. Only called when a shard lookup has already established the
    /// insert is for a genuinely new key, never for an in-place overwrite —
    /// spec.md §4.1's "no forwarding state corruption" holds because a
    /// rejected reservation leaves the shard untouched.
    fn try_reserve_one(&self) -> Result<()> {
        self.entry_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| if c < self.max_entries { Some(c + 1) } else { None })
            .map(|_| ())
            .map_err(|_| {
                tracing::warn!(
                    max_entries = self.max_entries,
                    "L2-FIB table_size budget exhausted, rejecting new entry"
                );
                DataplaneError::ResourceExhausted
            })
    }

    fn release_one(&self) {
        let _ = self.entry_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
    }

    /// Releases capacity for `n` keys the ager removed in one scan pass.
    pub(crate) fn release_many(&self, n: u64) {
        if n == 0 {
            return;
        }
        let _ = self.entry_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(n));
    }

    fn decrement_learn_count(&self, bd_index: u16) {
        let _ = self.global_learn_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
            if c > 0 {
                Some(c - 1)
            } else {
                None
            }
        });
        let bd_count = self.bd_table.learn_count(bd_index);
        if bd_count > 0 {
            self.bd_table.set_learn_count(bd_index, bd_count - 1);
        }
    }

    /// Explicit provisioning. Overwrites are allowed and idempotent; if the
    /// entry being replaced was previously learned (not `AGE_NOT`), the
    /// global and bridge-domain learn counts are decremented first.
    /// Provisioned entries never age.
    pub fn add(&self, mac: [u8; 6], bd_index: u16, sw_if_index: u32, flags: EntryFlags, now_min: u8) -> Result<()> {
        let key = L2FibKey::new(mac, bd_index);
        let sn = self.current_sn(bd_index, sw_if_index);
        let value = L2FibValue::new(sw_if_index, flags | EntryFlags::AGE_NOT, sn, now_min);

        let shard = self.shard(key);
        let mut guard = shard.write().unwrap();
        match guard.get(&key) {
            Some(existing) => {
                let prev = L2FibValue::from_u64(existing.load(Ordering::Acquire));
                if !prev.flags().contains(EntryFlags::AGE_NOT) {
                    self.decrement_learn_count(bd_index);
                }
                existing.store(value.as_u64(), Ordering::Release);
            }
            None => {
                self.try_reserve_one()?;
                guard.insert(key, AtomicU64::new(value.as_u64()));
                if let Some(m) = &self.metrics {
                    m.l2fib_entries.add(1, &[]);
                }
            }
        }
        Ok(())
    }

    pub fn add_filter(&self, mac: [u8; 6], bd_index: u16, now_min: u8) -> Result<()> {
        self.add(mac, bd_index, SW_IF_INDEX_INVALID, EntryFlags::STATIC | EntryFlags::FILTER, now_min)
    }

    /// Forwarding fast-path insert/refresh. Unlike `add`, this does not set
    /// `AGE_NOT` — the entry remains subject to aging — and marks the entry
    /// for a learn event, flagging `LEARN_MOVED` when the interface changed.
    pub fn learn(&self, mac: [u8; 6], bd_index: u16, sw_if_index: u32, now_min: u8) -> Result<()> {
        let key = L2FibKey::new(mac, bd_index);
        let sn = self.current_sn(bd_index, sw_if_index);

        let shard = self.shard(key);
        let mut guard = shard.write().unwrap();
        let existing = guard.get(&key);
        let is_new = existing.is_none();
        let moved = existing
            .map(|v| L2FibValue::from_u64(v.load(Ordering::Acquire)).sw_if_index() != sw_if_index)
            .unwrap_or(false);

        if is_new {
            self.try_reserve_one()?;
        }

        let mut flags = EntryFlags::LEARN_EVENT_PENDING;
        if moved {
            flags.insert(EntryFlags::LEARN_MOVED);
        }
        let value = L2FibValue::new(sw_if_index, flags, sn, now_min);

        match guard.get(&key) {
            Some(existing) => existing.store(value.as_u64(), Ordering::Release),
            None => {
                guard.insert(key, AtomicU64::new(value.as_u64()));
            }
        }
        drop(guard);

        if is_new {
            self.global_learn_count.fetch_add(1, Ordering::AcqRel);
            let bd_count = self.bd_table.learn_count(bd_index);
            self.bd_table.set_learn_count(bd_index, bd_count + 1);
            if let Some(m) = &self.metrics {
                m.l2fib_entries.add(1, &[]);
            }
        }
        if let Some(m) = &self.metrics {
            m.l2fib_learns_total.add(1, &[]);
        }
        Ok(())
    }

    pub fn del(&self, mac: [u8; 6], bd_index: u16, expected_if: u32) -> Result<()> {
        let key = L2FibKey::new(mac, bd_index);
        let shard = self.shard(key);
        let mut guard = shard.write().unwrap();

        let existing = guard.get(&key).ok_or(DataplaneError::NotFound)?;
        let value = L2FibValue::from_u64(existing.load(Ordering::Acquire));
        if expected_if != 0 && expected_if != value.sw_if_index() {
            return Err(DataplaneError::Mismatch);
        }
        let was_learned = !value.flags().contains(EntryFlags::AGE_NOT);
        guard.remove(&key);
        drop(guard);

        self.release_one();
        if was_learned {
            self.decrement_learn_count(bd_index);
        }
        if let Some(m) = &self.metrics {
            m.l2fib_entries.add(-1, &[]);
        }
        Ok(())
    }

    pub fn lookup(&self, mac: [u8; 6], bd_index: u16) -> Option<L2FibValue> {
        let key = L2FibKey::new(mac, bd_index);
        let guard = self.shard(key).read().unwrap();
        guard.get(&key).map(|v| L2FibValue::from_u64(v.load(Ordering::Acquire)))
    }

    pub fn flush_interface(&self, sw_if_index: u32) {
        self.if_table.bump_input_seq_num(sw_if_index);
        self.ager_wake.notify_one();
        if let Some(m) = &self.metrics {
            m.l2fib_flushes_total.add(1, &[]);
        }
    }

    pub fn flush_bridge(&self, bd_index: u16) {
        self.bd_table.bump_seq_num(bd_index);
        self.ager_wake.notify_one();
        if let Some(m) = &self.metrics {
            m.l2fib_flushes_total.add(1, &[]);
        }
    }

    pub fn flush_all(&self) {
        for bd_index in self.bd_table.valid_bd_indices() {
            self.bd_table.bump_seq_num(bd_index);
        }
        self.ager_wake.notify_one();
        if let Some(m) = &self.metrics {
            m.l2fib_flushes_total.add(1, &[]);
        }
    }

    pub fn clear(&self) {
        let mut removed: i64 = 0;
        for shard in &self.shards {
            let mut guard = shard.write().unwrap();
            removed += guard.len() as i64;
            guard.clear();
        }
        self.entry_count.store(0, Ordering::Release);
        self.global_learn_count.store(0, Ordering::Release);
        for bd_index in self.bd_table.valid_bd_indices() {
            self.bd_table.set_learn_count(bd_index, 0);
        }
        if removed > 0 {
            if let Some(m) = &self.metrics {
                m.l2fib_entries.add(-removed, &[]);
            }
        }
    }

    pub fn dump(&self, bd_index: Option<u16>) -> Vec<(L2FibKey, L2FibValue)> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let guard = shard.read().unwrap();
            for (key, value) in guard.iter() {
                let matches_bd = match bd_index {
                    Some(bd) => bd == key.bd_index(),
                    None => true,
                };
                if matches_bd {
                    out.push((*key, L2FibValue::from_u64(value.load(Ordering::Acquire))));
                }
            }
        }
        out
    }
}
