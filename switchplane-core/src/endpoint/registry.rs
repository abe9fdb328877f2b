use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use ahash::AHashMap;
use tokio::sync::Notify;

use crate::error::{DataplaneError, Result};
use crate::telemetry::Metrics;

use super::key::EndpointKey;

/// Freelist entries beyond this count trigger a cleanup request rather
/// than accumulating indefinitely — spec.md §4.3, grounded on the
/// original's `vec_len (tm->lcl_endpts_freelist) > 32` threshold.
const CLEANUP_THRESHOLD: usize = 32;

#[derive(Debug)]
pub struct EndpointDescriptor {
    pub key: EndpointKey,
    pub refcnt: AtomicU32,
}

/// Shared `(proto, fib, ip, port) -> refcounted descriptor` table, plus the
/// spinlock-protected freelist and "cleanup pending" flag from spec.md
/// §4.3. The spinlock is rendered as a plain `Mutex<Vec<u32>>`: the
/// critical section it protects is a handful of `Vec` operations, short
/// enough that a mutex's fairness and no-unsafe-code guarantees win over a
/// hand-rolled spinlock.
pub struct EndpointRegistry {
    index: RwLock<AHashMap<EndpointKey, u32>>,
    pool: RwLock<Vec<Option<Arc<EndpointDescriptor>>>>,
    free_slots: Mutex<Vec<u32>>,
    pending_free: Mutex<Vec<u32>>,
    cleanup_pending: AtomicBool,
    pub(crate) cleanup_needed: Notify,
    metrics: Option<Arc<Metrics>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(AHashMap::new()),
            pool: RwLock::new(Vec::new()),
            free_slots: Mutex::new(Vec::new()),
            pending_free: Mutex::new(Vec::new()),
            cleanup_pending: AtomicBool::new(false),
            cleanup_needed: Notify::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn lookup(&self, key: &EndpointKey) -> Option<Arc<EndpointDescriptor>> {
        let index_guard = self.index.read().unwrap();
        let slot_index = *index_guard.get(key)?;
        drop(index_guard);
        self.pool.read().unwrap().get(slot_index as usize).and_then(Clone::clone)
    }

    /// Must be called only on the control thread. Fails `InUse` if the key
    /// is already reserved; otherwise allocates a descriptor with
    /// `refcnt = 1` and inserts it.
    pub fn mark_used(&self, key: EndpointKey) -> Result<u32> {
        let mut index_guard = self.index.write().unwrap();
        if index_guard.contains_key(&key) {
            return Err(DataplaneError::InUse);
        }

        let descriptor = Arc::new(EndpointDescriptor { key, refcnt: AtomicU32::new(1) });
        let mut pool = self.pool.write().unwrap();
        let slot_index = if let Some(free) = self.free_slots.lock().unwrap().pop() {
            pool[free as usize] = Some(descriptor);
            free
        } else {
            let idx = pool.len() as u32;
            pool.push(Some(descriptor));
            idx
        };
        drop(pool);

        index_guard.insert(key, slot_index);
        if let Some(m) = &self.metrics {
            m.endpoint_entries.add(1, &[]);
            m.endpoint_allocations_total.add(1, &[]);
        }
        Ok(slot_index)
    }

    /// Looks up `key` and atomically increments its `refcnt`. Safe to call
    /// from any thread: read-only on the pool, RMW on the integer.
    pub fn share(&self, key: &EndpointKey) -> Result<()> {
        let descriptor = self.lookup(key).ok_or(DataplaneError::NotFound)?;
        descriptor.refcnt.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Atomically decrements `refcnt`. Pushes the slot onto the freelist
    /// once it reaches zero, requesting cleanup once the freelist grows
    /// past [`CLEANUP_THRESHOLD`] and a request is not already pending.
    pub fn release(&self, key: &EndpointKey) -> Result<()> {
        let index_guard = self.index.read().unwrap();
        let slot_index = *index_guard.get(key).ok_or(DataplaneError::NotFound)?;
        drop(index_guard);

        let descriptor = self
            .pool
            .read()
            .unwrap()
            .get(slot_index as usize)
            .and_then(Clone::clone)
            .ok_or(DataplaneError::NotFound)?;

        let prev = descriptor
            .refcnt
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| if c > 0 { Some(c - 1) } else { None });
        let Ok(prev) = prev else {
            return Err(DataplaneError::Busy);
        };

        if prev == 1 {
            let mut pending = self.pending_free.lock().unwrap();
            pending.push(slot_index);
            let should_schedule =
                pending.len() > CLEANUP_THRESHOLD && !self.cleanup_pending.swap(true, Ordering::AcqRel);
            drop(pending);
            if should_schedule {
                self.cleanup_needed.notify_one();
            }
        }
        Ok(())
    }

    /// Control-thread only. Re-checks `refcnt == 0` under the freelist
    /// lock (a sharer may have revived the descriptor since it was queued),
    /// unlinks genuinely dead entries from the index, and returns their
    /// slots to the pool.
    pub fn cleanup_freelist(&self) {
        let mut pending = self.pending_free.lock().unwrap();
        let drained = std::mem::take(&mut *pending);
        self.cleanup_pending.store(false, Ordering::Release);
        drop(pending);

        let mut reclaimed = 0i64;
        for slot_index in drained {
            let descriptor = self.pool.read().unwrap().get(slot_index as usize).and_then(Clone::clone);
            let Some(descriptor) = descriptor else {
                tracing::error!(
                    slot_index,
                    "endpoint freelist cleanup: pending slot has no descriptor, bihash/pool inconsistency"
                );
                debug_assert!(false, "endpoint freelist cleanup: slot {slot_index} has no descriptor");
                continue;
            };
            if descriptor.refcnt.load(Ordering::Acquire) != 0 {
                tracing::warn!(
                    slot_index,
                    "endpoint freelist cleanup: descriptor revived by a sharer before unlink, skipping"
                );
                continue;
            }

            self.index.write().unwrap().remove(&descriptor.key);
            self.pool.write().unwrap()[slot_index as usize] = None;
            self.free_slots.lock().unwrap().push(slot_index);
            reclaimed += 1;
        }

        if reclaimed > 0 {
            if let Some(m) = &self.metrics {
                m.endpoint_entries.add(-reclaimed, &[]);
            }
        }
    }

    pub fn port_local_in_use(&self) -> usize {
        self.pool.read().unwrap().iter().filter(|s| s.is_some()).count()
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
