use crate::telemetry::Metrics;
use std::sync::Arc;

/// Floor and ceiling on `max_burst` — spec.md §3.5, named after the
/// original's `TRANSPORT_PACER_MIN_BURST`/`TRANSPORT_PACER_MAX_BURST`.
pub const PACER_MIN_BURST: u32 = 1_350;
pub const PACER_MAX_BURST: u32 = 8 * 1024 * 1024;

/// How many bursts should fit in a single RTT — spec.md §4.4, named after
/// `TRANSPORT_PACER_BURSTS_PER_RTT`.
pub const PACER_BURSTS_PER_RTT: u64 = 4;

/// Default floor under `rtt / PACER_BURSTS_PER_RTT`, standing in for the
/// original's `seconds_per_loop(thread) * CLIB_US_TIME_FREQ` term — this
/// crate owns no scheduler loop of its own, so the floor is a configured
/// constant rather than read from a collaborator. Overridable via
/// [`TxPacer::with_loop_us`].
const DEFAULT_LOOP_US: u64 = 100;

/// Fixed-point scale for `tokens_per_period`, expressed as bytes per
/// microsecond in Q32 — the same fixed-point idiom as
/// `policer::config::SCALE_BITS`, widened because byte rates run higher
/// than the policer's kbps/pps units.
const SCALE: u32 = 32;
const US_TIME_FREQ: u64 = 1_000_000;

/// Bytes currently queued for transmission are owned by the transport
/// connection this pacer is embedded in, which is out of scope here
/// (spec.md §1) — `reschedule` only needs to read that count and ask the
/// scheduler to poll the connection again.
pub trait PacerConnection {
    fn tx_queue_pending_bytes(&self) -> u32;

    fn request_reschedule(&self);

    /// Clears whatever "this connection wants to run" event the scheduler
    /// uses, ahead of the double-check read in [`TxPacer::reschedule`].
    fn clear_event(&self);
}

fn tokens_per_period_for(rate_bps: u64) -> u64 {
    let scaled = (u128::from(rate_bps) << SCALE) / u128::from(US_TIME_FREQ);
    scaled.min(u128::from(u64::MAX)) as u64
}

fn max_burst_for(rate_bps: u64, rtt_us: u64, loop_us: u64) -> u32 {
    let candidate_us = (rtt_us / PACER_BURSTS_PER_RTT).max(loop_us).clamp(1, 1000);
    let bytes = (u128::from(rate_bps) * u128::from(candidate_us)) / u128::from(US_TIME_FREQ);
    (bytes.min(u128::from(u32::MAX)) as u32).clamp(PACER_MIN_BURST, PACER_MAX_BURST)
}

/// Per-connection token-bucket traffic shaper — spec.md §3.5, §4.4. Embedded
/// in (but not owning) a transport connection; `paced()` mirrors the
/// connection's TX-PACED flag.
pub struct TxPacer {
    paced: bool,
    desched: bool,
    tokens_per_period: u64,
    bucket: i64,
    max_burst: u32,
    last_update_us: u64,
    loop_us: u64,
    metrics: Option<Arc<Metrics>>,
}

impl TxPacer {
    pub fn new() -> Self {
        Self {
            paced: false,
            desched: false,
            tokens_per_period: 0,
            bucket: 0,
            max_burst: PACER_MIN_BURST,
            last_update_us: 0,
            loop_us: DEFAULT_LOOP_US,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_loop_us(mut self, loop_us: u64) -> Self {
        self.loop_us = loop_us.max(1);
        self
    }

    pub fn paced(&self) -> bool {
        self.paced
    }

    pub fn bucket(&self) -> i64 {
        self.bucket
    }

    pub fn max_burst(&self) -> u32 {
        self.max_burst
    }

    /// `unpaced -> paced` transition. Sets TX-PACED, the initial rate, and
    /// the starting bucket; `update` must be called afterward with a real
    /// RTT sample before `max_burst` reflects anything but the floor.
    pub fn init(&mut self, rate_bps: u64, initial_bucket: i64, now_us: u64) {
        self.paced = true;
        self.tokens_per_period = tokens_per_period_for(rate_bps);
        self.bucket = initial_bucket.min(i64::from(self.max_burst));
        self.last_update_us = now_us;
        if let Some(m) = &self.metrics {
            m.pacer_updates_total.add(1, &[]);
        }
    }

    /// Recomputes `tokens_per_period` and `max_burst` from a fresh rate/RTT
    /// sample. Does not touch `last_update`; clamps `bucket` down if the new
    /// `max_burst` is smaller than the current bucket, but never raises it.
    pub fn update(&mut self, rate_bps: u64, rtt_us: u64) {
        self.tokens_per_period = tokens_per_period_for(rate_bps);
        self.max_burst = max_burst_for(rate_bps, rtt_us, self.loop_us);
        self.bucket = self.bucket.min(i64::from(self.max_burst));
        if let Some(m) = &self.metrics {
            m.pacer_updates_total.add(1, &[]);
        }
    }

    pub fn reset(&mut self, rate_bps: u64, start_bucket: i64, rtt_us: u64, now_us: u64) {
        self.update(rate_bps, rtt_us);
        self.last_update_us = now_us;
        self.bucket = start_bucket;
    }

    /// Lazily advances the bucket to `now_us` and returns the burst size a
    /// caller may currently send: `max_burst` while the bucket is
    /// non-negative, `0` once it has gone negative from `consume`.
    pub fn max_burst_now(&mut self, now_us: u64) -> u32 {
        let elapsed = now_us.saturating_sub(self.last_update_us);
        let inc = (u128::from(elapsed) * u128::from(self.tokens_per_period)) >> SCALE;
        if inc > 10 {
            self.last_update_us = now_us;
            let inc = inc.min(u128::from(i64::MAX)) as i64;
            self.bucket = self.bucket.saturating_add(inc).min(i64::from(self.max_burst));
        }
        if self.bucket >= 0 {
            self.max_burst
        } else {
            0
        }
    }

    /// Debits `bytes` from the bucket. May drive it negative, throttling
    /// [`max_burst_now`] until enough time has elapsed to replenish it.
    pub fn consume(&mut self, bytes: u32) {
        self.bucket -= i64::from(bytes);
    }

    /// `paced -> unpaced`-adjacent housekeeping run when the connection is
    /// rescheduled: clears DESCHED, zeroes the bucket, and re-arms the
    /// scheduler if (and only if, after a double-check) the TX queue still
    /// has pending bytes — avoiding a race where the producer enqueues data
    /// between the first check and the event being cleared.
    pub fn reschedule(&mut self, conn: &dyn PacerConnection) {
        self.desched = false;
        self.bucket = 0;

        if conn.tx_queue_pending_bytes() > 0 {
            conn.request_reschedule();
            return;
        }

        conn.clear_event();
        if conn.tx_queue_pending_bytes() > 0 {
            conn.request_reschedule();
        }
    }
}

impl Default for TxPacer {
    fn default() -> Self {
        Self::new()
    }
}
