use switchplane_core::pacer::{PacerConnection, PACER_MAX_BURST, PACER_MIN_BURST};
use switchplane_core::TxPacer;

struct AlwaysEmptyQueue;

impl PacerConnection for AlwaysEmptyQueue {
    fn tx_queue_pending_bytes(&self) -> u32 {
        0
    }
    fn request_reschedule(&self) {}
    fn clear_event(&self) {}
}

// spec.md §3.5 invariant: a connection with TX-PACED set has a valid
// pacer, and `max_burst` always lies in [PACER_MIN_BURST, PACER_MAX_BURST].
#[test]
fn init_then_update_keeps_max_burst_within_bounds() {
    let mut pacer = TxPacer::new();
    pacer.init(1_000_000, 0, 0);
    assert!(pacer.paced());

    pacer.update(1_000_000, 20_000);
    assert!(pacer.max_burst() >= PACER_MIN_BURST);
    assert!(pacer.max_burst() <= PACER_MAX_BURST);
}

// spec.md §8 "Pacer monotonicity" property, driven across several ticks.
#[test]
fn bucket_grows_across_ticks_but_never_exceeds_max_burst() {
    let mut pacer = TxPacer::new();
    pacer.reset(4_000_000, 0, 40_000, 0);

    let mut now = 0u64;
    for _ in 0..50 {
        now += 1_000;
        pacer.consume(10);
        let _ = pacer.max_burst_now(now);
        assert!(pacer.bucket() <= i64::from(pacer.max_burst()));
    }
}

#[test]
fn a_full_reschedule_cycle_zeroes_the_bucket_and_stays_idle_on_an_empty_queue() {
    let mut pacer = TxPacer::new();
    pacer.reset(1_000_000, 9_000, 40_000, 0);
    pacer.reschedule(&AlwaysEmptyQueue);
    assert_eq!(pacer.bucket(), 0);
}
