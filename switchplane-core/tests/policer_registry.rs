use std::sync::Arc;

use switchplane_core::collab::testing::RecordingFeatureGraph;
use switchplane_core::collab::Direction;
use switchplane_core::policer::{Action, PolicerConfig, PolicerType, RateUnit, Rounding, Verdict};
use switchplane_core::{DataplaneError, PolicerRegistry};

fn cfg(cir: u64, cb: u64) -> PolicerConfig {
    PolicerConfig {
        policer_type: PolicerType::OneRateTwoColor,
        rate_unit: RateUnit::Kbps,
        rounding: Rounding::Closest,
        color_aware: false,
        cir,
        cb,
        pir: 0,
        eb: 0,
        conform_action: Action::Transmit,
        exceed_action: Action::Drop,
        violate_action: Action::Drop,
    }
}

// spec.md §8 "Policer uniqueness" property.
#[test]
fn duplicate_name_is_rejected_and_deleting_either_frees_it() {
    let registry = PolicerRegistry::new(4);
    let first = registry.add("p1", cfg(1000, 1500)).unwrap();
    let err = registry.add("p1", cfg(2000, 3000)).unwrap_err();
    assert_eq!(err, DataplaneError::Exists);

    registry.del(first).unwrap();
    let second = registry.add("p1", cfg(500, 1000)).unwrap();
    assert_eq!(registry.index_of("p1"), Some(second));
}

// spec.md §8 scenario 4: create, bind to a worker, read back thread_index
// and zeroed counters.
#[test]
fn bind_to_worker_and_read_back_counters() {
    let registry = PolicerRegistry::new(4);
    let index = registry.add("p1", cfg(1000, 1500)).unwrap();

    registry.bind(index, 0, true).unwrap();
    assert_eq!(registry.thread_index(index).unwrap(), Some(0));

    let counters = registry.counters(index).unwrap();
    assert_eq!(counters.conform.packets, 0);
    assert_eq!(counters.exceed.packets, 0);
    assert_eq!(counters.violate.packets, 0);
}

#[test]
fn bind_rejects_an_out_of_range_worker() {
    let registry = PolicerRegistry::new(2);
    let index = registry.add("p1", cfg(1000, 1500)).unwrap();
    let err = registry.bind(index, 7, true).unwrap_err();
    assert_eq!(err, DataplaneError::WorkerInvalid);
}

#[test]
fn unbind_clears_thread_index() {
    let registry = PolicerRegistry::new(4);
    let index = registry.add("p1", cfg(1000, 1500)).unwrap();
    registry.bind(index, 1, true).unwrap();
    registry.bind(index, 0, false).unwrap();
    assert_eq!(registry.thread_index(index).unwrap(), None);
}

#[test]
fn record_accumulates_per_verdict_counters_and_reset_restores_bucket() {
    let registry = PolicerRegistry::new(1);
    let index = registry.add("p1", cfg(1000, 1500)).unwrap();

    registry.record(index, Verdict::Conform, 64).unwrap();
    registry.record(index, Verdict::Conform, 128).unwrap();
    registry.record(index, Verdict::Exceed, 32).unwrap();

    let counters = registry.counters(index).unwrap();
    assert_eq!(counters.conform.packets, 2);
    assert_eq!(counters.conform.bytes, 192);
    assert_eq!(counters.exceed.packets, 1);
    assert_eq!(counters.exceed.bytes, 32);

    registry.reset(index).unwrap();
    let after_reset = registry.runtime(index).unwrap();
    assert_eq!(after_reset.current_bucket, after_reset.current_limit);
    assert_eq!(after_reset.extended_bucket, after_reset.extended_limit);
}

#[test]
fn update_preserves_name_and_zeroes_counters() {
    let registry = PolicerRegistry::new(1);
    let index = registry.add("p1", cfg(1000, 1500)).unwrap();
    registry.record(index, Verdict::Violate, 10).unwrap();

    registry.update(index, cfg(2000, 3000)).unwrap();

    assert_eq!(registry.index_of("p1"), Some(index));
    let counters = registry.counters(index).unwrap();
    assert_eq!(counters.violate.packets, 0);
}

#[test]
fn input_binds_an_interface_and_enables_the_matching_feature() {
    let graph = Arc::new(RecordingFeatureGraph::new());
    let registry = PolicerRegistry::new(1).with_feature_graph(graph.clone());
    let index = registry.add("p1", cfg(1000, 1500)).unwrap();

    registry.input(index, 5, Direction::Rx, true).unwrap();
    assert_eq!(registry.bound_policer(5, Direction::Rx), Some(index));

    let calls = graph.calls();
    assert_eq!(calls.len(), 1, "RX binds a single device-input arc");
    assert_eq!(calls[0].1, "device-input");
    assert_eq!(calls[0].2, "policer-input");
    assert!(calls[0].4);

    registry.input(index, 5, Direction::Rx, false).unwrap();
    assert_eq!(registry.bound_policer(5, Direction::Rx), None);
}

// spec.md line 97: binding a policer to TX enables "policer-output" on both
// the IPv4 and IPv6 output arcs, not just one.
#[test]
fn input_on_tx_enables_policer_output_on_both_ip4_and_ip6_arcs() {
    let graph = Arc::new(RecordingFeatureGraph::new());
    let registry = PolicerRegistry::new(1).with_feature_graph(graph.clone());
    let index = registry.add("p1", cfg(1000, 1500)).unwrap();

    registry.input(index, 5, Direction::Tx, true).unwrap();
    let calls = graph.calls();
    assert_eq!(calls.len(), 2, "TX binds both the ip4-output and ip6-output arcs");
    assert!(calls.iter().all(|c| c.2 == "policer-output"));
    let arcs: Vec<&str> = calls.iter().map(|c| c.1.as_str()).collect();
    assert!(arcs.contains(&"ip4-output"));
    assert!(arcs.contains(&"ip6-output"));
    assert!(calls.iter().all(|c| c.4));
}

#[test]
fn dual_rate_config_with_inverted_rates_is_rejected_at_add() {
    let registry = PolicerRegistry::new(1);
    let mut bad = cfg(2000, 1500);
    bad.policer_type = PolicerType::TwoRateThreeColor2698;
    bad.pir = 1000;
    let err = registry.add("p1", bad).unwrap_err();
    assert!(matches!(err, DataplaneError::Invalid(_)));
    assert_eq!(registry.index_of("p1"), None, "a failed add must not leave a dangling name entry");
}
