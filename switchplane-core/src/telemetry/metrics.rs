use std::sync::Arc;

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, UpDownCounter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;

/// Counters and gauges for the four core subsystems. Mutation and scan
/// boundaries in `l2fib`, `policer`, `endpoint`, and `pacer` record into
/// these; nothing outside this crate increments them directly.
///
/// Exposing the underlying `prometheus::Registry` is left to the embedding
/// application — this crate has no admin or scrape surface of its own.
#[derive(Clone)]
pub struct Metrics {
    pub l2fib_learns_total: Counter<u64>,
    pub l2fib_ages_total: Counter<u64>,
    pub l2fib_flushes_total: Counter<u64>,
    pub l2fib_entries: UpDownCounter<i64>,

    pub policer_conform_total: Counter<u64>,
    pub policer_exceed_total: Counter<u64>,
    pub policer_violate_total: Counter<u64>,

    pub endpoint_entries: UpDownCounter<i64>,
    pub endpoint_allocations_total: Counter<u64>,
    pub endpoint_allocation_failures_total: Counter<u64>,

    pub pacer_updates_total: Counter<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            l2fib_learns_total: meter
                .u64_counter("switchplane_l2fib_learns_total")
                .with_description("Total number of L2-FIB entries learned")
                .build(),
            l2fib_ages_total: meter
                .u64_counter("switchplane_l2fib_ages_total")
                .with_description("Total number of L2-FIB entries aged out by the scanner")
                .build(),
            l2fib_flushes_total: meter
                .u64_counter("switchplane_l2fib_flushes_total")
                .with_description("Total number of L2-FIB entries removed by an explicit flush")
                .build(),
            l2fib_entries: meter
                .i64_up_down_counter("switchplane_l2fib_entries")
                .with_description("Current number of live L2-FIB entries")
                .build(),

            policer_conform_total: meter
                .u64_counter("switchplane_policer_conform_total")
                .with_description("Total packets classified Conform by a policer")
                .build(),
            policer_exceed_total: meter
                .u64_counter("switchplane_policer_exceed_total")
                .with_description("Total packets classified Exceed by a policer")
                .build(),
            policer_violate_total: meter
                .u64_counter("switchplane_policer_violate_total")
                .with_description("Total packets classified Violate by a policer")
                .build(),

            endpoint_entries: meter
                .i64_up_down_counter("switchplane_endpoint_entries")
                .with_description("Current number of live local transport endpoints")
                .build(),
            endpoint_allocations_total: meter
                .u64_counter("switchplane_endpoint_allocations_total")
                .with_description("Total number of successful local endpoint allocations")
                .build(),
            endpoint_allocation_failures_total: meter
                .u64_counter("switchplane_endpoint_allocation_failures_total")
                .with_description("Total number of local endpoint allocations that failed")
                .build(),

            pacer_updates_total: meter
                .u64_counter("switchplane_pacer_updates_total")
                .with_description("Total number of TX pacer bucket updates")
                .build(),
        }
    }
}

/// Build a `Metrics` bound to a fresh `opentelemetry` meter provider backed
/// by a Prometheus registry, and return the registry alongside it so the
/// embedding application can scrape it however it sees fit.
pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("switchplane-core");
    let metrics = Arc::new(Metrics::new(meter));

    Ok((metrics, registry))
}
