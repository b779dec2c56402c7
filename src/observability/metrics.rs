use lazy_static::lazy_static;
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Aggregation metrics
    pub static ref AGGREGATION_CYCLES: IntCounterVec = IntCounterVec::new(
        Opts::new("aggregation_cycles_total", "Aggregation cycles by symbol and outcome"),
        &["symbol", "outcome"]
    ).unwrap();

    pub static ref SOURCE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("source_fetch_failures_total", "Failed or timed out source fetches"),
        &["source", "reason"]
    ).unwrap();

    pub static ref OUTLIERS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("outliers_rejected_total", "Samples discarded as outliers"),
        &["symbol"]
    ).unwrap();

    pub static ref AGGREGATED_PRICE: GaugeVec = GaugeVec::new(
        Opts::new("aggregated_price", "Last published aggregated price"),
        &["symbol"]
    ).unwrap();

    pub static ref AGGREGATION_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "aggregation_latency_seconds",
            "Wall time of one aggregation cycle"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).unwrap();

    // Trigger metrics
    pub static ref REGISTERED_TRIGGERS: IntGauge = IntGauge::new(
        "registered_triggers",
        "Triggers currently held in the registry"
    ).unwrap();

    pub static ref TRIGGERS_FIRED: IntCounterVec = IntCounterVec::new(
        Opts::new("triggers_fired_total", "Trigger matches handed to the dispatcher"),
        &["kind"]
    ).unwrap();

    pub static ref MONITOR_TICKS: IntCounter = IntCounter::new(
        "price_monitor_ticks_total",
        "Price monitor evaluation passes"
    ).unwrap();

    // Dispatch metrics
    pub static ref DISPATCH_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("dispatch_outcomes_total", "Function executions by outcome"),
        &["outcome"]
    ).unwrap();
}

pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(AGGREGATION_CYCLES.clone()))?;
    REGISTRY.register(Box::new(SOURCE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(OUTLIERS_REJECTED.clone()))?;
    REGISTRY.register(Box::new(AGGREGATED_PRICE.clone()))?;
    REGISTRY.register(Box::new(AGGREGATION_LATENCY.clone()))?;
    REGISTRY.register(Box::new(REGISTERED_TRIGGERS.clone()))?;
    REGISTRY.register(Box::new(TRIGGERS_FIRED.clone()))?;
    REGISTRY.register(Box::new(MONITOR_TICKS.clone()))?;
    REGISTRY.register(Box::new(DISPATCH_OUTCOMES.clone()))?;
    Ok(())
}
