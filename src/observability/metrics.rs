use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub refreshes_total: IntCounterVec,
    pub refresh_latency_seconds: HistogramVec,
    pub tracked_orders: IntGauge,
    pub ticks_total: IntCounter,
    pub polyline_decode_failures_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let refreshes_total = IntCounterVec::new(
            Opts::new("refreshes_total", "Total ETA refreshes by outcome"),
            &["outcome"],
        )
        .expect("valid refreshes_total metric");

        let refresh_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "refresh_latency_seconds",
                "Latency of ETA refresh calls in seconds",
            ),
            &["outcome"],
        )
        .expect("valid refresh_latency_seconds metric");

        let tracked_orders = IntGauge::new("tracked_orders", "Orders with a live tracking session")
            .expect("valid tracked_orders metric");

        let ticks_total = IntCounter::new("ticks_total", "Timeline evaluations published by tickers")
            .expect("valid ticks_total metric");

        let polyline_decode_failures_total = IntCounter::new(
            "polyline_decode_failures_total",
            "Route polylines that failed to decode completely",
        )
        .expect("valid polyline_decode_failures_total metric");

        registry
            .register(Box::new(refreshes_total.clone()))
            .expect("register refreshes_total");
        registry
            .register(Box::new(refresh_latency_seconds.clone()))
            .expect("register refresh_latency_seconds");
        registry
            .register(Box::new(tracked_orders.clone()))
            .expect("register tracked_orders");
        registry
            .register(Box::new(ticks_total.clone()))
            .expect("register ticks_total");
        registry
            .register(Box::new(polyline_decode_failures_total.clone()))
            .expect("register polyline_decode_failures_total");

        Self {
            registry,
            refreshes_total,
            refresh_latency_seconds,
            tracked_orders,
            ticks_total,
            polyline_decode_failures_total,
        }
    }

    pub fn record_refresh(&self, outcome: &str, elapsed_secs: f64) {
        self.refreshes_total.with_label_values(&[outcome]).inc();
        self.refresh_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed_secs);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
