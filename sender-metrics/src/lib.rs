use log::trace;
#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};

/// Buckets for upstream response time, in milliseconds
pub const DEFAULT_HISTOGRAM_BUCKET: [f64; 6] = [20f64, 50f64, 100f64, 300f64, 700f64, 1100f64];

/// Buckets for the calculation time reported by the worker, in seconds
pub const CALCULATION_HISTOGRAM_BUCKET: [f64; 8] = [
    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05,
];

pub const STATUS_TRANSPORT_ERROR: &str = "transport_error";
pub const STATUS_TIMEOUT: &str = "timeout";

/// All the metrics exposed by the sender, registered in their own [`Registry`].
///
/// The value is created once at startup and shared behind an `Arc`; the rate gauge is only
/// written by the rate controller, everything else only by the dispatcher.
pub struct Metrics {
    registry: Registry,
    tps: Gauge,
    rate_refresh_count: IntCounter,
    upstream_request_count: IntCounter,
    upstream_request_status_count: IntCounterVec,
    upstream_response_time: HistogramVec,
    upstream_reported_calculation_time: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_buckets(Vec::from(DEFAULT_HISTOGRAM_BUCKET))
    }

    pub fn with_buckets(buckets: Vec<f64>) -> Result<Self, prometheus::Error> {
        let registry = Registry::default();
        #[cfg(target_os = "linux")]
        registry.register(Box::new(ProcessCollector::for_self()))?;

        let tps = Gauge::with_opts(Opts::new(
            "traffic_sender_tps",
            "Current Transactions Per Second",
        ))?;

        let rate_refresh_count = IntCounter::with_opts(Opts::new(
            "traffic_sender_rate_refresh_count",
            "number of times the rate was re-read from the config source",
        ))?;

        let upstream_request_count = IntCounter::with_opts(Opts::new(
            "upstream_request_count",
            "request sent to upstream",
        ))?;

        let upstream_request_status_count = IntCounterVec::new(
            Opts::new(
                "upstream_request_status_count",
                "upstream request count per status",
            ),
            &["status"],
        )?;

        let mut opts = HistogramOpts::new("upstream_response_time", "upstream response time");
        opts.buckets = buckets;
        let upstream_response_time = HistogramVec::new(opts, &["status"])?;

        let mut opts = HistogramOpts::new(
            "upstream_reported_calculation_seconds",
            "calculation time reported by the upstream worker",
        );
        opts.buckets = Vec::from(CALCULATION_HISTOGRAM_BUCKET);
        let upstream_reported_calculation_time = Histogram::with_opts(opts)?;

        registry.register(Box::new(tps.clone()))?;
        registry.register(Box::new(rate_refresh_count.clone()))?;
        registry.register(Box::new(upstream_request_count.clone()))?;
        registry.register(Box::new(upstream_request_status_count.clone()))?;
        registry.register(Box::new(upstream_response_time.clone()))?;
        registry.register(Box::new(upstream_reported_calculation_time.clone()))?;

        Ok(Metrics {
            registry,
            tps,
            rate_refresh_count,
            upstream_request_count,
            upstream_request_status_count,
            upstream_response_time,
            upstream_reported_calculation_time,
        })
    }

    pub fn tps(&self, tps: f64) {
        trace!("traffic_sender_tps: {}", tps);
        self.tps.set(tps);
    }

    pub fn current_tps(&self) -> f64 {
        self.tps.get()
    }

    pub fn rate_refreshed(&self) {
        self.rate_refresh_count.inc();
    }

    pub fn upstream_request_count(&self, increment: u64) {
        self.upstream_request_count.inc_by(increment);
    }

    pub fn upstream_request_status_count(&self, increment: u64, status: &str) {
        self.upstream_request_status_count
            .with_label_values(&[status])
            .inc_by(increment);
    }

    pub fn requests_sent(&self) -> u64 {
        self.upstream_request_count.get()
    }

    pub fn status_count(&self, status: &str) -> u64 {
        self.upstream_request_status_count
            .get_metric_with_label_values(&[status])
            .map_or(0, |counter| counter.get())
    }

    /// `elapsed` in milliseconds
    pub fn upstream_response_time(&self, status: &str, elapsed: f64) {
        self.upstream_response_time
            .with_label_values(&[status])
            .observe(elapsed);
    }

    /// `seconds` as reported by the worker, not measured by us
    pub fn upstream_reported_calculation_time(&self, seconds: f64) {
        self.upstream_reported_calculation_time.observe(seconds);
    }

    /// Render everything in the prometheus text exposition format
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn format_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}
