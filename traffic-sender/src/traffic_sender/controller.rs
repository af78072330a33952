use common_types::Tps;
use log::{debug, info, warn};
use rate_source::RateSource;
use sender_metrics::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// No config source, the rate never changes
    Static,
    /// The rate is re-read from the config source once per `interval`
    Dynamic { interval: Duration },
}

/// Read-only view of the controller's current rate. Reading never blocks and never touches
/// the network.
#[derive(Debug, Clone)]
pub struct RateReader {
    cell: Arc<AtomicU64>,
}

impl RateReader {
    pub fn current(&self) -> Tps {
        Tps::new(f64::from_bits(self.cell.load(Ordering::Acquire)))
    }

    /// A reader that isn't attached to any controller
    pub fn fixed(rate: Tps) -> Self {
        RateReader {
            cell: Arc::new(AtomicU64::new(rate.value().to_bits())),
        }
    }
}

/// Owns the current rate. The controller is the only writer; the dispatcher gets a
/// [`RateReader`].
pub struct RateController {
    source: Box<dyn RateSource>,
    mode: RefreshMode,
    default: Tps,
    cell: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
    last_refresh: Instant,
}

impl RateController {
    /// The mode is decided here, once: dynamic if the source can change, static otherwise.
    pub fn new(
        source: Box<dyn RateSource>,
        refresh_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        let mode = if source.is_dynamic() {
            RefreshMode::Dynamic {
                interval: refresh_interval,
            }
        } else {
            RefreshMode::Static
        };
        let default = source.default_rate();
        RateController {
            source,
            mode,
            default,
            cell: Arc::new(AtomicU64::new(default.value().to_bits())),
            metrics,
            last_refresh: Instant::now(),
        }
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    pub fn reader(&self) -> RateReader {
        RateReader {
            cell: self.cell.clone(),
        }
    }

    pub fn current(&self) -> Tps {
        Tps::new(f64::from_bits(self.cell.load(Ordering::Acquire)))
    }

    /// Store and publish a new rate. A rate that can't be paced (zero, negative, NaN,
    /// infinite) is replaced by the default. Returns the stored value.
    pub fn set(&self, rate: Tps) -> Tps {
        if !rate.is_usable() {
            warn!("Invalid TPS {}, using default: {}", rate, self.default);
        }
        let rate = rate.or(self.default);
        self.cell.store(rate.value().to_bits(), Ordering::Release);
        self.metrics.tps(rate.value());
        rate
    }

    pub async fn initialize(&mut self) -> Tps {
        let rate = self.source.fetch_rate().await;
        self.last_refresh = Instant::now();
        let rate = self.set(rate);
        info!("Initial TPS: {} ({:?})", rate, self.mode);
        rate
    }

    /// Re-read the rate if the refresh interval has elapsed since the last read. Returns
    /// whether the source was read.
    pub async fn maybe_refresh(&mut self, now: Instant) -> bool {
        let interval = match self.mode {
            RefreshMode::Static => return false,
            RefreshMode::Dynamic { interval } => interval,
        };
        if now.saturating_duration_since(self.last_refresh) < interval {
            return false;
        }
        debug!("Checking {} for TPS update...", &self.source);
        let rate = self.source.fetch_rate().await;
        let previous = self.current();
        let rate = self.set(rate);
        if rate != previous {
            info!("TPS changed from {} to {}", previous, rate);
        }
        self.metrics.rate_refreshed();
        self.last_refresh = now;
        true
    }

    pub fn next_refresh_at(&self) -> Option<Instant> {
        match self.mode {
            RefreshMode::Static => None,
            RefreshMode::Dynamic { interval } => Some(self.last_refresh + interval),
        }
    }

    /// Keep the rate up to date until the process ends. Returns right away in static mode.
    pub async fn run(mut self) {
        while let Some(deadline) = self.next_refresh_at() {
            sleep_until(deadline).await;
            self.maybe_refresh(Instant::now()).await;
        }
        info!("No config source, TPS stays at {}", self.current());
    }
}
