//! The dispatch loop: one request per tick, paced by the current rate.
//!
//! A tick never fails. Whatever happens to the request is logged, recorded in the metrics
//! and the loop moves on to the next tick. Pacing is best effort; with a slow worker the
//! achieved rate will be lower than the target.

mod outcome;
mod worker;

pub use outcome::{Answer, DispatchError, DispatchOutcome, FailureKind, Reply};
pub use worker::WorkerClient;

use crate::controller::RateReader;
use crate::generator::WorkloadGenerator;
use common_types::{Tps, WorkloadItem};
use log::{error, info, warn};
use sender_metrics::Metrics;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Used only if even the default rate can't be turned into a delay
const FALLBACK_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep the full delay after each request; time spent in the request isn't accounted
    Fixed,
    /// Sleep only what's left of the delay, measured from the start of the tick. A tick that
    /// overran starts the next one right away, there's no catching up.
    Deadline,
}

impl Pacing {
    /// How long to sleep after a tick that took `elapsed`
    pub fn pause(&self, delay: Duration, elapsed: Duration) -> Duration {
        match self {
            Pacing::Fixed => delay,
            Pacing::Deadline => delay.saturating_sub(elapsed),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown pacing mode {0:?}, expected `fixed` or `deadline`")]
pub struct UnknownPacing(String);

impl FromStr for Pacing {
    type Err = UnknownPacing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "sleep" => Ok(Pacing::Fixed),
            "deadline" => Ok(Pacing::Deadline),
            _ => Err(UnknownPacing(s.to_string())),
        }
    }
}

/// Result of a single tick
#[derive(Debug)]
pub struct Tick {
    pub item: WorkloadItem,
    /// Target interval to the next tick
    pub delay: Duration,
    /// Time spent in the tick, request included
    pub elapsed: Duration,
    pub outcome: DispatchOutcome,
}

pub struct Dispatcher {
    rate: RateReader,
    default_rate: Tps,
    generator: WorkloadGenerator,
    worker: WorkerClient,
    metrics: Arc<Metrics>,
    pacing: Pacing,
}

impl Dispatcher {
    pub fn new(
        rate: RateReader,
        default_rate: Tps,
        generator: WorkloadGenerator,
        worker: WorkerClient,
        metrics: Arc<Metrics>,
    ) -> Self {
        Dispatcher {
            rate,
            default_rate,
            generator,
            worker,
            metrics,
            pacing: Pacing::Fixed,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Current rate, the default if the current one can't be used for pacing
    pub fn current_rate(&self) -> Tps {
        let rate = self.rate.current();
        if rate.is_usable() {
            rate
        } else {
            warn!(
                "TPS {} can't be used, falling back to {}",
                rate, self.default_rate
            );
            self.default_rate
        }
    }

    pub fn next_delay(&self) -> Duration {
        self.current_rate()
            .delay()
            .or_else(|| self.default_rate.delay())
            .unwrap_or(FALLBACK_DELAY)
    }

    /// Generate, send and classify one request. Doesn't sleep.
    pub async fn tick(&self) -> Tick {
        let started = Instant::now();
        let delay = self.next_delay();
        let item = self.generator.generate();

        self.metrics.upstream_request_count(1);
        let outcome = self.worker.calculate(&item).await;
        let elapsed = started.elapsed();
        self.record(&item, &outcome, elapsed);

        Tick {
            item,
            delay,
            elapsed,
            outcome,
        }
    }

    fn record(&self, item: &WorkloadItem, outcome: &DispatchOutcome, elapsed: Duration) {
        match outcome {
            Ok(reply) => {
                let status = reply.status.as_str();
                self.metrics.upstream_request_status_count(1, status);
                self.metrics
                    .upstream_response_time(status, reply.latency.as_millis() as f64);
                if let Some(reported) = reply.reported {
                    self.metrics
                        .upstream_reported_calculation_time(reported.as_secs_f64());
                }
                match &reply.answer {
                    Answer::Unexpected(payload) => {
                        warn!("Sent: {}, Got unexpected response: {}", item, payload)
                    }
                    answer => info!("Sent: {}, Got: {}", item, answer),
                }
            }
            Err(e) => {
                let status = e.status_label();
                self.metrics.upstream_request_status_count(1, &status);
                self.metrics
                    .upstream_response_time(&status, elapsed.as_millis() as f64);
                match e.kind() {
                    FailureKind::Transport => error!("Sent: {}, {}", item, e),
                    FailureKind::Application => warn!("Sent: {}, Got Error: {}", item, e),
                }
            }
        }
    }

    /// Run until the process ends
    pub async fn run(self) {
        info!(
            "Traffic Sender started. Worker URL: {}, pacing: {:?}",
            self.worker.uri(),
            self.pacing
        );
        loop {
            let tick = self.tick().await;
            sleep(self.pacing.pause(tick.delay, tick.elapsed)).await;
        }
    }
}
