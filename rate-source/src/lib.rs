//! Sources of the target rate.
//!
//! A [`RateSource`] never fails from the caller's point of view: [`RateSource::fetch_rate`]
//! swallows (and logs) every error and hands back the default instead. The typed error is
//! still available through [`RateSource::try_fetch`].

mod consul;

pub use consul::{ConfigSourceHandle, ConsulRateSource};

use async_trait::async_trait;
use common_types::Tps;
use http::StatusCode;
use log::{debug, error, info};
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RateSourceError {
    #[error("invalid config source uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("config source request failed: {0}")]
    Transport(#[from] hyper::Error),
    #[error("config source didn't respond within {0:?}")]
    Timeout(Duration),
    #[error("config source responded with {0}")]
    Status(StatusCode),
    #[error("config value {0:?} is not a number")]
    Malformed(String),
}

#[async_trait]
pub trait RateSource: Display + Send + Sync {
    /// Whether the rate may change at runtime, i.e. whether it's worth polling
    fn is_dynamic(&self) -> bool;

    fn default_rate(&self) -> Tps;

    /// One read of the rate. `Ok(None)` means the source is reachable but holds no value.
    async fn try_fetch(&self) -> Result<Option<f64>, RateSourceError>;

    /// One read of the rate, the default on any failure. Values are returned as read; it's up
    /// to the caller to reject non-positive rates.
    async fn fetch_rate(&self) -> Tps {
        let default = self.default_rate();
        match self.try_fetch().await {
            Ok(Some(rate)) => {
                info!("Successfully fetched TPS from {}: {}", self, rate);
                Tps::new(rate)
            }
            Ok(None) => {
                info!("No TPS value found in {}. Using default: {}", self, default);
                default
            }
            Err(e) => {
                error!(
                    "Error reading TPS from {}: {}. Using default TPS: {}",
                    self, e, default
                );
                default
            }
        }
    }
}

/// Used when no config source is configured, the rate is fixed for the process lifetime
#[derive(Debug, Clone)]
pub struct StaticRateSource {
    rate: Tps,
}

impl StaticRateSource {
    pub fn new(rate: Tps) -> Self {
        StaticRateSource { rate }
    }
}

impl Display for StaticRateSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "static rate {}", self.rate)
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    fn is_dynamic(&self) -> bool {
        false
    }

    fn default_rate(&self) -> Tps {
        self.rate
    }

    async fn try_fetch(&self) -> Result<Option<f64>, RateSourceError> {
        Ok(Some(self.rate.value()))
    }

    async fn fetch_rate(&self) -> Tps {
        debug!("Config source not set. Using default TPS: {}", self.rate);
        self.rate
    }
}

/// Consul backed source if a handle is given, static otherwise
pub fn rate_source(handle: Option<ConfigSourceHandle>, default: Tps) -> Box<dyn RateSource> {
    match handle {
        Some(handle) => Box::new(ConsulRateSource::new(handle, default)),
        None => Box::new(StaticRateSource::new(default)),
    }
}
