use crate::dispatcher::Pacing;
use anyhow::{anyhow, Context};
use common_env::{
    consul_host, consul_port, consul_timeout, consul_tps_key, default_tps, metrics_port,
    pacing_mode, rate_refresh_interval, request_timeout, worker_url, ENV_NAME_WORKER_URL,
};
use common_types::Tps;
use http::Uri;
use log::warn;
use rate_source::ConfigSourceHandle;
use std::str::FromStr;
use std::time::Duration;

/// Everything the sender needs to know at startup
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub worker_url: Uri,
    /// `None` keeps the rate at `default_tps` for the whole process lifetime
    pub config_source: Option<ConfigSourceHandle>,
    pub refresh_interval: Duration,
    pub default_tps: Tps,
    pub request_timeout: Duration,
    pub metrics_port: u16,
    pub pacing: Pacing,
}

impl SenderConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let url = worker_url();
        let worker_url = Uri::from_str(&url)
            .with_context(|| format!("invalid {}: {}", ENV_NAME_WORKER_URL, &url))?;
        if worker_url.scheme_str() != Some("http") || worker_url.host().is_none() {
            return Err(anyhow!(
                "invalid {}: {}, expected http://<host>[:port]/<path>",
                ENV_NAME_WORKER_URL,
                &url
            ));
        }

        let config_source = consul_host().map(|host| {
            ConfigSourceHandle::new(host, consul_port(), consul_tps_key())
                .with_timeout(Duration::from_millis(consul_timeout()))
        });

        let mode = pacing_mode();
        let pacing = Pacing::from_str(&mode).unwrap_or_else(|e| {
            warn!("{}, using fixed pacing", e);
            Pacing::Fixed
        });

        Ok(SenderConfig {
            worker_url,
            config_source,
            refresh_interval: Duration::from_secs(rate_refresh_interval()),
            default_tps: Tps::new(default_tps()),
            request_timeout: Duration::from_millis(request_timeout()),
            metrics_port: metrics_port(),
            pacing,
        })
    }
}
