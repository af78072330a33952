//! Common environment variables used by various components.
//!
//! Every value has a documented default; a variable that is unset or can't be parsed falls
//! back to that default.

use once_cell::sync::OnceCell;
use std::env;
use std::str::FromStr;

pub const ENV_NAME_WORKER_URL: &str = "WORKER_URL";
pub const DEFAULT_WORKER_URL: &str = "http://worker-svc:8525/calculate";

pub const ENV_NAME_CONSUL_HOST: &str = "CONSUL_HOST";
pub const ENV_NAME_CONSUL_PORT: &str = "CONSUL_PORT";
pub const DEFAULT_CONSUL_PORT: u16 = 8500;
pub const ENV_NAME_CONSUL_TPS_KEY: &str = "CONSUL_TPS_KEY";
pub const DEFAULT_CONSUL_TPS_KEY: &str = "config/tps";
pub const ENV_NAME_CONSUL_TIMEOUT: &str = "CONSUL_TIMEOUT_MS";
pub const DEFAULT_CONSUL_TIMEOUT: u64 = 2_000;

pub const ENV_NAME_DEFAULT_TPS: &str = "DEFAULT_TPS";
pub const DEFAULT_TPS: f64 = 1.0;
pub const ENV_NAME_RATE_REFRESH_INTERVAL: &str = "RATE_REFRESH_INTERVAL_SECS";
pub const DEFAULT_RATE_REFRESH_INTERVAL: u64 = 60;

pub const ENV_NAME_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_MS";
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 5_000;

pub const ENV_NAME_PACING_MODE: &str = "PACING_MODE";
pub const DEFAULT_PACING_MODE: &str = "fixed";

static METRICS_PORT: OnceCell<u16> = OnceCell::new();
pub const ENV_NAME_METRICS_PORT: &str = "METRICS_PORT";
pub const DEFAULT_METRICS_PORT: u16 = 8001;

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .map_err(|_| ())
        .and_then(|val| T::from_str(val.trim()).map_err(|_| ()))
        .unwrap_or(default)
}

pub fn worker_url() -> String {
    env::var(ENV_NAME_WORKER_URL).unwrap_or_else(|_| DEFAULT_WORKER_URL.to_string())
}

/// Host of the config source, `None` if unset or blank. Without a host the rate never
/// changes after startup.
pub fn consul_host() -> Option<String> {
    env::var(ENV_NAME_CONSUL_HOST)
        .ok()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
}

pub fn consul_port() -> u16 {
    parse_or(ENV_NAME_CONSUL_PORT, DEFAULT_CONSUL_PORT)
}

pub fn consul_tps_key() -> String {
    env::var(ENV_NAME_CONSUL_TPS_KEY)
        .ok()
        .map(|key| key.trim_matches('/').to_string())
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| DEFAULT_CONSUL_TPS_KEY.to_string())
}

pub fn consul_timeout() -> u64 {
    positive_or(ENV_NAME_CONSUL_TIMEOUT, DEFAULT_CONSUL_TIMEOUT)
}

/// Fallback rate. A non-positive or non-finite value is ignored.
pub fn default_tps() -> f64 {
    let tps = parse_or(ENV_NAME_DEFAULT_TPS, DEFAULT_TPS);
    if tps.is_finite() && tps > 0f64 {
        tps
    } else {
        DEFAULT_TPS
    }
}

pub fn rate_refresh_interval() -> u64 {
    positive_or(
        ENV_NAME_RATE_REFRESH_INTERVAL,
        DEFAULT_RATE_REFRESH_INTERVAL,
    )
}

pub fn request_timeout() -> u64 {
    positive_or(ENV_NAME_REQUEST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
}

pub fn pacing_mode() -> String {
    env::var(ENV_NAME_PACING_MODE).unwrap_or_else(|_| DEFAULT_PACING_MODE.to_string())
}

pub fn metrics_port() -> u16 {
    *METRICS_PORT.get_or_init(|| parse_or(ENV_NAME_METRICS_PORT, DEFAULT_METRICS_PORT))
}

fn positive_or(name: &str, default: u64) -> u64 {
    match parse_or(name, default) {
        0 => default,
        val => val,
    }
}
