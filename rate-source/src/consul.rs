use crate::{RateSource, RateSourceError};
use async_trait::async_trait;
use common_env::DEFAULT_CONSUL_TIMEOUT;
use common_types::Tps;
use http::{StatusCode, Uri};
use hyper::client::HttpConnector;
use hyper::Client;
use log::trace;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;

/// Where to find the rate in consul's KV store. Immutable after startup.
#[derive(Debug, Clone)]
pub struct ConfigSourceHandle {
    pub host: String,
    pub port: u16,
    pub key: String,
    pub timeout: Duration,
}

impl ConfigSourceHandle {
    pub fn new(host: impl Into<String>, port: u16, key: impl Into<String>) -> Self {
        ConfigSourceHandle {
            host: host.into(),
            port,
            key: key.into(),
            timeout: Duration::from_millis(DEFAULT_CONSUL_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `?raw` makes consul return the stored value as is, instead of a base64 encoded json
    pub fn uri(&self) -> Result<Uri, http::uri::InvalidUri> {
        Uri::from_str(&format!(
            "http://{}:{}/v1/kv/{}?raw",
            self.host, self.port, self.key
        ))
    }
}

pub struct ConsulRateSource {
    handle: ConfigSourceHandle,
    client: Client<HttpConnector>,
    default: Tps,
}

impl ConsulRateSource {
    pub fn new(handle: ConfigSourceHandle, default: Tps) -> Self {
        ConsulRateSource {
            handle,
            client: Client::new(),
            default,
        }
    }

    async fn read_key(&self) -> Result<Option<f64>, RateSourceError> {
        let uri = self.handle.uri()?;
        trace!("reading rate from {}", &uri);
        let response = self.client.get(uri).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RateSourceError::Status(status));
        }
        let body = hyper::body::to_bytes(response.into_body()).await?;
        parse_rate(&body).map(Some)
    }
}

fn parse_rate(body: &[u8]) -> Result<f64, RateSourceError> {
    let text = String::from_utf8_lossy(body);
    text.trim()
        .parse::<f64>()
        .map_err(|_| RateSourceError::Malformed(text.into_owned()))
}

impl Display for ConsulRateSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "consul {}:{}/{}",
            &self.handle.host, self.handle.port, &self.handle.key
        )
    }
}

#[async_trait]
impl RateSource for ConsulRateSource {
    fn is_dynamic(&self) -> bool {
        true
    }

    fn default_rate(&self) -> Tps {
        self.default
    }

    async fn try_fetch(&self) -> Result<Option<f64>, RateSourceError> {
        timeout(self.handle.timeout, self.read_key())
            .await
            .map_err(|_| RateSourceError::Timeout(self.handle.timeout))?
    }
}
