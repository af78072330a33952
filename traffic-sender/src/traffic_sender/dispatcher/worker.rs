use crate::dispatcher::outcome::{parse_body, DispatchError, DispatchOutcome, Reply};
use common_types::WorkloadItem;
use http::header::CONTENT_TYPE;
use http::{Method, Request, Uri};
use hyper::client::HttpConnector;
use hyper::{Body, Client};
use log::trace;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{timeout, Instant};

#[derive(Serialize)]
struct CalculateRequest<'a> {
    equation: &'a str,
}

/// Client for the downstream compute service
#[derive(Debug, Clone)]
pub struct WorkerClient {
    uri: Uri,
    client: Client<HttpConnector>,
    timeout: Duration,
}

impl WorkerClient {
    pub fn new(uri: Uri, timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        WorkerClient {
            uri,
            client: Client::builder().build(connector),
            timeout,
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Send one calculation. The whole exchange, body included, is bounded by the timeout.
    pub async fn calculate(&self, item: &WorkloadItem) -> DispatchOutcome {
        timeout(self.timeout, self.exchange(item))
            .await
            .map_err(|_| DispatchError::Timeout(self.timeout))?
    }

    async fn exchange(&self, item: &WorkloadItem) -> DispatchOutcome {
        let equation = item.equation();
        let body = serde_json::to_vec(&CalculateRequest {
            equation: &equation,
        })?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.uri.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))?;
        trace!("sending request: {} {}", &self.uri, &equation);

        let started = Instant::now();
        let response = self.client.request(request).await?;
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await?;
        let latency = started.elapsed();

        if !status.is_success() {
            return Err(DispatchError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        let (answer, reported) = parse_body(&body);
        Ok(Reply {
            status,
            answer,
            latency,
            reported,
        })
    }
}
