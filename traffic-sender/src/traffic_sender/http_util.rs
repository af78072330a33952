use http::header::CONTENT_TYPE;
use http::StatusCode;
use log::error;
use sender_metrics::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::reply::{self, Response};
use warp::{Filter, Reply};

/// `GET /metrics` (or `GET /`) in the prometheus text format
pub fn prometheus_metric(
    metrics: Arc<Metrics>,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    warp::get()
        .and(
            warp::path("metrics")
                .and(warp::path::end())
                .or(warp::path::end())
                .unify(),
        )
        .map(move || export(&metrics))
}

fn export(metrics: &Metrics) -> Response {
    match metrics.encode() {
        Ok(buffer) => {
            let response = reply::with_header(buffer, CONTENT_TYPE, metrics.format_type());
            response.into_response()
        }
        Err(e) => {
            error!("Error exporting metrics: {}", e);
            let response = reply::with_status(
                "Error exporting metrics",
                StatusCode::INTERNAL_SERVER_ERROR,
            );
            response.into_response()
        }
    }
}

/// Serve the metrics on a task of its own, so scraping keeps working while the dispatcher
/// sleeps. Returns the bound address.
pub fn serve_metrics(
    metrics: Arc<Metrics>,
    addr: impl Into<SocketAddr>,
) -> Result<SocketAddr, warp::Error> {
    let (addr, server) = warp::serve(prometheus_metric(metrics)).try_bind_ephemeral(addr)?;
    tokio::spawn(server);
    Ok(addr)
}
