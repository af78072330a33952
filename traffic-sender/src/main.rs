use anyhow::Context;
use log::{error, info};
use rate_source::rate_source;
use sender_metrics::Metrics;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use traffic_sender::http_util::serve_metrics;
use traffic_sender::{Dispatcher, RateController, SenderConfig, WorkerClient, WorkloadGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    //init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SenderConfig::from_env()?;
    info!("Worker URL: {}", &config.worker_url);
    match &config.config_source {
        Some(source) => info!(
            "Consul: {}:{}/{}, refresh every {:?}",
            &source.host, source.port, &source.key, config.refresh_interval
        ),
        None => info!("Consul host not set, TPS fixed at {}", config.default_tps),
    }

    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
    match serve_metrics(metrics.clone(), ([0, 0, 0, 0], config.metrics_port)) {
        Ok(addr) => info!("Prometheus metrics server started on {}", addr),
        Err(e) => error!("Error starting Prometheus server: {}", e),
    }

    let source = rate_source(config.config_source.clone(), config.default_tps);
    let mut controller = RateController::new(source, config.refresh_interval, metrics.clone());
    controller.initialize().await;

    let dispatcher = Dispatcher::new(
        controller.reader(),
        config.default_tps,
        WorkloadGenerator::default(),
        WorkerClient::new(config.worker_url.clone(), config.request_timeout),
        metrics,
    )
    .with_pacing(config.pacing);

    tokio::spawn(controller.run());
    dispatcher.run().await;
    Ok(())
}
