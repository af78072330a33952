#[cfg(test)]
mod tests {
    use common_types::Tps;
    use env_logger::Env;
    use http::StatusCode;
    use httpmock::prelude::*;
    use httpmock::Mock;
    use log::info;
    use more_asserts::assert_ge;
    use rate_source::{rate_source, ConfigSourceHandle};
    use rstest::rstest;
    use sender_metrics::Metrics;
    use serde_json::json;
    use std::sync::{Arc, Once};
    use std::time::Duration;
    use tokio::time::{sleep, Instant};
    use traffic_sender::dispatcher::FailureKind;
    use traffic_sender::http_util::serve_metrics;
    use traffic_sender::{
        Dispatcher, RateController, RateReader, RefreshMode, WorkerClient, WorkloadGenerator,
    };

    const TPS_KEY: &str = "config/tps";
    const CALCULATE_PATH: &str = "/calculate";
    const METRICS_PATH: &str = "/metrics";
    const REFRESH_INTERVAL: Duration = Duration::from_secs(60);
    const DEFAULT: Tps = Tps::new(1.0);

    static ONCE: Once = Once::new();
    fn init_logger() {
        ONCE.call_once(|| {
            env_logger::Builder::from_env(Env::default().default_filter_or("info"))
                .format_timestamp_millis()
                .init();
        });
    }

    fn kv_path() -> String {
        format!("/v1/kv/{}", TPS_KEY)
    }

    fn consul_mock<'a>(consul: &'a MockServer, raw: &str) -> Mock<'a> {
        consul.mock(|when, then| {
            when.method(GET).path(kv_path());
            then.status(200).body(raw);
        })
    }

    fn consul_handle(consul: &MockServer) -> ConfigSourceHandle {
        ConfigSourceHandle::new(consul.host(), consul.port(), TPS_KEY)
            .with_timeout(Duration::from_millis(500))
    }

    fn dispatcher(rate: RateReader, worker: &MockServer, metrics: Arc<Metrics>) -> Dispatcher {
        let uri = worker.url(CALCULATE_PATH).parse().unwrap();
        Dispatcher::new(
            rate,
            DEFAULT,
            WorkloadGenerator::default(),
            WorkerClient::new(uri, Duration::from_secs(2)),
            metrics,
        )
    }

    async fn controller_for(consul: &MockServer, metrics: Arc<Metrics>) -> RateController {
        let source = rate_source(Some(consul_handle(consul)), DEFAULT);
        let mut controller = RateController::new(source, REFRESH_INTERVAL, metrics);
        controller.initialize().await;
        controller
    }

    #[rstest]
    #[case::four_per_second("4", 4.0, 250)]
    #[case::fractional("0.5", 0.5, 2_000)]
    #[case::padded(" 10\n", 10.0, 100)]
    #[case::zero("0", 1.0, 1_000)]
    #[case::negative("-2", 1.0, 1_000)]
    #[case::not_a_number("fast", 1.0, 1_000)]
    #[tokio::test]
    async fn rate_from_consul_sets_delay(
        #[case] raw: &str,
        #[case] expected: f64,
        #[case] delay_ms: u64,
    ) {
        init_logger();
        let consul = MockServer::start_async().await;
        let worker = MockServer::start_async().await;
        let kv = consul_mock(&consul, raw);
        let metrics = Arc::new(Metrics::new().unwrap());

        let controller = controller_for(&consul, metrics.clone()).await;
        kv.assert();
        let dynamic = RefreshMode::Dynamic {
            interval: REFRESH_INTERVAL,
        };
        assert_eq!(controller.mode(), dynamic);
        assert_eq!(controller.current(), Tps::new(expected));
        assert_eq!(metrics.current_tps(), expected);

        let dispatcher = dispatcher(controller.reader(), &worker, metrics);
        assert_eq!(dispatcher.next_delay(), Duration::from_millis(delay_ms));
    }

    #[tokio::test]
    async fn refresh_picks_up_new_rate() {
        init_logger();
        let consul = MockServer::start_async().await;
        let worker = MockServer::start_async().await;
        let mut kv = consul_mock(&consul, "4");
        let metrics = Arc::new(Metrics::new().unwrap());

        let mut controller = controller_for(&consul, metrics.clone()).await;
        let dispatcher = dispatcher(controller.reader(), &worker, metrics.clone());
        assert_eq!(dispatcher.next_delay(), Duration::from_millis(250));

        kv.delete();
        let kv = consul_mock(&consul, "2");
        let start = Instant::now();
        assert!(!controller.maybe_refresh(start).await);
        assert!(controller.maybe_refresh(start + REFRESH_INTERVAL).await);
        kv.assert();

        assert_eq!(dispatcher.current_rate(), Tps::new(2.0));
        assert_eq!(dispatcher.next_delay(), Duration::from_millis(500));
        assert_eq!(metrics.current_tps(), 2.0);
    }

    #[tokio::test]
    async fn missing_key_uses_default() {
        init_logger();
        let consul = MockServer::start_async().await;
        let kv = consul.mock(|when, then| {
            when.method(GET).path(kv_path());
            then.status(404);
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        let controller = controller_for(&consul, metrics.clone()).await;
        kv.assert();
        assert_eq!(controller.current(), DEFAULT);
        assert_eq!(metrics.current_tps(), 1.0);
    }

    #[tokio::test]
    async fn unreachable_consul_uses_default() {
        init_logger();
        let port = portpicker::pick_unused_port().unwrap();
        let handle = ConfigSourceHandle::new("127.0.0.1", port, TPS_KEY)
            .with_timeout(Duration::from_millis(500));
        let metrics = Arc::new(Metrics::new().unwrap());
        let mut controller = RateController::new(
            rate_source(Some(handle), Tps::new(3.0)),
            REFRESH_INTERVAL,
            metrics.clone(),
        );
        assert_eq!(controller.initialize().await, Tps::new(3.0));
        assert_eq!(metrics.current_tps(), 3.0);
    }

    #[tokio::test]
    async fn answer_is_reported() {
        init_logger();
        let consul = MockServer::start_async().await;
        let worker = MockServer::start_async().await;
        consul_mock(&consul, "4");
        let calculate = worker.mock(|when, then| {
            when.method(POST)
                .path(CALCULATE_PATH)
                .header("content-type", "application/json");
            then.status(200)
                .json_body(json!({"answer": "42", "time_ms": 1.5}));
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        let controller = controller_for(&consul, metrics.clone()).await;
        let dispatcher = dispatcher(controller.reader(), &worker, metrics.clone());

        let tick = dispatcher.tick().await;
        calculate.assert();
        info!("{} -> {:?}", &tick.item, &tick.outcome);
        let reply = tick.outcome.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.answer.to_string(), "42");
        assert_eq!(reply.reported, Some(Duration::from_micros(1_500)));
        assert_eq!(tick.delay, Duration::from_millis(250));
        assert_eq!(metrics.requests_sent(), 1);
        assert_eq!(metrics.status_count("200"), 1);
    }

    #[tokio::test]
    async fn worker_error_keeps_rate() {
        init_logger();
        let consul = MockServer::start_async().await;
        let worker = MockServer::start_async().await;
        consul_mock(&consul, "4");
        let calculate = worker.mock(|when, then| {
            when.method(POST).path(CALCULATE_PATH);
            then.status(500).body("Internal error");
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        let controller = controller_for(&consul, metrics.clone()).await;
        let dispatcher = dispatcher(controller.reader(), &worker, metrics.clone());

        for _ in 0..3 {
            let tick = dispatcher.tick().await;
            let err = tick.outcome.unwrap_err();
            assert_eq!(err.kind(), FailureKind::Application);
            assert_eq!(err.status_label(), "500");
        }
        calculate.assert_hits(3);
        assert_eq!(metrics.status_count("500"), 3);
        assert_eq!(metrics.requests_sent(), 3);
        assert_eq!(metrics.current_tps(), 4.0);
        assert_eq!(dispatcher.next_delay(), Duration::from_millis(250));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn metrics_are_scraped_while_dispatcher_sleeps() {
        init_logger();
        let worker = MockServer::start_async().await;
        worker.mock(|when, then| {
            when.method(POST).path(CALCULATE_PATH);
            then.status(200).json_body(json!({"answer": "3"}));
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.tps(0.5);
        let addr = serve_metrics(metrics.clone(), ([127, 0, 0, 1], 0)).unwrap();
        let dispatcher = dispatcher(RateReader::fixed(Tps::new(0.5)), &worker, metrics.clone());
        let handle = tokio::spawn(dispatcher.run());

        // first tick goes out right away, the next one is two seconds later
        sleep(Duration::from_millis(500)).await;
        let url = format!("http://{}{}", addr, METRICS_PATH);
        let started = std::time::Instant::now();
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body = response.text().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        assert!(body.contains("traffic_sender_tps 0.5"), "{}", body);
        assert!(body.contains("upstream_request_count 1"), "{}", body);
        assert!(
            body.contains(r#"upstream_request_status_count{status="200"} 1"#),
            "{}",
            body
        );
        assert_ge!(metrics.requests_sent(), 1);
        handle.abort();
    }
}
