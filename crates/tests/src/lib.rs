//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Configuration file to running dispatcher
//! - Delivery to real local HTTP endpoints
//! - Breaker exclusion and recovery as seen by `emit`

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::create_dispatcher;

    #[tokio::test]
    async fn test_config_to_dispatcher() {
        let content = r#"
delivery_mode = "round_robin"
endpoints = ["http://127.0.0.1:1/a", "http://127.0.0.1:1/b"]
retry_limit = 2
"#;
        let options = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let dispatcher = create_dispatcher(&options).unwrap();

        assert_eq!(
            dispatcher.endpoints(),
            vec!["http://127.0.0.1:1/a", "http://127.0.0.1:1/b"]
        );
        assert_eq!(dispatcher.config().policy.limit, 2);
        dispatcher.shutdown().await;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use bytes::Bytes;
    use contracts::{Envelope, RelayOptions};
    use dispatcher::{create_dispatcher, Dispatcher, DispatcherError, Transports};
    use observability::DeliveryMetricsAggregator;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    /// Local endpoint answering every POST with `status` and `"{name}:{body}"`
    struct TestEndpoint {
        url: String,
        hits: Arc<AtomicUsize>,
    }

    impl TestEndpoint {
        async fn start(name: &'static str, status: StatusCode) -> Self {
            let hits = Arc::new(AtomicUsize::new(0));
            let router = Router::new()
                .route(
                    "/",
                    post(
                        move |State(hits): State<Arc<AtomicUsize>>, body: Bytes| async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            let mut reply = format!("{name}:").into_bytes();
                            reply.extend_from_slice(&body);
                            (status, reply)
                        },
                    ),
                )
                .with_state(Arc::clone(&hits));

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr: SocketAddr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });

            Self {
                url: format!("http://{addr}/"),
                hits,
            }
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    fn options(endpoints: &[&TestEndpoint], limit: usize, timeout: Duration) -> RelayOptions {
        RelayOptions {
            retry_limit: limit,
            retry_timeout: timeout,
            retry_window: Duration::from_secs(10),
            ..RelayOptions::with_endpoints(endpoints.iter().map(|e| e.url.clone()))
        }
    }

    fn collect(dispatcher: &Dispatcher<Transports>) -> UnboundedReceiver<Envelope> {
        let (tx, rx) = unbounded_channel();
        dispatcher.set_callback(move |envelope| {
            let _ = tx.send(envelope);
        });
        rx
    }

    async fn next(rx: &mut UnboundedReceiver<Envelope>) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for envelope")
            .expect("callback dropped")
    }

    /// Emit and wait for the single resulting envelope
    async fn round_trip(
        dispatcher: &Dispatcher<Transports>,
        rx: &mut UnboundedReceiver<Envelope>,
        payload: &'static str,
    ) -> Envelope {
        dispatcher.emit(payload).await.unwrap();
        next(rx).await
    }

    #[tokio::test]
    async fn test_round_robin_over_http() {
        let a = TestEndpoint::start("a", StatusCode::OK).await;
        let b = TestEndpoint::start("b", StatusCode::OK).await;
        let dispatcher = create_dispatcher(&options(&[&a, &b], 5, Duration::from_secs(5))).unwrap();
        let mut rx = collect(&dispatcher);

        let mut aggregator = DeliveryMetricsAggregator::new();
        for payload in ["1", "2", "3", "4"] {
            dispatcher.emit(payload).await.unwrap();
            aggregator.record_emit(true);
        }
        for _ in 0..4 {
            let envelope = next(&mut rx).await;
            assert!(envelope.is_success(), "{envelope:?}");
            aggregator.update(&envelope);
        }

        assert_eq!(a.hits(), 2);
        assert_eq!(b.hits(), 2);
        let summary = aggregator.summary();
        assert_eq!(summary.total_envelopes, 4);
        assert!((summary.success_rate - 100.0).abs() < 1e-9);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_endpoint_is_excluded() {
        let bad = TestEndpoint::start("bad", StatusCode::INTERNAL_SERVER_ERROR).await;
        let good = TestEndpoint::start("good", StatusCode::OK).await;
        let dispatcher =
            create_dispatcher(&options(&[&bad, &good], 1, Duration::from_secs(60))).unwrap();
        let mut rx = collect(&dispatcher);

        // Alternates until `bad` has failed twice.
        for payload in ["1", "2", "3", "4"] {
            let envelope = round_trip(&dispatcher, &mut rx, payload).await;
            if envelope.endpoint == bad.url.as_str() {
                let failure = envelope.failure_ref().unwrap();
                assert_eq!(failure.code, 500);
                assert!(failure.critical);
                assert!(
                    failure.message.starts_with("[ERROR] received non-200 response code 500"),
                    "{}",
                    failure.message
                );
            } else {
                assert!(envelope.is_success());
            }
        }
        assert!(!dispatcher.is_available(&bad.url));

        for payload in ["5", "6", "7"] {
            let envelope = round_trip(&dispatcher, &mut rx, payload).await;
            assert_eq!(envelope.endpoint, good.url.as_str());
        }
        assert_eq!(bad.hits(), 2);
        assert_eq!(good.hits(), 5);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].1.trip_count, 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_blocked_endpoint_recovers_after_timeout() {
        let flaky = TestEndpoint::start("flaky", StatusCode::SERVICE_UNAVAILABLE).await;
        let dispatcher =
            create_dispatcher(&options(&[&flaky], 1, Duration::from_millis(300))).unwrap();
        let mut rx = collect(&dispatcher);

        round_trip(&dispatcher, &mut rx, "1").await;
        round_trip(&dispatcher, &mut rx, "2").await;

        let err = dispatcher.emit("3").await.unwrap_err();
        assert!(matches!(err, DispatcherError::AllEndpointsUnavailable));
        assert_eq!(err.to_string(), "all endpoints are blocked due to unavailability");

        tokio::time::sleep(Duration::from_millis(400)).await;
        let envelope = round_trip(&dispatcher, &mut rx, "4").await;
        assert_eq!(envelope.failure_ref().unwrap().code, 503);
        assert_eq!(flaky.hits(), 3);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_sync_endpoints_redirects_traffic() {
        let a = TestEndpoint::start("a", StatusCode::OK).await;
        let b = TestEndpoint::start("b", StatusCode::OK).await;
        let dispatcher = create_dispatcher(&options(&[&a], 5, Duration::from_secs(5))).unwrap();
        let mut rx = collect(&dispatcher);

        round_trip(&dispatcher, &mut rx, "1").await;
        dispatcher.sync_endpoints([b.url.as_str()]);
        assert_eq!(dispatcher.endpoints(), vec![b.url.as_str()]);

        for payload in ["2", "3"] {
            let envelope = round_trip(&dispatcher, &mut rx, payload).await;
            assert_eq!(
                envelope.response().unwrap(),
                &Bytes::from(format!("b:{payload}"))
            );
        }
        assert_eq!(a.hits(), 1);
        assert_eq!(b.hits(), 2);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_envelope_wire_shape() {
        let a = TestEndpoint::start("a", StatusCode::OK).await;
        let bad = TestEndpoint::start("bad", StatusCode::BAD_GATEWAY).await;
        let dispatcher =
            create_dispatcher(&options(&[&a, &bad], 5, Duration::from_secs(5))).unwrap();
        let mut rx = collect(&dispatcher);

        let ok = serde_json::to_value(round_trip(&dispatcher, &mut rx, "x").await).unwrap();
        assert_eq!(ok["endpoint"], a.url.as_str());
        assert_eq!(ok["success"], true);
        assert!(ok["error"].is_null());
        assert!(!ok["response"].is_null());

        let failed = serde_json::to_value(round_trip(&dispatcher, &mut rx, "y").await).unwrap();
        assert_eq!(failed["success"], false);
        assert!(failed["response"].is_null());
        assert_eq!(failed["error"]["code"], 502);
        assert_eq!(failed["error"]["critical"], true);
        dispatcher.shutdown().await;
    }
}
