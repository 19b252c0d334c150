//! Tests for the HTTP endpoints.

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::Config;

/// Start a server on `port` pointed at `brokers`; returns the shutdown
/// controller so tests can stop it.
fn start_server(port: u16, brokers: &str) -> ShutdownController {
    let config = Config {
        port: i32::from(port),
        kafka_brokers: brokers.to_string(),
        kafka_timeout_secs: 2,
    };
    let metrics = create_metrics().expect("metrics registry");
    let state = AppState {
        config: Arc::new(config),
        metrics,
    };
    let (controller, signal) = shutdown_channel();
    tokio::spawn(async move { run_server(port, state, signal).await });
    controller
}

/// Wait for the server to accept requests, with retry and backoff.
async fn wait_for_server(port: u16, max_retries: u32) -> reqwest::Client {
    let client = reqwest::Client::new();
    let mut delay = Duration::from_millis(10);

    for attempt in 1..=max_retries {
        match client
            .get(format!("http://127.0.0.1:{}/healthz", port))
            .timeout(Duration::from_millis(200))
            .send()
            .await
        {
            Ok(_) => return client,
            Err(_) if attempt < max_retries => {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_millis(200));
            }
            Err(e) => panic!("server not ready after {} attempts: {}", max_retries, e),
        }
    }
    client
}

/// Test that /healthz answers 200 with body OK
#[tokio::test]
async fn test_healthz_returns_ok() {
    let port = 19180;
    let controller = start_server(port, "kafka:9092");
    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/healthz", port))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("body"), "OK");

    controller.shutdown();
}

/// Test that /readiness answers 200 with body OK even though no Kafka
/// broker is reachable
#[tokio::test]
async fn test_readiness_ok_without_kafka() {
    let port = 19181;
    let controller = start_server(port, "127.0.0.1:9");
    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/readiness", port))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.expect("body"), "OK");

    controller.shutdown();
}

/// Test that / reports the client-creation failure inline when no broker
/// is reachable, with status 200 and a text/plain body
#[tokio::test]
async fn test_status_reports_connect_failure_inline() {
    let port = 19182;
    // Port 9 (discard) refuses connections immediately.
    let controller = start_server(port, "127.0.0.1:9");
    let client = wait_for_server(port, 10).await;

    let response = client
        .get(format!("http://127.0.0.1:{}/", port))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(
        content_type.starts_with("text/plain"),
        "unexpected content type {content_type}"
    );

    let body = response.text().await.expect("body");
    assert!(
        body.starts_with("create kafka client failed:"),
        "got body:\n{body}"
    );
    assert!(!body.contains("Brokers:"));

    controller.shutdown();
}

/// Test that /metrics exposes the namespaced metric families after a
/// request has been recorded
#[tokio::test]
async fn test_metrics_exposition() {
    let port = 19183;
    let controller = start_server(port, "kafka:9092");
    let client = wait_for_server(port, 10).await;

    // The wait_for_server probe already pushed a /healthz sample through
    // the middleware.
    let response = client
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("body");
    assert!(
        body.contains("kafka_status_http_requests_total"),
        "got:\n{body}"
    );

    controller.shutdown();
}

/// Test that triggering shutdown lets the server task finish cleanly
#[tokio::test]
async fn test_graceful_shutdown_completes() {
    let port = 19184;
    let config = Config {
        port: i32::from(port),
        kafka_brokers: "kafka:9092".to_string(),
        kafka_timeout_secs: 2,
    };
    let state = AppState {
        config: Arc::new(config),
        metrics: create_metrics().expect("metrics registry"),
    };
    let (controller, signal) = shutdown_channel();
    let handle = tokio::spawn(run_server(port, state, signal));

    wait_for_server(port, 10).await;
    controller.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop in time")
        .expect("server task panicked");
    assert!(result.is_ok(), "server returned error: {result:?}");
}
