//! End-to-end tests through the HTTP binding.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use deferred_response::config::{RoutePolicy, ServiceConfig};
use deferred_response::deferred::{SuspendPolicy, TimeUnit};
use deferred_response::http::response::{CANCELLED_BODY, TIMED_OUT_BODY};
use deferred_response::http::X_REQUEST_ID;

mod common;

fn config_with_route(name: &str, timeout_ms: u64) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.routes.push(RoutePolicy {
        name: name.to_string(),
        policy: SuspendPolicy::new(timeout_ms, TimeUnit::Milliseconds),
    });
    config
}

#[tokio::test]
async fn test_worker_result_is_returned() {
    let server = common::start_server(ServiceConfig::default()).await;
    let client = common::client();

    let res = client
        .get(server.url("/deferred/any?delay_ms=20&value=hello"))
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(X_REQUEST_ID).is_some());
    assert_eq!(res.text().await.unwrap(), "hello");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_worker_failure_maps_to_500() {
    let server = common::start_server(ServiceConfig::default()).await;
    let res = common::client()
        .get(server.url("/deferred/any?fail=true&value=disk%20full"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text().await.unwrap(), "disk full");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_route_policy_times_out() {
    let server = common::start_server(config_with_route("slow", 100)).await;

    let start = Instant::now();
    let res = common::client()
        .get(server.url("/deferred/slow?delay_ms=5000"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), TIMED_OUT_BODY);
    assert!(start.elapsed() < Duration::from_secs(3));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_programmatic_timeout_overrides_route_policy() {
    let server = common::start_server(config_with_route("slow", 50)).await;

    let res = common::client()
        .get(server.url("/deferred/slow?delay_ms=200&timeout_ms=5000&value=late-but-fine"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "late-but-fine");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_cancel_in_flight_response() {
    let server = common::start_server(ServiceConfig::default()).await;
    let client = common::client();

    let url = server.url("/deferred/any?delay_ms=8000");
    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.get(url).send().await.unwrap() }
    });

    let ids = common::wait_for_pending(&server, 1).await;
    let id = ids[0];

    let res = client
        .post(server.url(&format!("/deferred/{id}/cancel")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let res = pending.await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.headers()[X_REQUEST_ID].to_str().unwrap(),
        id.to_string()
    );
    assert_eq!(res.text().await.unwrap(), CANCELLED_BODY);

    // Resolved responses leave the registry.
    let res = client
        .post(server.url(&format!("/deferred/{id}/cancel")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_responses() {
    let server = common::start_server(ServiceConfig::default()).await;
    let client = common::client();

    let pending: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            let url = server.url("/deferred/any?delay_ms=8000");
            tokio::spawn(async move { client.get(url).send().await.unwrap() })
        })
        .collect();
    common::wait_for_pending(&server, 3).await;

    server.shutdown.trigger();

    for handle in pending {
        let res = handle.await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.text().await.unwrap(), CANCELLED_BODY);
    }

    let stopped = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server must stop after shutdown");
    assert!(stopped.unwrap().is_ok());
}

#[tokio::test]
async fn test_reloaded_policies_apply_to_new_requests() {
    let server = common::start_server(ServiceConfig::default()).await;
    let client = common::client();

    server.config_tx.send(config_with_route("reloaded", 50)).unwrap();

    let mut routes: Vec<String> = Vec::new();
    for _ in 0..100 {
        let status: serde_json::Value = client
            .get(server.url("/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        routes = serde_json::from_value(status["routes"].clone()).unwrap();
        if !routes.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(routes, vec!["reloaded".to_string()]);

    let res = client
        .get(server.url("/deferred/reloaded?delay_ms=5000"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text().await.unwrap(), TIMED_OUT_BODY);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_client_disconnect_cancels_response() {
    let mut config = ServiceConfig::default();
    config.timeouts.default_secs = None;
    let server = common::start_server(config).await;

    let impatient = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let res = impatient
        .get(server.url("/deferred/any?delay_ms=600000"))
        .send()
        .await;
    assert!(res.unwrap_err().is_timeout());

    let client = common::client();
    let mut in_flight = usize::MAX;
    for _ in 0..200 {
        let status: serde_json::Value = client
            .get(server.url("/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        in_flight = status["in_flight"].as_u64().unwrap() as usize;
        if in_flight == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(in_flight, 0, "abandoned response must leave the registry");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_large_default_window_does_not_wrap() {
    let mut config = ServiceConfig::default();
    config.timeouts.default_secs = Some(18_446_744_073_709_552);
    let server = common::start_server(config).await;

    let res = common::client()
        .get(server.url("/deferred/any?delay_ms=1000&value=slow-but-fine"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "slow-but-fine");

    server.shutdown.trigger();
}
