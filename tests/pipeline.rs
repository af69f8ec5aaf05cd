//! Layer ordering around the admission guard.

use std::net::SocketAddr;

use reqwest::StatusCode;

use admission_gateway::http::HttpServer;

mod common;

#[tokio::test]
async fn test_rejection_carries_security_headers_and_request_id() {
    let backend = common::start_echo_backend().await;
    let (gateway, shutdown, limiter) =
        common::start_gateway_with_limiter(common::gateway_config(backend, 1, 60_000)).await;
    let client = common::client();
    let url = format!("http://{}/users", gateway);

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-content-type-options"], "nosniff");

    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()["x-frame-options"], "SAMEORIGIN");
    assert!(second.headers().contains_key("content-security-policy"));
    assert!(second.headers().contains_key("x-request-id"));

    assert_eq!(limiter.entry("127.0.0.1").unwrap().count, 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let backend = common::start_echo_backend().await;
    let (gateway, shutdown) = common::start_gateway(common::gateway_config(backend, 5, 60_000)).await;

    let res = common::client()
        .get(format!("http://{}/", gateway))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "req-123");

    shutdown.trigger();
}

#[tokio::test]
async fn test_disabled_guard_admits_everything() {
    let backend = common::start_echo_backend().await;
    let mut config = common::gateway_config(backend, 1, 60_000);
    config.rate_limit.enabled = false;
    let (gateway, shutdown, limiter) = common::start_gateway_with_limiter(config).await;
    let client = common::client();

    for _ in 0..5 {
        let res = client.get(format!("http://{}/", gateway)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert_eq!(limiter.tracked_keys(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_preflight_is_answered_without_counting() {
    let backend = common::start_echo_backend().await;
    let (gateway, shutdown, limiter) =
        common::start_gateway_with_limiter(common::gateway_config(backend, 1, 60_000)).await;

    let res = common::client()
        .request(reqwest::Method::OPTIONS, format!("http://{}/users", gateway))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(res.headers()["access-control-allow-credentials"], "true");
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert!(res.headers().contains_key("content-security-policy"));
    assert!(limiter.entry("127.0.0.1").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_unlisted_origin_gets_no_cors_headers() {
    let backend = common::start_echo_backend().await;
    let (gateway, shutdown) = common::start_gateway(common::gateway_config(backend, 5, 60_000)).await;

    let res = common::client()
        .get(format!("http://{}/", gateway))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(!res.headers().contains_key("access-control-allow-origin"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let closed: SocketAddr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (gateway, shutdown) = common::start_gateway(common::gateway_config(closed, 5, 60_000)).await;

    let res = common::client().get(format!("http://{}/", gateway)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    shutdown.trigger();
}

#[test]
fn test_invalid_limits_are_rejected() {
    let config = common::gateway_config("127.0.0.1:3000".parse().unwrap(), 0, 0);
    let err = HttpServer::new(config).err().expect("config should be rejected");
    let message = err.to_string();
    assert!(message.contains("rate_limit.limit"));
    assert!(message.contains("rate_limit.window_ms"));
}

#[test]
fn test_wildcard_origin_fails_startup_cleanly() {
    let mut config = common::gateway_config("127.0.0.1:3000".parse().unwrap(), 5, 60_000);
    config.cors.allowed_origins = vec!["*".into()];
    let err = HttpServer::new(config).err().expect("wildcard origin should be rejected");
    assert!(err.to_string().contains("'*'"));
}
