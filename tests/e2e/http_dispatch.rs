//! E2E tests against a mock scoring engine over HTTP.
//!
//! The service is built purely from configuration: memory cache, memory
//! store seeded from a file, and the HTTP dispatcher pointed at wiremock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{reference_document, request};
use fingerprint_verifier::config::AuditSinkKind;
use fingerprint_verifier::{FailureKind, RecordSource, Service, ServiceBuilder, ServiceConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn service_for(server: &MockServer) -> (Service, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("records.json");
    std::fs::write(&seed, json!([reference_document()]).to_string()).unwrap();

    let mut config = ServiceConfig::default();
    config.store.seed_file = Some(seed);
    config.dispatcher.endpoint = format!("{}/compare", server.uri());
    config.dispatcher.timeout_ms = 5_000;
    config.audit.sink = AuditSinkKind::None;

    let service = ServiceBuilder::new(config).build().await.unwrap();
    (service, dir)
}

#[tokio::test]
async fn test_scoring_engine_receives_both_sets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compare"))
        .and(body_json(json!({
            "received_minucia": [{"x": 10, "y": 20, "angle": 45, "type": "ending"}],
            "stored_minucia": [{"x": 10, "y": 20, "angle": 45, "type": "ending"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"match": true, "score": 1.0})))
        .expect(2)
        .mount(&server)
        .await;

    let (service, _dir) = service_for(&server).await;

    let first = service.verify(request("1234567890", "index")).await.unwrap();
    assert_eq!(first.source, RecordSource::Store);
    assert!(first.outcomes[0].success);
    assert_eq!(first.outcomes[0].payload["match"], true);

    let second = service.verify(request("1234567890", "index")).await.unwrap();
    assert_eq!(second.source, RecordSource::Cache);

    let body = serde_json::to_value(&second).unwrap();
    assert_eq!(body["source"], "cache");
    assert_eq!(body["trace_id"], json!(second.trace_id));
}

#[tokio::test]
async fn test_scoring_engine_failure_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let (service, _dir) = service_for(&server).await;

    let err = service
        .verify(request("1234567890", "index"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::UpstreamUnavailable);
    assert_eq!(err.status_code(), 500);
    assert!(!err.public_message(false).contains("503"));
    assert!(err.public_message(true).contains("503"));

    // The write-back already happened, so the next attempt is served from cache
    let retry = service
        .verify(request("1234567890", "index"))
        .await
        .unwrap_err();
    assert_eq!(retry.kind, FailureKind::UpstreamUnavailable);
    assert_eq!(service.verifier().stats().cache_hits, 1);
}

#[tokio::test]
async fn test_scoring_engine_rejection_is_unsuccessful_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "bad minutiae"})))
        .mount(&server)
        .await;

    let (service, _dir) = service_for(&server).await;

    let response = service.verify(request("1234567890", "index")).await.unwrap();
    assert!(!response.outcomes[0].success);
    assert_eq!(response.outcomes[0].payload["error"], "bad minutiae");
}

#[tokio::test]
async fn test_health_with_memory_cache() {
    let server = MockServer::start().await;
    let (service, _dir) = service_for(&server).await;

    let report = serde_json::to_value(service.health().await).unwrap();
    assert_eq!(report, json!({"status": "ok", "cache": "reachable"}));
}
