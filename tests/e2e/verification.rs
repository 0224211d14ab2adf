//! Verification flow E2E tests.
//!
//! ## Test Coverage
//!
//! - Store hit, write-back, then cache hit for the same key
//! - TTL expiry on a paused clock
//! - Degraded cache never fails a request
//! - Store miss never reaches the scoring engine
//! - Malformed subject identifiers make no calls at all
//! - Cached records stay field-equivalent to normalized store records

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{reference_document, request};
use super::{HarnessConfig, TestHarness};
use fingerprint_verifier::audit::Stage;
use fingerprint_verifier::cache::CacheBackend;
use fingerprint_verifier::{
    CandidateMinutiae, FailureKind, IdentityKey, Minutia, RecordSource, ReferenceRecord,
    VerificationRequest,
};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_first_request_hits_store_second_hits_cache() {
    let harness = TestHarness::setup().await;
    harness.seed(1_234_567_890, reference_document());

    let first = harness
        .service()
        .verify(request("1234567890", "index"))
        .await
        .unwrap();
    assert_eq!(first.source, RecordSource::Store);
    assert_eq!(first.outcomes.len(), 1);
    assert!(first.outcomes[0].success);
    assert_eq!(harness.store_lookups(), 1);
    assert_eq!(harness.cache_sets(), 1);
    assert_eq!(
        harness.audit.stages(first.trace_id),
        vec![
            Stage::Start,
            Stage::CacheLookup,
            Stage::StoreLookup,
            Stage::CacheWriteback,
            Stage::Dispatch,
            Stage::Done,
        ]
    );

    // The cache now holds the same record the store returned
    let cached = harness
        .cache
        .get("fingerprint:1234567890-index")
        .await
        .unwrap()
        .expect("record should be cached");
    let cached: ReferenceRecord = serde_json::from_slice(&cached).unwrap();
    assert_eq!(cached.minutiae, vec![Minutia::new(10, 20, 45, "ending")]);

    let second = harness
        .service()
        .verify(request("1234567890", "index"))
        .await
        .unwrap();
    assert_eq!(second.source, RecordSource::Cache);
    assert_eq!(harness.store_lookups(), 1);
    assert_eq!(harness.dispatches(), 2);
    assert_eq!(
        harness.audit.stages(second.trace_id),
        vec![Stage::Start, Stage::CacheLookup, Stage::Dispatch, Stage::Done]
    );
}

#[tokio::test(start_paused = true)]
async fn test_expired_cache_entry_falls_back_to_store() {
    let harness = TestHarness::setup_with_config(HarnessConfig {
        cache_ttl_secs: 60,
        ..HarnessConfig::default()
    })
    .await;
    harness.seed(1_234_567_890, reference_document());

    let first = harness.service().verify(request("1234567890", "index")).await.unwrap();
    assert_eq!(first.source, RecordSource::Store);

    tokio::time::advance(Duration::from_secs(59)).await;
    let cached = harness.service().verify(request("1234567890", "index")).await.unwrap();
    assert_eq!(cached.source, RecordSource::Cache);
    assert_eq!(harness.store_lookups(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    let expired = harness.service().verify(request("1234567890", "index")).await.unwrap();
    assert_eq!(expired.source, RecordSource::Store);
    assert_eq!(harness.store_lookups(), 2);
    assert_eq!(harness.cache.stats().expirations, 1);
}

#[tokio::test]
async fn test_failing_cache_never_fails_request() {
    let harness = TestHarness::setup_with_config(HarnessConfig {
        failing_cache: true,
        ..HarnessConfig::default()
    })
    .await;
    harness.seed(1_234_567_890, reference_document());

    for _ in 0..3 {
        let response = harness
            .service()
            .verify(request("1234567890", "index"))
            .await
            .unwrap();
        assert_eq!(response.source, RecordSource::Store);
        assert_eq!(response.outcomes.len(), 1);
    }
    assert_eq!(harness.store_lookups(), 3);
    assert_eq!(harness.dispatches(), 3);

    let stats = harness.service().verifier().stats();
    assert_eq!(stats.cache_errors, 3);
    assert_eq!(stats.writeback_failures, 3);
}

#[tokio::test]
async fn test_store_miss_is_not_found_with_zero_dispatches() {
    let harness = TestHarness::setup().await;

    let err = harness
        .service()
        .verify(request("1234567890", "index"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::NotFound);
    assert_eq!(err.status_code(), 404);
    assert_eq!(harness.dispatches(), 0);
    assert_eq!(harness.cache_sets(), 0);
    assert_eq!(
        harness.audit.stages(err.trace_id).last(),
        Some(&Stage::Failed)
    );
}

#[tokio::test]
async fn test_empty_reference_minutiae_is_not_found() {
    let harness = TestHarness::setup().await;
    harness.seed(77, json!({"cedula": 77, "dedo": "index", "minutiae": []}));

    let err = harness.service().verify(request("77", "index")).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::NotFound);
    assert_eq!(harness.dispatches(), 0);
}

#[tokio::test]
async fn test_bad_subject_makes_zero_calls() {
    let harness = TestHarness::setup().await;
    harness.seed(1_234_567_890, reference_document());

    let err = harness
        .service()
        .verify(request("bad-id", "index"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::InvalidInput);
    assert_eq!(err.status_code(), 400);
    assert_eq!(harness.cache_gets(), 0);
    assert_eq!(harness.cache_sets(), 0);
    assert_eq!(harness.store_lookups(), 0);
    assert_eq!(harness.dispatches(), 0);
    assert!(harness
        .audit
        .for_trace(err.trace_id)
        .iter()
        .all(|record| record.trace_id == err.trace_id));
}

#[tokio::test]
async fn test_cached_record_matches_normalized_store_record() {
    let harness = TestHarness::setup().await;
    harness.seed(
        42,
        json!({
            "cedula": 42.0,
            "dedo": "thumb",
            "quality": 5.0,
            "threshold": 5.5,
            "minutiae": [
                {"x": 10.0, "y": 20, "angle": 45.0, "type": "ending"},
                {"x": 7, "y": 3.0, "angle": 180, "type": "bifurcation"},
            ],
        }),
    );

    harness.service().verify(request("42", "thumb")).await.unwrap();
    harness.service().verify(request("42", "thumb")).await.unwrap();

    let calls = harness.dispatcher.calls();
    assert_eq!(calls.len(), 2);
    // Reference seen from the store equals the one served from the cache
    assert_eq!(calls[0].1, calls[1].1);
    assert_eq!(calls[0].1[1], Minutia::new(7, 3, 180, "bifurcation"));

    let cached = harness.cache.get("fingerprint:42-thumb").await.unwrap().unwrap();
    let cached: serde_json::Value = serde_json::from_slice(&cached).unwrap();
    assert_eq!(cached["cedula"], json!(42));
    assert!(cached["cedula"].is_i64());
    assert_eq!(cached["quality"], json!(5));
    assert!(cached["quality"].is_i64());
    assert_eq!(cached["threshold"], json!(5.5));
    assert_eq!(cached["modality"], "thumb");
}

#[tokio::test]
async fn test_multiple_candidates_are_each_dispatched() {
    let harness = TestHarness::setup().await;
    harness.seed(1_234_567_890, reference_document());

    let request = VerificationRequest::new(
        IdentityKey::new("1234567890", Some("index".to_string())),
        CandidateMinutiae::Multiple(vec![
            vec![Minutia::new(10, 20, 45, "ending")],
            vec![Minutia::new(99, 99, 0, "bifurcation")],
        ]),
    );

    let response = harness.service().verify(request).await.unwrap();
    assert_eq!(response.outcomes.len(), 2);
    assert_eq!(response.outcomes[0].payload["match"], true);
    assert_eq!(response.outcomes[1].payload["match"], false);
    assert_eq!(harness.dispatches(), 2);
}

#[tokio::test]
async fn test_trace_ids_correlate_responses_and_audit() {
    let harness = TestHarness::setup().await;
    harness.seed(1_234_567_890, reference_document());

    let ok = harness
        .service()
        .verify(request("1234567890", "index"))
        .await
        .unwrap();
    let err = harness
        .service()
        .verify(request("555", "index"))
        .await
        .unwrap_err();

    assert_ne!(ok.trace_id, err.trace_id);
    let total = harness.audit.records().len();
    let correlated =
        harness.audit.for_trace(ok.trace_id).len() + harness.audit.for_trace(err.trace_id).len();
    assert_eq!(total, correlated);
}
