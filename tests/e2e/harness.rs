//! Test harness that assembles a service over counting collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use bytes::Bytes;
use fingerprint_verifier::audit::MemoryAuditSink;
use fingerprint_verifier::cache::{CacheBackend, MemoryCache};
use fingerprint_verifier::dispatch::ScoringDispatcher;
use fingerprint_verifier::store::MemoryStore;
use fingerprint_verifier::{
    CandidateMinutiae, Error, IdentityKey, Minutia, Result, Service, ServiceBuilder,
    ServiceConfig, StoreKey, VerificationOutcome, VerificationRequest,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache backend wrapper counting every call.
pub struct CountingCache {
    inner: Arc<dyn CacheBackend>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl CountingCache {
    fn new(inner: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CacheBackend for CountingCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, payload, ttl).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Cache backend that fails every call.
pub struct FailingCache;

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
        Err(Error::Cache("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _payload: Bytes, _ttl: Duration) -> Result<()> {
        Err(Error::Cache("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<()> {
        Err(Error::Cache("connection refused".to_string()))
    }
}

/// Scoring dispatcher that records every comparison it receives.
#[derive(Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<(Vec<Minutia>, Vec<Minutia>)>>,
}

impl RecordingDispatcher {
    /// Comparisons received so far.
    pub fn calls(&self) -> Vec<(Vec<Minutia>, Vec<Minutia>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ScoringDispatcher for RecordingDispatcher {
    async fn compare(
        &self,
        candidate: &[Minutia],
        reference: &[Minutia],
    ) -> Result<VerificationOutcome> {
        self.calls
            .lock()
            .push((candidate.to_vec(), reference.to_vec()));
        Ok(VerificationOutcome {
            success: true,
            payload: json!({ "match": candidate == reference }),
        })
    }
}

/// Harness options.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Expiry of written-back cache entries.
    pub cache_ttl_secs: u64,
    /// Replace the cache with one that fails every call.
    pub failing_cache: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            failing_cache: false,
        }
    }
}

/// A service plus handles on every collaborator.
pub struct TestHarness {
    service: Service,
    /// The memory cache behind the counting wrapper.
    pub cache: MemoryCache,
    counting: Arc<CountingCache>,
    /// The reference store.
    pub store: MemoryStore,
    /// The scoring engine stand-in.
    pub dispatcher: Arc<RecordingDispatcher>,
    /// Audit records of every request.
    pub audit: MemoryAuditSink,
}

impl TestHarness {
    /// Harness with default options.
    pub async fn setup() -> Self {
        Self::setup_with_config(HarnessConfig::default()).await
    }

    /// Harness with custom options.
    pub async fn setup_with_config(config: HarnessConfig) -> Self {
        let cache = MemoryCache::new();
        let backend: Arc<dyn CacheBackend> = if config.failing_cache {
            Arc::new(FailingCache)
        } else {
            Arc::new(cache.clone())
        };
        let counting = Arc::new(CountingCache::new(backend));
        let store = MemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let audit = MemoryAuditSink::new();

        let mut service_config = ServiceConfig::default();
        service_config.cache.ttl_secs = config.cache_ttl_secs;

        let service = ServiceBuilder::new(service_config)
            .with_cache(counting.clone())
            .with_store(Arc::new(store.clone()))
            .with_dispatcher(dispatcher.clone())
            .with_audit_sink(Arc::new(audit.clone()))
            .build()
            .await
            .expect("Failed to build service");

        Self {
            service,
            cache,
            counting,
            store,
            dispatcher,
            audit,
        }
    }

    /// The assembled service.
    pub const fn service(&self) -> &Service {
        &self.service
    }

    /// Insert a raw store document for `subject`.
    pub fn seed(&self, subject: u64, document: Value) {
        self.store.insert(
            StoreKey {
                subject,
                modality: None,
            },
            document,
        );
    }

    /// Cache `get` calls made so far.
    pub fn cache_gets(&self) -> usize {
        self.counting.gets.load(Ordering::SeqCst)
    }

    /// Cache `set` calls made so far.
    pub fn cache_sets(&self) -> usize {
        self.counting.sets.load(Ordering::SeqCst)
    }

    /// Store lookups made so far.
    pub fn store_lookups(&self) -> u64 {
        self.store.lookups()
    }

    /// Scoring comparisons made so far.
    pub fn dispatches(&self) -> usize {
        self.dispatcher.calls().len()
    }
}

/// The reference document from the canonical scenario.
pub fn reference_document() -> Value {
    json!({
        "cedula": 1_234_567_890,
        "dedo": "index",
        "minutiae": [{"x": 10, "y": 20, "angle": 45, "type": "ending"}],
    })
}

/// A single-candidate request.
pub fn request(subject: &str, modality: &str) -> VerificationRequest {
    VerificationRequest::new(
        IdentityKey::new(subject, Some(modality.to_string())),
        CandidateMinutiae::Single(vec![Minutia::new(10, 20, 45, "ending")]),
    )
}
