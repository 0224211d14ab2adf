//! Cache-aside verification orchestrator.
//!
//! The [`Verifier`] resolves a reference record for an identity key and
//! dispatches the caller's candidate minutiae against it:
//!
//! ```text
//! START ─▶ CACHE_LOOKUP ─┬─ hit ──────────────────────────────┐
//!                        │                                    │
//!                        └─ miss/error ─▶ STORE_LOOKUP ─┬─ found ─▶ CACHE_WRITEBACK ─┤
//!                                                       │                            │
//!                                                       └─ none ─▶ FAILED (404)      ▼
//!                                                                               DISPATCH ─▶ DONE
//! ```
//!
//! Cache failures are advisory and never fail a request. Store and scoring
//! failures are terminal and classified as upstream unavailability. Each
//! stage emits one [`AuditRecord`] carrying the request's trace id.

use crate::audit::{AuditLevel, AuditRecord, AuditSink, Stage};
use crate::cache::{CacheClient, CacheLookup, CacheWrite, DEFAULT_TTL};
use crate::dispatch::ScoringDispatcher;
use crate::error::{Error, FailureKind, Result, VerificationError};
use crate::store::DurableStore;
use crate::types::{
    IdentityKey, Minutia, RecordSource, ReferenceRecord, StoreKey, TraceContext,
    VerificationOutcome, VerificationRequest, VerificationResponse,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default number of comparisons of one request in flight at once.
pub const DEFAULT_MAX_CONCURRENT_DISPATCHES: usize = 8;

/// How the durable store is keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    /// One record per subject; the modality is checked against the record.
    #[default]
    Subject,
    /// One record per subject and modality.
    Composite,
}

impl KeyScheme {
    /// Build the store key for a validated subject number.
    #[must_use]
    pub fn store_key(self, subject: u64, key: &IdentityKey) -> StoreKey {
        match self {
            Self::Subject => StoreKey {
                subject,
                modality: None,
            },
            Self::Composite => StoreKey {
                subject,
                modality: key.modality().map(str::to_string),
            },
        }
    }
}

/// Tuning for the [`Verifier`].
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Expiry applied to written-back cache entries.
    pub cache_ttl: Duration,
    /// Bound on a single store lookup.
    pub store_timeout: Duration,
    /// Bound on a single scoring dispatch.
    pub dispatch_timeout: Duration,
    /// Comparisons of one request in flight at once.
    pub max_concurrent_dispatches: usize,
    /// Store key shape.
    pub key_scheme: KeyScheme,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            store_timeout: Duration::from_secs(2),
            dispatch_timeout: Duration::from_secs(10),
            max_concurrent_dispatches: DEFAULT_MAX_CONCURRENT_DISPATCHES,
            key_scheme: KeyScheme::Subject,
        }
    }
}

/// Counters describing how requests were served.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifierStats {
    /// Reference records served from the cache.
    pub cache_hits: u64,
    /// Cache lookups that found nothing.
    pub cache_misses: u64,
    /// Cache lookups that failed, timed out or returned garbage.
    pub cache_errors: u64,
    /// Store lookups that found a usable record.
    pub store_hits: u64,
    /// Store lookups that ended in not-found.
    pub store_misses: u64,
    /// Successful cache write-backs.
    pub writebacks: u64,
    /// Failed cache write-backs.
    pub writeback_failures: u64,
    /// Scoring dispatches that produced an outcome.
    pub dispatches: u64,
    /// Scoring dispatches that failed.
    pub dispatch_failures: u64,
}

impl VerifierStats {
    /// Percentage of resolved records served from the cache.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.store_hits;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }
}

struct Resolved {
    record: ReferenceRecord,
    source: RecordSource,
}

/// Orchestrates cache, store and scoring engine for one verification.
pub struct Verifier {
    cache: CacheClient,
    store: Arc<dyn DurableStore>,
    dispatcher: Arc<dyn ScoringDispatcher>,
    audit: Arc<dyn AuditSink>,
    config: VerifierConfig,
    stats: RwLock<VerifierStats>,
}

impl Verifier {
    /// Create a verifier over its collaborators.
    #[must_use]
    pub fn new(
        cache: CacheClient,
        store: Arc<dyn DurableStore>,
        dispatcher: Arc<dyn ScoringDispatcher>,
        audit: Arc<dyn AuditSink>,
        config: VerifierConfig,
    ) -> Self {
        info!(
            key_scheme = ?config.key_scheme,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "Creating verifier"
        );
        Self {
            cache,
            store,
            dispatcher,
            audit,
            config,
            stats: RwLock::new(VerifierStats::default()),
        }
    }

    /// The verifier configuration.
    #[must_use]
    pub const fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// The cache client, for health probing.
    #[must_use]
    pub const fn cache(&self) -> &CacheClient {
        &self.cache
    }

    /// Snapshot of the request counters.
    #[must_use]
    pub fn stats(&self) -> VerifierStats {
        self.stats.read().clone()
    }

    /// Verify candidate minutiae against the stored reference for a key.
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] classified as:
    ///
    /// - [`FailureKind::InvalidInput`] if the subject identifier is not
    ///   numeric or no candidate set was supplied (no downstream call is made)
    /// - [`FailureKind::NotFound`] if no usable reference record exists
    /// - [`FailureKind::UpstreamUnavailable`] if the store or the scoring
    ///   engine failed
    pub async fn verify(
        &self,
        request: VerificationRequest,
    ) -> std::result::Result<VerificationResponse, VerificationError> {
        let trace = TraceContext::new();
        let trace_id = trace.trace_id();
        let started = Instant::now();

        self.emit(
            AuditRecord::new(trace_id, Stage::Start, "accepted")
                .with("identity", request.key.to_string())
                .with("candidates", request.candidates.len()),
        )
        .await;

        let (cache_key, store_key) = match self.validate(&request) {
            Ok(keys) => keys,
            Err(e) => {
                return Err(self
                    .fail(trace_id, FailureKind::InvalidInput, &e, started)
                    .await)
            }
        };

        let resolved = match self.resolve(trace_id, &cache_key, &store_key, &request.key).await {
            Ok(resolved) => resolved,
            Err((kind, e)) => return Err(self.fail(trace_id, kind, &e, started).await),
        };

        let outcomes = match self
            .dispatch_all(trace_id, &request, &resolved.record.minutiae)
            .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                return Err(self
                    .fail(trace_id, FailureKind::UpstreamUnavailable, &e, started)
                    .await)
            }
        };

        self.emit(
            AuditRecord::new(trace_id, Stage::Done, "dispatched")
                .duration(started.elapsed())
                .with("source", resolved.source.as_str())
                .with("outcomes", outcomes.len()),
        )
        .await;

        Ok(VerificationResponse {
            trace_id,
            source: resolved.source,
            outcomes,
        })
    }

    /// Check the request and derive its cache and store keys.
    fn validate(&self, request: &VerificationRequest) -> Result<(String, StoreKey)> {
        let subject = request.key.subject_number()?;
        if request.candidates.is_empty() {
            return Err(Error::InvalidInput(
                "at least one candidate minutiae set is required".to_string(),
            ));
        }
        if self.config.key_scheme == KeyScheme::Composite && request.key.modality().is_none() {
            return Err(Error::InvalidInput(
                "a modality is required for composite store keys".to_string(),
            ));
        }
        Ok((
            request.key.cache_key()?,
            self.config.key_scheme.store_key(subject, &request.key),
        ))
    }

    /// Resolve the reference record: cache first, then store with write-back.
    async fn resolve(
        &self,
        trace_id: Uuid,
        cache_key: &str,
        store_key: &StoreKey,
        identity: &IdentityKey,
    ) -> std::result::Result<Resolved, (FailureKind, Error)> {
        if let Some(record) = self.lookup_cache(trace_id, cache_key).await {
            return Ok(Resolved {
                record,
                source: RecordSource::Cache,
            });
        }

        let record = self.lookup_store(trace_id, store_key, identity).await?;
        self.write_back(trace_id, cache_key, &record).await;

        Ok(Resolved {
            record,
            source: RecordSource::Store,
        })
    }

    async fn lookup_cache(&self, trace_id: Uuid, cache_key: &str) -> Option<ReferenceRecord> {
        let start = Instant::now();
        let lookup = self.cache.get(cache_key).await;
        let elapsed = start.elapsed();

        let (found, outcome, cause) = match lookup {
            CacheLookup::Hit(payload) => match serde_json::from_slice::<ReferenceRecord>(&payload) {
                Ok(record) => (Some(record), "hit", None),
                Err(e) => {
                    warn!(cache_key = %cache_key, error = %e, "Undecodable cache entry, treating as miss");
                    (None, "error", Some(format!("undecodable cache entry: {e}")))
                }
            },
            CacheLookup::Miss => (None, "miss", None),
            CacheLookup::Error(cause) => (None, "error", Some(cause)),
        };

        {
            let mut stats = self.stats.write();
            match outcome {
                "hit" => stats.cache_hits += 1,
                "miss" => stats.cache_misses += 1,
                _ => stats.cache_errors += 1,
            }
        }

        let mut record = AuditRecord::new(trace_id, Stage::CacheLookup, outcome)
            .duration(elapsed)
            .with("cache_key", cache_key);
        if let Some(cause) = cause {
            record = record.level(AuditLevel::Warn).with("error", cause);
        }
        self.emit(record).await;

        debug!(cache_key = %cache_key, outcome, "Cache lookup finished");
        found
    }

    async fn lookup_store(
        &self,
        trace_id: Uuid,
        store_key: &StoreKey,
        identity: &IdentityKey,
    ) -> std::result::Result<ReferenceRecord, (FailureKind, Error)> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.config.store_timeout, self.store.get(store_key))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Store(format!(
                "store lookup timed out after {:?}",
                self.config.store_timeout
            ))),
        };
        let elapsed = start.elapsed();

        let base = AuditRecord::new(trace_id, Stage::StoreLookup, "")
            .duration(elapsed)
            .with("identity", identity.to_string());

        match result {
            Ok(Some(record)) if record.matches(identity.modality()) => {
                self.stats.write().store_hits += 1;
                self.emit(AuditRecord {
                    outcome: "found".to_string(),
                    ..base
                })
                .await;
                Ok(record)
            }
            Ok(Some(record)) => {
                self.stats.write().store_misses += 1;
                let reason = if record.minutiae.is_empty() {
                    "empty_minutiae"
                } else {
                    "modality_mismatch"
                };
                self.emit(
                    AuditRecord {
                        outcome: reason.to_string(),
                        ..base
                    }
                    .level(AuditLevel::Warn),
                )
                .await;
                Err((
                    FailureKind::NotFound,
                    Error::Store(format!("reference record for {identity} is unusable: {reason}")),
                ))
            }
            Ok(None) => {
                self.stats.write().store_misses += 1;
                self.emit(
                    AuditRecord {
                        outcome: "not_found".to_string(),
                        ..base
                    }
                    .level(AuditLevel::Warn),
                )
                .await;
                Err((
                    FailureKind::NotFound,
                    Error::Store(format!("no reference record for {identity}")),
                ))
            }
            Err(e) => {
                self.emit(
                    AuditRecord {
                        outcome: "error".to_string(),
                        ..base
                    }
                    .level(AuditLevel::Error)
                    .with("error", e.to_string()),
                )
                .await;
                Err((FailureKind::UpstreamUnavailable, e))
            }
        }
    }

    async fn write_back(&self, trace_id: Uuid, cache_key: &str, record: &ReferenceRecord) {
        let start = Instant::now();
        let write = match serde_json::to_vec(record) {
            Ok(payload) => {
                self.cache
                    .set(cache_key, Bytes::from(payload), self.config.cache_ttl)
                    .await
            }
            Err(e) => CacheWrite::Failed(format!("failed to encode reference record: {e}")),
        };

        let mut audit = AuditRecord::new(trace_id, Stage::CacheWriteback, "")
            .duration(start.elapsed())
            .with("cache_key", cache_key)
            .with("ttl_secs", self.config.cache_ttl.as_secs());
        match write {
            CacheWrite::Stored => {
                self.stats.write().writebacks += 1;
                audit.outcome = "stored".to_string();
            }
            CacheWrite::Failed(cause) => {
                self.stats.write().writeback_failures += 1;
                audit.outcome = "failed".to_string();
                audit = audit.level(AuditLevel::Warn).with("error", cause);
            }
        }
        self.emit(audit).await;
    }

    /// Dispatch candidate sets concurrently, at most
    /// `max_concurrent_dispatches` at a time, keeping request order.
    async fn dispatch_all(
        &self,
        trace_id: Uuid,
        request: &VerificationRequest,
        reference: &[Minutia],
    ) -> Result<Vec<VerificationOutcome>> {
        let sets = request.candidates.sets();
        let limit = self.config.max_concurrent_dispatches.max(1);
        let results: Vec<_> = stream::iter(sets.iter().map(|candidate| async move {
            let start = Instant::now();
            let result = match tokio::time::timeout(
                self.config.dispatch_timeout,
                self.dispatcher.compare(candidate, reference),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Dispatch(format!(
                    "scoring dispatch timed out after {:?}",
                    self.config.dispatch_timeout
                ))),
            };
            (result, start.elapsed())
        }))
        .buffered(limit)
        .collect()
        .await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (index, (result, elapsed)) in results.into_iter().enumerate() {
            let audit = AuditRecord::new(trace_id, Stage::Dispatch, "")
                .duration(elapsed)
                .with("candidate", index);
            match result {
                Ok(outcome) => {
                    self.stats.write().dispatches += 1;
                    let label = if outcome.success { "success" } else { "rejected" };
                    self.emit(AuditRecord {
                        outcome: label.to_string(),
                        ..audit
                    })
                    .await;
                    outcomes.push(outcome);
                }
                Err(e) => {
                    self.stats.write().dispatch_failures += 1;
                    self.emit(
                        AuditRecord {
                            outcome: "error".to_string(),
                            ..audit
                        }
                        .level(AuditLevel::Error)
                        .with("error", e.to_string()),
                    )
                    .await;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    async fn fail(
        &self,
        trace_id: Uuid,
        kind: FailureKind,
        cause: &Error,
        started: Instant,
    ) -> VerificationError {
        let level = match kind {
            FailureKind::UpstreamUnavailable => AuditLevel::Error,
            FailureKind::NotFound | FailureKind::InvalidInput => AuditLevel::Warn,
        };
        self.emit(
            AuditRecord::new(trace_id, Stage::Failed, kind.to_string())
                .level(level)
                .duration(started.elapsed())
                .with("error", cause.to_string()),
        )
        .await;

        VerificationError::new(trace_id, kind, cause.to_string())
    }

    async fn emit(&self, record: AuditRecord) {
        if let Err(e) = self.audit.record(&record).await {
            warn!(
                trace_id = %record.trace_id,
                stage = %record.stage,
                error = %e,
                "Audit record dropped"
            );
        }
    }
}
