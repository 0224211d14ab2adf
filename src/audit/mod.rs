//! Audit trail for verification stage transitions.
//!
//! Every stage of a verification emits one [`AuditRecord`] carrying the trace
//! id, stage, outcome, elapsed time and stage-specific context. Delivery is a
//! side channel: sinks may fail, and the verifier only logs those failures.
//!
//! Available sinks:
//!
//! - [`TracingAuditSink`]: structured `tracing` events
//! - [`MemoryAuditSink`]: keeps records in memory for inspection
//! - [`DynamoAuditSink`]: writes records into a DynamoDB log table
//! - [`BackgroundAuditSink`]: queues records for any other sink on a spawned task

mod background;
mod dynamo;

pub use background::{BackgroundAuditSink, DEFAULT_QUEUE_CAPACITY};
pub use dynamo::DynamoAuditSink;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Verification stage an audit record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Request accepted, trace id assigned.
    Start,
    /// Volatile cache read.
    CacheLookup,
    /// Durable store read.
    StoreLookup,
    /// Cache repopulation after a store hit.
    CacheWriteback,
    /// Scoring engine call.
    Dispatch,
    /// Request completed successfully.
    Done,
    /// Request terminated with a classified failure.
    Failed,
}

impl Stage {
    /// Human-readable message for the stage.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Start => "verification started",
            Self::CacheLookup => "cache lookup completed",
            Self::StoreLookup => "store lookup completed",
            Self::CacheWriteback => "cache write-back completed",
            Self::Dispatch => "scoring dispatch completed",
            Self::Done => "verification completed",
            Self::Failed => "verification failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::CacheLookup => "cache_lookup",
            Self::StoreLookup => "store_lookup",
            Self::CacheWriteback => "cache_writeback",
            Self::Dispatch => "dispatch",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    /// Normal progress.
    Info,
    /// Degraded or negative outcome.
    Warn,
    /// Terminal failure.
    Error,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One structured audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// When the record was produced.
    pub timestamp: DateTime<Utc>,
    /// Trace id of the request.
    pub trace_id: Uuid,
    /// Stage the record describes.
    pub stage: Stage,
    /// Stage outcome, e.g. "hit", "miss", "stored", "not_found".
    pub outcome: String,
    /// Severity.
    pub level: AuditLevel,
    /// Elapsed time of the stage in milliseconds.
    pub duration_ms: f64,
    /// Stage-specific context (cache key, identity key, error text).
    pub context: Map<String, Value>,
}

impl AuditRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(trace_id: Uuid, stage: Stage, outcome: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            trace_id,
            stage,
            outcome: outcome.into(),
            level: AuditLevel::Info,
            duration_ms: 0.0,
            context: Map::new(),
        }
    }

    /// Set the severity.
    #[must_use]
    pub fn level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the elapsed time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_micros() as f64 / 1000.0;
        self
    }

    /// Add a context entry.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Deliver one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be delivered. Callers on the
    /// verification path log and discard these errors.
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

#[async_trait]
impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        (**self).record(record).await
    }
}

/// Audit sink that emits structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let context = Value::Object(record.context.clone());
        match record.level {
            AuditLevel::Info => tracing::info!(
                audit.trace_id = %record.trace_id,
                audit.stage = %record.stage,
                audit.outcome = %record.outcome,
                audit.duration_ms = record.duration_ms,
                audit.context = %context,
                "{}",
                record.stage.message()
            ),
            AuditLevel::Warn => tracing::warn!(
                audit.trace_id = %record.trace_id,
                audit.stage = %record.stage,
                audit.outcome = %record.outcome,
                audit.duration_ms = record.duration_ms,
                audit.context = %context,
                "{}",
                record.stage.message()
            ),
            AuditLevel::Error => tracing::error!(
                audit.trace_id = %record.trace_id,
                audit.stage = %record.stage,
                audit.outcome = %record.outcome,
                audit.duration_ms = record.duration_ms,
                audit.context = %context,
                "{}",
                record.stage.message()
            ),
        }
        Ok(())
    }
}

/// Audit sink that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// Audit sink that keeps records in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records received so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Records belonging to one trace, in emission order.
    #[must_use]
    pub fn for_trace(&self, trace_id: Uuid) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.trace_id == trace_id)
            .cloned()
            .collect()
    }

    /// Stages of one trace, in emission order.
    #[must_use]
    pub fn stages(&self, trace_id: Uuid) -> Vec<Stage> {
        self.for_trace(trace_id)
            .iter()
            .map(|record| record.stage)
            .collect()
    }

    /// Drop all stored records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
