//! Configuration for fingerprint-verifier.

use crate::audit::DEFAULT_QUEUE_CAPACITY;
use crate::cache::{DEFAULT_TTL, MAX_TTL};
use crate::verifier::{KeyScheme, VerifierConfig, DEFAULT_MAX_CONCURRENT_DISPATCHES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Volatile cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process LRU cache.
    #[default]
    Memory,
    /// Redis server.
    Redis,
}

/// Durable store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// In-process map, useful for local runs and tests.
    #[default]
    Memory,
    /// Amazon DynamoDB.
    Dynamodb,
}

/// Audit record destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    /// Structured `tracing` events.
    #[default]
    Tracing,
    /// A DynamoDB log table.
    Dynamodb,
    /// Discard audit records.
    None,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Volatile cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Durable store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Scoring engine settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Audit trail settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Include internal error detail in caller-facing messages.
    #[serde(default)]
    pub expose_error_details: bool,
}

/// Volatile cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend to use.
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Redis URL, required for the redis backend.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Maximum entries held by the memory backend.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Expiry of written-back entries, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Bound on a single cache call, in milliseconds.
    #[serde(default = "default_cache_timeout_ms")]
    pub timeout_ms: u64,
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to use.
    #[serde(default)]
    pub backend: StoreBackendKind,

    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Reference record table.
    #[serde(default = "default_store_table")]
    pub table: String,

    /// Partition key attribute holding the subject number.
    #[serde(default = "default_partition_key")]
    pub partition_key: String,

    /// Sort key attribute holding the modality, for composite keys.
    #[serde(default)]
    pub modality_key: Option<String>,

    /// Endpoint override, e.g. a local DynamoDB.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Store key shape.
    #[serde(default)]
    pub key_scheme: KeyScheme,

    /// JSON array of documents preloaded into the memory backend.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,

    /// Bound on a single store lookup, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

/// Scoring engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Scoring engine URL.
    #[serde(default = "default_dispatcher_endpoint")]
    pub endpoint: String,

    /// Bound on a single comparison, in milliseconds.
    #[serde(default = "default_dispatcher_timeout_ms")]
    pub timeout_ms: u64,

    /// Comparisons of one request in flight at the same time.
    #[serde(default = "default_max_concurrent_dispatches")]
    pub max_concurrent: usize,
}

/// Audit trail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Where audit records go.
    #[serde(default)]
    pub sink: AuditSinkKind,

    /// Log table for the dynamodb sink.
    #[serde(default = "default_audit_table")]
    pub table: String,

    /// Records buffered before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            dispatcher: DispatcherConfig::default(),
            audit: AuditConfig::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            expose_error_details: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            redis_url: None,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
            timeout_ms: default_cache_timeout_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::default(),
            region: default_region(),
            table: default_store_table(),
            partition_key: default_partition_key(),
            modality_key: None,
            endpoint_url: None,
            key_scheme: KeyScheme::default(),
            seed_file: None,
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_dispatcher_endpoint(),
            timeout_ms: default_dispatcher_timeout_ms(),
            max_concurrent: default_max_concurrent_dispatches(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::default(),
            table: default_audit_table(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_cache_capacity() -> usize {
    10_000
}

const fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

const fn default_cache_timeout_ms() -> u64 {
    250
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_store_table() -> String {
    "FingerprintRecords".to_string()
}

fn default_partition_key() -> String {
    "cedula".to_string()
}

const fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_dispatcher_endpoint() -> String {
    "http://127.0.0.1:9000/compare".to_string()
}

const fn default_dispatcher_timeout_ms() -> u64 {
    10_000
}

const fn default_max_concurrent_dispatches() -> usize {
    DEFAULT_MAX_CONCURRENT_DISPATCHES
}

fn default_audit_table() -> String {
    "FingerprintLogs".to_string()
}

const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check settings that depend on each other.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] describing the first inconsistency.
    pub fn validate(&self) -> crate::Result<()> {
        if self.cache.backend == CacheBackendKind::Redis && self.cache.redis_url.is_none() {
            return Err(crate::Error::Config(
                "cache.redis_url is required for the redis backend".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(crate::Error::Config(
                "cache.ttl_secs must be positive".to_string(),
            ));
        }
        if self.cache.ttl_secs > MAX_TTL.as_secs() {
            return Err(crate::Error::Config(format!(
                "cache.ttl_secs must not exceed {}",
                MAX_TTL.as_secs()
            )));
        }
        // Seeded documents are keyed the same way as DynamoDB items.
        let keys_from_documents = self.store.backend == StoreBackendKind::Dynamodb
            || self.store.seed_file.is_some();
        if keys_from_documents
            && self.store.key_scheme == KeyScheme::Composite
            && self.store.modality_key.is_none()
        {
            return Err(crate::Error::Config(
                "store.modality_key is required for composite keys".to_string(),
            ));
        }
        if self.dispatcher.max_concurrent == 0 {
            return Err(crate::Error::Config(
                "dispatcher.max_concurrent must be positive".to_string(),
            ));
        }
        if self.audit.queue_capacity == 0 {
            return Err(crate::Error::Config(
                "audit.queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Orchestrator settings derived from this configuration.
    #[must_use]
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            store_timeout: Duration::from_millis(self.store.timeout_ms),
            dispatch_timeout: Duration::from_millis(self.dispatcher.timeout_ms),
            max_concurrent_dispatches: self.dispatcher.max_concurrent,
            key_scheme: self.store.key_scheme,
        }
    }
}
