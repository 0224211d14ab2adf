//! Command-line interface definition.

use clap::{Parser, Subcommand, ValueEnum};
use fingerprint_verifier::config::{
    AuditSinkKind, CacheBackendKind, LogFormat, ServiceConfig, StoreBackendKind,
};
use fingerprint_verifier::KeyScheme;
use std::path::PathBuf;

/// Cache-aside fingerprint verification against a remote scoring engine.
#[derive(Parser, Debug)]
#[command(name = "fingerprint-verifier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, env = "FPV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Volatile cache backend.
    #[arg(long, value_enum, env = "FPV_CACHE_BACKEND")]
    pub cache_backend: Option<CliCacheBackend>,

    /// Redis URL for the redis cache backend.
    #[arg(long, env = "FPV_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Cache entry expiry in seconds.
    #[arg(long, env = "FPV_CACHE_TTL_SECS")]
    pub cache_ttl_secs: Option<u64>,

    /// Durable store backend.
    #[arg(long, value_enum, env = "FPV_STORE_BACKEND")]
    pub store_backend: Option<CliStoreBackend>,

    /// Reference record table.
    #[arg(long, env = "FPV_STORE_TABLE")]
    pub store_table: Option<String>,

    /// AWS region.
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// DynamoDB endpoint override.
    #[arg(long, env = "FPV_DYNAMODB_ENDPOINT")]
    pub dynamodb_endpoint: Option<String>,

    /// Store key shape.
    #[arg(long, value_enum, env = "FPV_KEY_SCHEME")]
    pub key_scheme: Option<CliKeyScheme>,

    /// JSON documents to preload into the memory store.
    #[arg(long, env = "FPV_SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Scoring engine URL.
    #[arg(long, env = "FPV_SCORING_ENDPOINT")]
    pub scoring_endpoint: Option<String>,

    /// Comparisons of one request in flight at once.
    #[arg(long, env = "FPV_MAX_CONCURRENT_DISPATCHES")]
    pub max_concurrent_dispatches: Option<usize>,

    /// Audit record destination.
    #[arg(long, value_enum, env = "FPV_AUDIT_SINK")]
    pub audit_sink: Option<CliAuditSink>,

    /// Log level.
    #[arg(long, env = "FPV_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, env = "FPV_LOG_FORMAT")]
    pub log_format: Option<CliLogFormat>,

    /// Include internal error detail in error output.
    #[arg(long)]
    pub expose_error_details: bool,

    /// What to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Verify candidate minutiae against a subject's reference record.
    Verify {
        /// Numeric subject identifier.
        subject: String,

        /// Finger/modality selector.
        #[arg(long, short)]
        modality: Option<String>,

        /// JSON file holding one minutiae set or a list of sets.
        #[arg(long)]
        minutiae: PathBuf,
    },
    /// Report service health.
    Health,
}

/// Cache backend CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliCacheBackend {
    /// In-process LRU cache.
    Memory,
    /// Redis server.
    Redis,
}

/// Store backend CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliStoreBackend {
    /// In-process map.
    Memory,
    /// Amazon DynamoDB.
    Dynamodb,
}

/// Key scheme CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliKeyScheme {
    /// Keyed by subject only.
    Subject,
    /// Keyed by subject and modality.
    Composite,
}

/// Audit sink CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliAuditSink {
    /// Structured log events.
    Tracing,
    /// DynamoDB log table.
    Dynamodb,
    /// Discard audit records.
    None,
}

/// Log format CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable output.
    Pretty,
    /// JSON lines.
    Json,
}

impl Cli {
    /// Convert CLI arguments into a `ServiceConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<ServiceConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            ServiceConfig::from_file(path)?
        } else {
            ServiceConfig::default()
        };

        // Override with CLI arguments
        if let Some(backend) = self.cache_backend {
            config.cache.backend = backend.into();
        }
        if self.redis_url.is_some() {
            config.cache.redis_url = self.redis_url;
        }
        if let Some(ttl) = self.cache_ttl_secs {
            config.cache.ttl_secs = ttl;
        }

        if let Some(backend) = self.store_backend {
            config.store.backend = backend.into();
        }
        if let Some(table) = self.store_table {
            config.store.table = table;
        }
        if let Some(region) = self.region {
            config.store.region = region;
        }
        if self.dynamodb_endpoint.is_some() {
            config.store.endpoint_url = self.dynamodb_endpoint;
        }
        if let Some(scheme) = self.key_scheme {
            config.store.key_scheme = scheme.into();
        }
        if self.seed_file.is_some() {
            config.store.seed_file = self.seed_file;
        }

        if let Some(endpoint) = self.scoring_endpoint {
            config.dispatcher.endpoint = endpoint;
        }
        if let Some(limit) = self.max_concurrent_dispatches {
            config.dispatcher.max_concurrent = limit;
        }
        if let Some(sink) = self.audit_sink {
            config.audit.sink = sink.into();
        }

        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format.into();
        }
        config.expose_error_details |= self.expose_error_details;

        Ok(config)
    }
}

impl From<CliCacheBackend> for CacheBackendKind {
    fn from(b: CliCacheBackend) -> Self {
        match b {
            CliCacheBackend::Memory => Self::Memory,
            CliCacheBackend::Redis => Self::Redis,
        }
    }
}

impl From<CliStoreBackend> for StoreBackendKind {
    fn from(b: CliStoreBackend) -> Self {
        match b {
            CliStoreBackend::Memory => Self::Memory,
            CliStoreBackend::Dynamodb => Self::Dynamodb,
        }
    }
}

impl From<CliKeyScheme> for KeyScheme {
    fn from(s: CliKeyScheme) -> Self {
        match s {
            CliKeyScheme::Subject => Self::Subject,
            CliKeyScheme::Composite => Self::Composite,
        }
    }
}

impl From<CliAuditSink> for AuditSinkKind {
    fn from(s: CliAuditSink) -> Self {
        match s {
            CliAuditSink::Tracing => Self::Tracing,
            CliAuditSink::Dynamodb => Self::Dynamodb,
            CliAuditSink::None => Self::None,
        }
    }
}

impl From<CliLogFormat> for LogFormat {
    fn from(f: CliLogFormat) -> Self {
        match f {
            CliLogFormat::Pretty => Self::Pretty,
            CliLogFormat::Json => Self::Json,
        }
    }
}
