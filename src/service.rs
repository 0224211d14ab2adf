//! Service assembly: builds the collaborators from configuration once and
//! wires them into a [`Verifier`].

use crate::audit::{AuditSink, BackgroundAuditSink, DynamoAuditSink, NoopAuditSink, TracingAuditSink};
use crate::cache::{CacheBackend, CacheClient, MemoryCache, RedisCache};
use crate::config::{AuditSinkKind, CacheBackendKind, ServiceConfig, StoreBackendKind};
use crate::dispatch::{HttpDispatcher, HttpDispatcherConfig, ScoringDispatcher};
use crate::error::{Error, Result, VerificationError};
use crate::store::{dynamo_client, DurableStore, DynamoStore, DynamoStoreConfig, MemoryStore};
use crate::types::{VerificationRequest, VerificationResponse};
use crate::verifier::Verifier;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder for a [`Service`].
///
/// Collaborators default to what the configuration names; any of them can
/// be replaced before [`ServiceBuilder::build`].
pub struct ServiceBuilder {
    config: ServiceConfig,
    cache: Option<Arc<dyn CacheBackend>>,
    store: Option<Arc<dyn DurableStore>>,
    dispatcher: Option<Arc<dyn ScoringDispatcher>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl ServiceBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            cache: None,
            store: None,
            dispatcher: None,
            audit: None,
        }
    }

    /// Use `cache` instead of the configured cache backend.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use `store` instead of the configured store backend.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `dispatcher` instead of the HTTP scoring dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn ScoringDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Deliver audit records to `audit` directly.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Connect the collaborators and build the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent, the cache
    /// cannot be reached at startup, or a seed file cannot be loaded.
    pub async fn build(self) -> Result<Service> {
        let config = self.config;
        config.validate()?;
        info!(
            cache = ?config.cache.backend,
            store = ?config.store.backend,
            audit = ?config.audit.sink,
            "Building fingerprint verifier"
        );

        let mut dynamo: Option<DynamoDbClient> = None;

        let cache = match self.cache {
            Some(cache) => cache,
            None => build_cache(&config).await?,
        };

        let store = match self.store {
            Some(store) => store,
            None => build_store(&config, &mut dynamo).await?,
        };

        let dispatcher: Arc<dyn ScoringDispatcher> = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => Arc::new(HttpDispatcher::new(HttpDispatcherConfig {
                endpoint: config.dispatcher.endpoint.clone(),
                timeout: Duration::from_millis(config.dispatcher.timeout_ms),
            })?),
        };

        let mut background = None;
        let audit: Arc<dyn AuditSink> = match self.audit {
            Some(audit) => audit,
            None => match config.audit.sink {
                AuditSinkKind::Tracing => Arc::new(TracingAuditSink),
                AuditSinkKind::None => Arc::new(NoopAuditSink),
                AuditSinkKind::Dynamodb => {
                    let client = shared_dynamo_client(&config, &mut dynamo).await;
                    let sink = Arc::new(BackgroundAuditSink::spawn(
                        Arc::new(DynamoAuditSink::new(client, config.audit.table.clone())),
                        config.audit.queue_capacity,
                    ));
                    background = Some(Arc::clone(&sink));
                    sink
                }
            },
        };

        let verifier = Verifier::new(
            CacheClient::new(cache, Duration::from_millis(config.cache.timeout_ms)),
            store,
            dispatcher,
            audit,
            config.verifier_config(),
        );

        Ok(Service {
            config,
            verifier: Arc::new(verifier),
            background,
        })
    }
}

async fn build_cache(config: &ServiceConfig) -> Result<Arc<dyn CacheBackend>> {
    match config.cache.backend {
        CacheBackendKind::Memory => Ok(Arc::new(MemoryCache::with_capacity(config.cache.capacity))),
        CacheBackendKind::Redis => {
            let url = config
                .cache
                .redis_url
                .as_deref()
                .ok_or_else(|| Error::Config("cache.redis_url is not set".to_string()))?;
            Ok(Arc::new(RedisCache::connect(url).await?))
        }
    }
}

async fn build_store(
    config: &ServiceConfig,
    dynamo: &mut Option<DynamoDbClient>,
) -> Result<Arc<dyn DurableStore>> {
    match config.store.backend {
        StoreBackendKind::Memory => {
            let store = MemoryStore::new();
            if let Some(ref path) = config.store.seed_file {
                let loaded = store.load_file(
                    path,
                    &config.store.partition_key,
                    config.store.modality_key.as_deref(),
                )?;
                info!("Loaded {loaded} reference records from {}", path.display());
            }
            Ok(Arc::new(store))
        }
        StoreBackendKind::Dynamodb => {
            let client = shared_dynamo_client(config, dynamo).await;
            Ok(Arc::new(DynamoStore::new(
                client,
                DynamoStoreConfig {
                    table: config.store.table.clone(),
                    partition_key: config.store.partition_key.clone(),
                    modality_key: config.store.modality_key.clone(),
                },
            )))
        }
    }
}

async fn shared_dynamo_client(
    config: &ServiceConfig,
    dynamo: &mut Option<DynamoDbClient>,
) -> DynamoDbClient {
    if let Some(client) = dynamo {
        return client.clone();
    }
    let client = dynamo_client(&config.store.region, config.store.endpoint_url.as_deref()).await;
    *dynamo = Some(client.clone());
    client
}

/// Cache reachability as reported by the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheHealth {
    /// The cache answered a ping.
    Reachable,
    /// The cache did not answer in time.
    Unreachable,
}

/// Health probe result.
///
/// An unreachable cache degrades the service but does not make it unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Always `"ok"` when the service answers.
    pub status: &'static str,
    /// Cache reachability.
    pub cache: CacheHealth,
}

/// An assembled verification service.
pub struct Service {
    config: ServiceConfig,
    verifier: Arc<Verifier>,
    background: Option<Arc<BackgroundAuditSink>>,
}

impl Service {
    /// The configuration the service was built with.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Shared handle to the verifier.
    #[must_use]
    pub fn verifier(&self) -> Arc<Verifier> {
        Arc::clone(&self.verifier)
    }

    /// Run one verification.
    ///
    /// # Errors
    ///
    /// See [`Verifier::verify`].
    pub async fn verify(
        &self,
        request: VerificationRequest,
    ) -> std::result::Result<VerificationResponse, VerificationError> {
        self.verifier.verify(request).await
    }

    /// Probe the cache.
    pub async fn health(&self) -> HealthReport {
        let cache = if self.verifier.cache().is_reachable().await {
            CacheHealth::Reachable
        } else {
            CacheHealth::Unreachable
        };
        HealthReport {
            status: "ok",
            cache,
        }
    }

    /// Wait for queued audit records to be delivered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audit`] if the delivery task has stopped.
    pub async fn flush_audit(&self) -> Result<()> {
        match self.background {
            Some(ref sink) => sink.flush().await,
            None => Ok(()),
        }
    }
}
