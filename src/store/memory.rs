//! In-process durable store used for development and tests.

use super::DurableStore;
use crate::error::{Error, Result};
use crate::normalize::normalize_value;
use crate::types::{ReferenceRecord, StoreKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Map-backed store holding raw JSON documents.
///
/// Documents are normalized and decoded on every read, the same way a
/// remote store's items are.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<StoreKey, Value>>>,
    lookups: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a raw document.
    pub fn insert(&self, key: StoreKey, document: Value) {
        self.documents.write().insert(key, document);
    }

    /// Insert a typed record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn insert_record(&self, key: StoreKey, record: &ReferenceRecord) -> Result<()> {
        self.insert(key, serde_json::to_value(record)?);
        Ok(())
    }

    /// Load a JSON array of documents, keyed the way a table would key them.
    ///
    /// Each document must carry a numeric `partition_key` attribute; with a
    /// `modality_key`, that string attribute becomes part of the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is not a JSON array of documents
    /// or a document lacks its key attributes.
    pub fn load_file(
        &self,
        path: &Path,
        partition_key: &str,
        modality_key: Option<&str>,
    ) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let documents: Vec<Value> = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid seed file {}: {e}", path.display())))?;

        let count = documents.len();
        for document in documents {
            let subject = document
                .get(partition_key)
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    Error::Config(format!("Seed document without numeric {partition_key:?}"))
                })?;
            let modality = match modality_key {
                Some(attribute) => Some(
                    document
                        .get(attribute)
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            Error::Config(format!("Seed document without string {attribute:?}"))
                        })?
                        .to_string(),
                ),
                None => None,
            };
            self.insert(StoreKey { subject, modality }, document);
        }
        Ok(count)
    }

    /// Remove a document.
    pub fn remove(&self, key: &StoreKey) -> Option<Value> {
        self.documents.write().remove(key)
    }

    /// Number of `get` calls served so far.
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<ReferenceRecord>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let document = self.documents.read().get(key).cloned();
        document
            .map(|doc| ReferenceRecord::from_document(normalize_value(doc)))
            .transpose()
    }
}
