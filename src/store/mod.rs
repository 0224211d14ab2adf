//! Durable store clients for reference records.
//!
//! The store is authoritative. A lookup has three distinct results:
//!
//! - `Ok(Some(record))` - record found, numbers already normalized
//! - `Ok(None)` - no record for the key (a normal outcome)
//! - `Err(_)` - connectivity, throttling or decoding failure

mod dynamo;
mod memory;

pub use dynamo::{dynamo_client, DynamoStore, DynamoStoreConfig};
pub use memory::MemoryStore;

pub(crate) use dynamo::json_to_attribute;

use crate::error::Result;
use crate::types::{ReferenceRecord, StoreKey};
use async_trait::async_trait;
use std::sync::Arc;

/// Authoritative lookup of reference records.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch the record for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Store`] on transport failures or when the
    /// stored item cannot be decoded as a reference record.
    async fn get(&self, key: &StoreKey) -> Result<Option<ReferenceRecord>>;
}

#[async_trait]
impl<S: DurableStore + ?Sized> DurableStore for Arc<S> {
    async fn get(&self, key: &StoreKey) -> Result<Option<ReferenceRecord>> {
        (**self).get(key).await
    }
}
