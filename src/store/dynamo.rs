//! DynamoDB-backed reference store.
//!
//! ## Table Schema
//! ```text
//! Partition Key: cedula (Number) = subject number
//! Sort Key:      dedo   (String) = modality, only when keyed per finger
//! Attributes:
//!   - minutiae: List of Maps {x, y, angle, type}
//!   - any other attribute is carried through to the record
//! ```
//!
//! Numbers come back as decimal strings (`AttributeValue::N`) and are
//! narrowed through [`normalize_decimal`] while the item is converted.

use super::DurableStore;
use crate::error::{Error, Result};
use crate::normalize::normalize_decimal;
use crate::types::{ReferenceRecord, StoreKey};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Settings for [`DynamoStore`].
#[derive(Debug, Clone)]
pub struct DynamoStoreConfig {
    /// Table holding reference records.
    pub table: String,
    /// Partition key attribute (numeric subject identifier).
    pub partition_key: String,
    /// Sort key attribute for the modality, when records are keyed per finger.
    pub modality_key: Option<String>,
}

impl Default for DynamoStoreConfig {
    fn default() -> Self {
        Self {
            table: "FingerprintRecords".to_string(),
            partition_key: "cedula".to_string(),
            modality_key: None,
        }
    }
}

/// Build a DynamoDB client for `region`, optionally against a local endpoint.
pub async fn dynamo_client(region: &str, endpoint_url: Option<&str>) -> DynamoDbClient {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()));
    if let Some(endpoint) = endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;
    DynamoDbClient::new(&sdk_config)
}

/// Reference store reading items with `GetItem`.
#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoDbClient,
    config: DynamoStoreConfig,
}

impl DynamoStore {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: DynamoDbClient, config: DynamoStoreConfig) -> Self {
        debug!(table = %config.table, "DynamoDB reference store configured");
        Self { client, config }
    }

    fn item_key(&self, key: &StoreKey) -> Result<HashMap<String, AttributeValue>> {
        let mut item_key = HashMap::new();
        item_key.insert(
            self.config.partition_key.clone(),
            AttributeValue::N(key.subject.to_string()),
        );

        if let Some(modality) = &key.modality {
            let Some(attribute) = &self.config.modality_key else {
                return Err(Error::Config(
                    "composite store key requested but no modality_key is configured".to_string(),
                ));
            };
            item_key.insert(attribute.clone(), AttributeValue::S(modality.clone()));
        }

        Ok(item_key)
    }
}

#[async_trait]
impl DurableStore for DynamoStore {
    #[instrument(skip(self), fields(table = %self.config.table, subject = key.subject))]
    async fn get(&self, key: &StoreKey) -> Result<Option<ReferenceRecord>> {
        let start = Instant::now();

        let output = self
            .client
            .get_item()
            .table_name(&self.config.table)
            .set_key(Some(self.item_key(key)?))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %DisplayErrorContext(&e), "DynamoDB get_item failed");
                Error::Store(format!("DynamoDB get_item failed: {}", DisplayErrorContext(&e)))
            })?;

        debug!(
            duration_ms = start.elapsed().as_millis(),
            found = output.item().is_some(),
            "DynamoDB get_item completed"
        );

        let Some(item) = output.item() else {
            return Ok(None);
        };

        let document = item_to_json(item)?;
        ReferenceRecord::from_document(document).map(Some)
    }
}

fn item_to_json(item: &HashMap<String, AttributeValue>) -> Result<Value> {
    let mut map = Map::new();
    for (name, attribute) in item {
        map.insert(name.clone(), attribute_to_json(attribute)?);
    }
    Ok(Value::Object(map))
}

/// Convert a DynamoDB attribute into normalized JSON.
fn attribute_to_json(attribute: &AttributeValue) -> Result<Value> {
    let value = match attribute {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(normalize_decimal(n)?),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(attribute_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => item_to_json(map)?,
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|n| normalize_decimal(n).map(Value::Number))
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::B(blob) => blob_to_json(blob),
        AttributeValue::Bs(blobs) => Value::Array(blobs.iter().map(blob_to_json).collect()),
        _ => {
            return Err(Error::Store(
                "Unsupported DynamoDB attribute type".to_string(),
            ))
        }
    };
    Ok(value)
}

fn blob_to_json(blob: &Blob) -> Value {
    Value::Array(
        blob.as_ref()
            .iter()
            .map(|byte| Value::from(*byte))
            .collect(),
    )
}

/// Convert JSON into a DynamoDB attribute.
///
/// Numbers are written through their decimal text, so floats keep the exact
/// representation they print with.
pub(crate) fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attribute(v)))
                .collect(),
        ),
    }
}
