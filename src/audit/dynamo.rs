//! Audit sink writing records into a DynamoDB log table.

use super::{AuditRecord, AuditSink};
use crate::error::{Error, Result};
use crate::store::json_to_attribute;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Writes one item per audit record.
///
/// Item layout: `log_id` (S, partition key), `trace_id` (S), `timestamp`
/// (N, fractional UNIX seconds), `level` (S), `message` (S), `stage` (S),
/// `outcome` (S), `duration_ms` (N), `additional_data` (M).
#[derive(Clone)]
pub struct DynamoAuditSink {
    client: DynamoDbClient,
    table: String,
}

impl DynamoAuditSink {
    /// Create a sink for `table`.
    #[must_use]
    pub fn new(client: DynamoDbClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn to_item(record: &AuditRecord) -> HashMap<String, AttributeValue> {
        let millis = record.timestamp.timestamp_millis();
        #[allow(clippy::cast_precision_loss)]
        let seconds = millis as f64 / 1000.0;

        HashMap::from([
            (
                "log_id".to_string(),
                AttributeValue::S(format!("log-{millis}-{}", Uuid::new_v4().simple())),
            ),
            (
                "trace_id".to_string(),
                AttributeValue::S(record.trace_id.to_string()),
            ),
            ("timestamp".to_string(), AttributeValue::N(seconds.to_string())),
            ("level".to_string(), AttributeValue::S(record.level.to_string())),
            (
                "message".to_string(),
                AttributeValue::S(record.stage.message().to_string()),
            ),
            ("stage".to_string(), AttributeValue::S(record.stage.to_string())),
            ("outcome".to_string(), AttributeValue::S(record.outcome.clone())),
            (
                "duration_ms".to_string(),
                json_to_attribute(&Value::from(record.duration_ms)),
            ),
            (
                "additional_data".to_string(),
                json_to_attribute(&Value::Object(record.context.clone())),
            ),
        ])
    }
}

#[async_trait]
impl AuditSink for DynamoAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(Self::to_item(record)))
            .send()
            .await
            .map_err(|e| Error::Audit(format!("DynamoDB put_item failed: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}
