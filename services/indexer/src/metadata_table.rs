use crate::config::AwsConfig;
use crate::error::StoreError;
use crate::record::{MetadataRecord, RecordDetail};
use async_trait::async_trait;
use aws_sdk_dynamodb::config::Builder as DynamoDbConfigBuilder;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_types::SdkConfig;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Durable key-value table capability.
///
/// `put_item` overwrites any existing item with the same partition and sort
/// key; concurrent writers race with last-write-wins semantics.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataTable: Send + Sync {
    async fn put_item(&self, record: &MetadataRecord) -> Result<(), StoreError>;
}

/// DynamoDB-backed metadata table
pub struct DynamoMetadataTable {
    client: DynamoDbClient,
    /// Missing table names are reported per write rather than at startup
    table_name: Option<String>,
}

impl DynamoMetadataTable {
    /// Create a new DynamoDB metadata table from shared AWS configuration
    pub fn new(sdk_config: &SdkConfig, config: &AwsConfig, table_name: Option<String>) -> Self {
        let mut builder = DynamoDbConfigBuilder::from(sdk_config);

        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = DynamoDbClient::from_conf(builder.build());

        info!(
            table = table_name.as_deref().unwrap_or("<unset>"),
            "DynamoDB metadata table initialized"
        );

        Self { client, table_name }
    }

    fn table_name(&self) -> Result<&str, StoreError> {
        self.table_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(StoreError::TableNotConfigured)
    }
}

#[async_trait]
impl MetadataTable for DynamoMetadataTable {
    #[instrument(skip(self, record), fields(pk = %record.pk, sk = %record.sk))]
    async fn put_item(&self, record: &MetadataRecord) -> Result<(), StoreError> {
        let table = self.table_name()?;

        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(|e| StoreError::PutItem {
                table: table.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(table = %table, "Item written");
        Ok(())
    }
}

/// Convert a record into DynamoDB attributes
pub fn to_item(record: &MetadataRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();

    item.insert("pk".to_string(), AttributeValue::S(record.pk.clone()));
    item.insert("sk".to_string(), AttributeValue::S(record.sk.clone()));
    item.insert("bucket".to_string(), AttributeValue::S(record.bucket.clone()));
    item.insert(
        "original_key".to_string(),
        AttributeValue::S(record.original_key.clone()),
    );
    item.insert(
        "content_type".to_string(),
        AttributeValue::S(record.content_type.clone()),
    );

    match &record.detail {
        RecordDetail::Object {
            etag,
            size_bytes,
            s3_last_modified,
            recorded_at,
        } => {
            item.insert("etag".to_string(), AttributeValue::S(etag.clone()));
            item.insert(
                "size_bytes".to_string(),
                AttributeValue::N(size_bytes.to_string()),
            );
            item.insert(
                "s3_last_modified".to_string(),
                s3_last_modified
                    .clone()
                    .map(AttributeValue::S)
                    .unwrap_or(AttributeValue::Null(true)),
            );
            item.insert(
                "recorded_at".to_string(),
                AttributeValue::S(recorded_at.clone()),
            );
        }
        RecordDetail::Derivative {
            thumbnail_key,
            original_size_bytes,
            thumbnail_size_px,
            created_at,
        } => {
            item.insert(
                "thumbnail_key".to_string(),
                AttributeValue::S(thumbnail_key.clone()),
            );
            item.insert(
                "original_size_bytes".to_string(),
                AttributeValue::N(original_size_bytes.to_string()),
            );
            item.insert(
                "thumbnail_size_px".to_string(),
                AttributeValue::N(thumbnail_size_px.to_string()),
            );
            item.insert(
                "created_at".to_string(),
                AttributeValue::S(created_at.clone()),
            );
        }
    }

    item
}
