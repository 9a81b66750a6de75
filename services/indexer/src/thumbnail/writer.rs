use super::encoder::EncodedThumbnail;
use crate::metadata_table::MetadataTable;
use crate::notification::ObjectRef;
use crate::object_store::ObjectStore;
use crate::record::{Derivative, MetadataRecord};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Uploads derivatives next to their source and records them
pub struct DerivativeWriter {
    store: Arc<dyn ObjectStore>,
    table: Arc<dyn MetadataTable>,
    prefix: String,
}

impl DerivativeWriter {
    pub fn new(store: Arc<dyn ObjectStore>, table: Arc<dyn MetadataTable>, prefix: String) -> Self {
        Self {
            store,
            table,
            prefix,
        }
    }

    /// Key of the derivative for `key`, mirroring the source path under the prefix
    pub fn derivative_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Whether `key` already names a derivative
    pub fn is_derivative(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Upload the thumbnail, then write its metadata record
    #[instrument(skip(self, thumbnail), fields(bucket = %source.bucket, key = %source.key))]
    pub async fn write(
        &self,
        source: &ObjectRef,
        original_size_bytes: u64,
        max_dimension: u32,
        thumbnail: EncodedThumbnail,
    ) -> Result<MetadataRecord> {
        let derivative = Derivative {
            key: self.derivative_key(&source.key),
            content_type: thumbnail.content_type,
            original_size_bytes,
            max_dimension,
        };

        self.store
            .put_object(
                &source.bucket,
                &derivative.key,
                thumbnail.data,
                &derivative.content_type,
            )
            .await
            .context("Failed to upload thumbnail")?;

        info!(thumbnail_key = %derivative.key, "Uploaded thumbnail");

        let record = MetadataRecord::for_derivative(source, &derivative, Utc::now());
        self.table
            .put_item(&record)
            .await
            .context("Failed to record thumbnail metadata")?;

        info!(pk = %record.pk, sk = %record.sk, "Wrote thumbnail metadata");

        Ok(record)
    }
}
