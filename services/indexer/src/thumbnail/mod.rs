//! Thumbnail derivation pipeline.
//!
//! For each new object: skip derivatives, download, decode and correct
//! orientation, shrink and re-encode, upload under the derivative prefix and
//! record the derivative. Decoding and encoding run on the blocking pool.

pub mod encoder;
pub mod normalizer;
pub mod writer;

pub use encoder::{EncodedThumbnail, ThumbnailEncoder, ThumbnailFormat, JPEG_QUALITY};
pub use normalizer::{normalize, OrientationCorrection};
pub use writer::DerivativeWriter;

use crate::batch::{Disposition, RecordHandler};
use crate::config::ThumbnailConfig;
use crate::error::ThumbnailError;
use crate::metadata_table::MetadataTable;
use crate::notification::{NotificationRecord, ObjectRef};
use crate::object_store::ObjectStore;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

/// Generates a thumbnail for every new image object
pub struct ThumbnailGenerator {
    store: Arc<dyn ObjectStore>,
    encoder: Arc<ThumbnailEncoder>,
    writer: DerivativeWriter,
}

impl ThumbnailGenerator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        table: Arc<dyn MetadataTable>,
        config: &ThumbnailConfig,
    ) -> Self {
        Self {
            encoder: Arc::new(ThumbnailEncoder::new(config.size, config.format.clone())),
            writer: DerivativeWriter::new(store.clone(), table, config.prefix.clone()),
            store,
        }
    }

    /// Decode, normalize and encode on the blocking pool
    async fn render(&self, data: Vec<u8>) -> Result<EncodedThumbnail, ThumbnailError> {
        let encoder = self.encoder.clone();

        tokio::task::spawn_blocking(move || encoder.encode(normalize(&data)?))
            .await
            .map_err(|e| ThumbnailError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl RecordHandler for ThumbnailGenerator {
    #[instrument(skip(self, record), fields(bucket = %target.bucket, key = %target.key))]
    async fn handle(
        &self,
        target: &ObjectRef,
        record: &NotificationRecord,
    ) -> anyhow::Result<Disposition> {
        // Derivatives land in the same bucket and trigger notifications too
        if self.writer.is_derivative(&target.key) {
            return Ok(Disposition::Skipped {
                reason: "object is already a thumbnail".to_string(),
            });
        }

        info!("Processing image");

        let data = self
            .store
            .get_object(&target.bucket, &target.key)
            .await
            .context("Failed to download source image")?;

        let thumbnail = self
            .render(data)
            .await
            .with_context(|| format!("Failed to generate thumbnail for {}", target))?;

        self.writer
            .write(
                target,
                record.size(),
                self.encoder.max_dimension(),
                thumbnail,
            )
            .await?;

        metrics::counter!("lumen.thumbnails.generated").increment(1);

        Ok(Disposition::Processed)
    }
}
