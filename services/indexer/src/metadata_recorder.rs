use crate::batch::{Disposition, RecordHandler};
use crate::metadata_table::MetadataTable;
use crate::notification::{NotificationRecord, ObjectRef};
use crate::object_store::{ObjectHead, ObjectStore};
use crate::record::{MetadataRecord, ObjectMetadata};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Content type the storage backend assigns when none was given on upload
const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// Records the metadata of every changed object into the metadata table
pub struct MetadataRecorder {
    store: Arc<dyn ObjectStore>,
    table: Arc<dyn MetadataTable>,
}

impl MetadataRecorder {
    pub fn new(store: Arc<dyn ObjectStore>, table: Arc<dyn MetadataTable>) -> Self {
        Self { store, table }
    }

    /// Fetch object metadata, degrading to a minimal set when the backend fails.
    ///
    /// A record is always written; an unreadable object yields size 0 and no
    /// entity tag, content type or modification time.
    #[instrument(skip(self), fields(bucket = %target.bucket, key = %target.key))]
    pub async fn read_metadata(&self, target: &ObjectRef) -> ObjectMetadata {
        match self.store.head_object(&target.bucket, &target.key).await {
            Ok(head) => normalize_head(head),
            Err(e) => {
                warn!(error = %e, "Failed to read object metadata, recording minimal metadata");
                metrics::counter!("lumen.head.degraded").increment(1);
                ObjectMetadata::unavailable()
            }
        }
    }
}

/// Strip entity tag quotes and fill backend defaults
fn normalize_head(head: ObjectHead) -> ObjectMetadata {
    let etag = head
        .e_tag
        .map(|tag| tag.trim_matches('"').to_string())
        .filter(|tag| !tag.is_empty());

    ObjectMetadata {
        size_bytes: head.content_length.unwrap_or(0),
        etag,
        content_type: Some(
            head.content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        ),
        last_modified: head.last_modified,
    }
}

#[async_trait]
impl RecordHandler for MetadataRecorder {
    async fn handle(
        &self,
        target: &ObjectRef,
        _record: &NotificationRecord,
    ) -> anyhow::Result<Disposition> {
        let metadata = self.read_metadata(target).await;
        let record = MetadataRecord::for_object(target, &metadata, Utc::now());

        self.table
            .put_item(&record)
            .await
            .with_context(|| format!("Failed to record metadata for {}", target))?;

        info!(pk = %record.pk, sk = %record.sk, "Wrote metadata record");

        Ok(Disposition::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{process_batch, OutcomeStatus};
    use crate::error::StoreError;
    use crate::metadata_table::MockMetadataTable;
    use crate::notification::NotificationBatch;
    use crate::object_store::MockObjectStore;
    use crate::record::{RecordDetail, UNKNOWN};
    use std::sync::Mutex;

    fn batch(json: &str) -> NotificationBatch {
        serde_json::from_str(json).unwrap()
    }

    const SINGLE_RECORD: &str = r#"{"Records": [{
        "eventSource": "aws:s3",
        "s3": {"bucket": {"name": "b"}, "object": {"key": "photos/a.png"}}
    }]}"#;

    /// Table mock that keeps every written record
    fn capturing_table(written: Arc<Mutex<Vec<MetadataRecord>>>) -> MockMetadataTable {
        let mut table = MockMetadataTable::new();
        table.expect_put_item().returning(move |record| {
            written.lock().unwrap().push(record.clone());
            Ok(())
        });
        table
    }

    #[tokio::test]
    async fn test_records_head_metadata() {
        let mut store = MockObjectStore::new();
        store
            .expect_head_object()
            .withf(|bucket: &str, key: &str| bucket == "b" && key == "photos/a.png")
            .times(1)
            .returning(|_, _| {
                Ok(ObjectHead {
                    content_length: Some(1024),
                    e_tag: Some("\"abc\"".to_string()),
                    content_type: Some("image/png".to_string()),
                    last_modified: None,
                })
            });

        let written = Arc::new(Mutex::new(Vec::new()));
        let recorder = MetadataRecorder::new(
            Arc::new(store),
            Arc::new(capturing_table(written.clone())),
        );

        let report = process_batch(&recorder, &batch(SINGLE_RECORD)).await;
        assert_eq!(report.succeeded(), 1);

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        let record = &written[0];
        assert_eq!(record.pk, "S3#b#photos/a.png");
        assert_eq!(record.sk, "METADATA#abc");
        assert_eq!(record.bucket, "b");
        assert_eq!(record.original_key, "photos/a.png");
        assert_eq!(record.content_type, "image/png");
        match &record.detail {
            RecordDetail::Object {
                etag, size_bytes, ..
            } => {
                assert_eq!(etag, "abc");
                assert_eq!(*size_bytes, 1024);
            }
            other => panic!("unexpected detail: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_head_failure_still_writes_minimal_record() {
        let mut store = MockObjectStore::new();
        store.expect_head_object().times(1).returning(|bucket, key| {
            Err(StoreError::Head {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "AccessDenied".to_string(),
            })
        });

        let written = Arc::new(Mutex::new(Vec::new()));
        let recorder = MetadataRecorder::new(
            Arc::new(store),
            Arc::new(capturing_table(written.clone())),
        );

        let report = process_batch(&recorder, &batch(SINGLE_RECORD)).await;
        assert_eq!(report.succeeded(), 1);

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].content_type, UNKNOWN);
        assert!(written[0].sk.starts_with("METADATA#"));
        assert_ne!(written[0].sk, "METADATA#unknown");
        match &written[0].detail {
            RecordDetail::Object {
                etag,
                size_bytes,
                s3_last_modified,
                ..
            } => {
                assert_eq!(etag, UNKNOWN);
                assert_eq!(*size_bytes, 0);
                assert!(s3_last_modified.is_none());
            }
            other => panic!("unexpected detail: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_failure_is_reported() {
        let mut store = MockObjectStore::new();
        store
            .expect_head_object()
            .returning(|_, _| Ok(ObjectHead::default()));

        let mut table = MockMetadataTable::new();
        table
            .expect_put_item()
            .times(1)
            .returning(|_| Err(StoreError::TableNotConfigured));

        let recorder = MetadataRecorder::new(Arc::new(store), Arc::new(table));
        let report = process_batch(&recorder, &batch(SINGLE_RECORD)).await;

        assert_eq!(report.failed(), 1);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.bucket.as_deref(), Some("b"));
        assert_eq!(outcome.key.as_deref(), Some("photos/a.png"));
        let error = outcome.error.as_deref().unwrap();
        assert!(error.contains("Failed to record metadata for s3://b/photos/a.png"));
        assert!(error.contains("Metadata table name is not configured"));
    }

    #[tokio::test]
    async fn test_non_storage_record_touches_no_backend() {
        let mut store = MockObjectStore::new();
        store.expect_head_object().never();
        let mut table = MockMetadataTable::new();
        table.expect_put_item().never();

        let recorder = MetadataRecorder::new(Arc::new(store), Arc::new(table));
        let report = process_batch(
            &recorder,
            &batch(r#"{"Records": [{"eventSource": "aws:sns"}]}"#),
        )
        .await;

        assert_eq!(report.skipped, 1);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn test_normalize_head() {
        let metadata = normalize_head(ObjectHead {
            content_length: None,
            e_tag: Some("\"\"".to_string()),
            content_type: None,
            last_modified: None,
        });

        assert_eq!(metadata.size_bytes, 0);
        assert!(metadata.etag.is_none());
        assert_eq!(metadata.content_type.as_deref(), Some(DEFAULT_CONTENT_TYPE));
    }

    #[test]
    fn test_normalize_multipart_etag() {
        let metadata = normalize_head(ObjectHead {
            e_tag: Some("\"9b2cf535f27731c974343645a3985328-2\"".to_string()),
            ..Default::default()
        });

        assert_eq!(
            metadata.etag.as_deref(),
            Some("9b2cf535f27731c974343645a3985328-2")
        );
    }
}
