//! Batch driver shared by both handlers.
//!
//! Records are processed strictly in order, each to completion before the
//! next starts. A failing record becomes an error outcome; it never aborts
//! the batch.

use crate::notification::{NotificationBatch, NotificationRecord, ObjectRef};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, instrument};

/// What a handler did with a record it accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The record was fully processed
    Processed,
    /// The record was deliberately ignored
    Skipped { reason: String },
}

/// Per-record processing step run by [`process_batch`]
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// Process a single storage record
    async fn handle(
        &self,
        target: &ObjectRef,
        record: &NotificationRecord,
    ) -> anyhow::Result<Disposition>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Ok,
    Error,
}

/// Result reported for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordOutcome {
    fn ok(target: &ObjectRef) -> Self {
        Self {
            bucket: Some(target.bucket.clone()),
            key: Some(target.key.clone()),
            status: OutcomeStatus::Ok,
            error: None,
        }
    }

    fn failed(record: &NotificationRecord, error: String) -> Self {
        Self {
            bucket: record.bucket().map(String::from),
            key: record.key().map(String::from),
            status: OutcomeStatus::Error,
            error: Some(error),
        }
    }
}

/// Aggregate result of one batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Outcomes of processed and failed records, in batch order
    pub outcomes: Vec<RecordOutcome>,
    /// Records skipped without an outcome
    pub skipped: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Ok)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Error)
            .count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len() + self.skipped
    }

    /// Render the invocation response.
    ///
    /// The status is always 200; failures are visible only in the body.
    pub fn into_response(self) -> serde_json::Result<BatchResponse> {
        Ok(BatchResponse {
            status_code: 200,
            body: serde_json::to_string(&self.outcomes)?,
        })
    }
}

/// Invocation response returned to the runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded list of [`RecordOutcome`]
    pub body: String,
}

/// Run `handler` over every storage record in `batch`
#[instrument(skip(handler, batch), fields(records = batch.records.len()))]
pub async fn process_batch<H>(handler: &H, batch: &NotificationBatch) -> BatchReport
where
    H: RecordHandler + ?Sized,
{
    let mut report = BatchReport::default();

    for record in &batch.records {
        if !record.is_storage_event() {
            info!(
                event_source = record.event_source.as_deref().unwrap_or(""),
                "Skipping non-s3 record"
            );
            report.skipped += 1;
            metrics::counter!("lumen.records.skipped").increment(1);
            continue;
        }

        if let Some(ref reason) = record.malformed {
            error!(error = %reason, "Malformed storage record");
            report.outcomes.push(RecordOutcome::failed(
                record,
                format!("malformed notification record: {}", reason),
            ));
            metrics::counter!("lumen.records.failed").increment(1);
            continue;
        }

        let Some(target) = record.object_ref() else {
            error!("Storage record is missing bucket name or object key");
            report.outcomes.push(RecordOutcome::failed(
                record,
                "notification record is missing bucket name or object key".to_string(),
            ));
            metrics::counter!("lumen.records.failed").increment(1);
            continue;
        };

        match handler.handle(&target, record).await {
            Ok(Disposition::Processed) => {
                report.outcomes.push(RecordOutcome::ok(&target));
                metrics::counter!("lumen.records.succeeded").increment(1);
            }
            Ok(Disposition::Skipped { reason }) => {
                info!(bucket = %target.bucket, key = %target.key, reason = %reason, "Skipping record");
                report.skipped += 1;
                metrics::counter!("lumen.records.skipped").increment(1);
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(
                    bucket = %target.bucket,
                    key = %target.key,
                    error = %message,
                    "Error processing record"
                );
                report.outcomes.push(RecordOutcome::failed(record, message));
                metrics::counter!("lumen.records.failed").increment(1);
            }
        }
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped,
        "Batch processed"
    );

    report
}
