//! Metadata records persisted to the key-value table.
//!
//! Every record for one object shares the partition key
//! `S3#<bucket>#<key>`. The sort key `METADATA#<discriminator>` uses the
//! object's entity tag when one is known, so reprocessing an unchanged
//! object overwrites its record. Without a tag the discriminator falls back
//! to the recording timestamp and each reprocessing adds a new record.

use crate::notification::ObjectRef;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Value stored for a missing entity tag or content type
pub const UNKNOWN: &str = "unknown";

/// Normalized object metadata, ready to be recorded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMetadata {
    pub size_bytes: i64,
    /// Entity tag with surrounding quotes removed
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectMetadata {
    /// Metadata recorded when the backend could not be read
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// A derivative produced from a source object
#[derive(Debug, Clone, PartialEq)]
pub struct Derivative {
    pub key: String,
    pub content_type: String,
    /// Size of the source object as reported by the notification
    pub original_size_bytes: u64,
    /// Configured bounding box of the derivative, in pixels
    pub max_dimension: u32,
}

/// Record written to the metadata table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    pub pk: String,
    pub sk: String,
    pub bucket: String,
    pub original_key: String,
    pub content_type: String,
    #[serde(flatten)]
    pub detail: RecordDetail,
}

/// Attributes specific to the pipeline that produced the record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordDetail {
    Object {
        etag: String,
        size_bytes: i64,
        s3_last_modified: Option<String>,
        recorded_at: String,
    },
    Derivative {
        thumbnail_key: String,
        original_size_bytes: u64,
        thumbnail_size_px: u32,
        created_at: String,
    },
}

/// Partition key grouping all records of one object
pub fn partition_key(bucket: &str, key: &str) -> String {
    format!("S3#{}#{}", bucket, key)
}

/// Sort key discriminating records within a partition
pub fn sort_key(discriminator: &str) -> String {
    format!("METADATA#{}", discriminator)
}

/// ISO-8601 rendering with a `+00:00` offset.
///
/// Microseconds are written only when non-zero, so whole-second times such
/// as storage modification times carry no fraction.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(precision(&at), false)
}

/// ISO-8601 rendering with a `Z` suffix, used for derivative records
pub fn iso_timestamp_z(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(precision(&at), true)
}

fn precision(at: &DateTime<Utc>) -> SecondsFormat {
    if at.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    }
}

impl MetadataRecord {
    /// Build the record for an object's fetched (or degraded) metadata
    pub fn for_object(target: &ObjectRef, metadata: &ObjectMetadata, now: DateTime<Utc>) -> Self {
        let recorded_at = iso_timestamp(now);
        let sk = sort_key(metadata.etag.as_deref().unwrap_or(&recorded_at));

        Self {
            pk: partition_key(&target.bucket, &target.key),
            sk,
            bucket: target.bucket.clone(),
            original_key: target.key.clone(),
            content_type: metadata
                .content_type
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            detail: RecordDetail::Object {
                etag: metadata.etag.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                size_bytes: metadata.size_bytes,
                s3_last_modified: metadata.last_modified.map(iso_timestamp),
                recorded_at,
            },
        }
    }

    /// Build the record for a derivative written from `target`.
    ///
    /// Only the object bytes are fetched on this path, so no entity tag is
    /// available and the discriminator is always the timestamp.
    pub fn for_derivative(target: &ObjectRef, derivative: &Derivative, now: DateTime<Utc>) -> Self {
        let created_at = iso_timestamp_z(now);

        Self {
            pk: partition_key(&target.bucket, &target.key),
            sk: sort_key(&created_at),
            bucket: target.bucket.clone(),
            original_key: target.key.clone(),
            content_type: derivative.content_type.clone(),
            detail: RecordDetail::Derivative {
                thumbnail_key: derivative.key.clone(),
                original_size_bytes: derivative.original_size_bytes,
                thumbnail_size_px: derivative.max_dimension,
                created_at,
            },
        }
    }
}
