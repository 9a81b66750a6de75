use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Event source tag carried by object storage change notifications
pub const STORAGE_EVENT_SOURCE: &str = "aws:s3";

/// Batch of change notifications delivered to one invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationBatch {
    #[serde(rename = "Records", default, deserialize_with = "deserialize_records")]
    pub records: Vec<NotificationRecord>,
}

/// Decode each record on its own so one malformed record cannot reject the batch
fn deserialize_records<'de, D>(deserializer: D) -> Result<Vec<NotificationRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.into_iter().map(NotificationRecord::from_value).collect())
}

/// A single change notification.
///
/// Every field is optional on the wire; records from other event sources
/// share the batch shape but carry no `s3` entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Event source tag (e.g. `aws:s3`)
    #[serde(rename = "eventSource", default)]
    pub event_source: Option<String>,
    /// Event name (e.g. `ObjectCreated:Put`)
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Storage entity describing the changed object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<StorageEntity>,
    /// Decode error when the record did not have the expected shape
    #[serde(skip)]
    pub malformed: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageEntity {
    #[serde(default)]
    pub bucket: Option<BucketEntity>,
    #[serde(default)]
    pub object: Option<ObjectEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketEntity {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectEntity {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Bucket and key of the object a record refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl NotificationRecord {
    /// Decode one raw record, salvaging the identifying fields when it is malformed
    pub fn from_value(value: Value) -> Self {
        match NotificationRecord::deserialize(&value) {
            Ok(record) => record,
            Err(e) => {
                let text = |pointer: &str| {
                    value
                        .pointer(pointer)
                        .and_then(Value::as_str)
                        .map(String::from)
                };

                Self {
                    event_source: text("/eventSource"),
                    event_name: text("/eventName"),
                    s3: Some(StorageEntity {
                        bucket: Some(BucketEntity {
                            name: text("/s3/bucket/name"),
                        }),
                        object: Some(ObjectEntity {
                            key: text("/s3/object/key"),
                            size: None,
                        }),
                    }),
                    malformed: Some(e.to_string()),
                }
            }
        }
    }

    /// Whether this record describes an object storage change
    pub fn is_storage_event(&self) -> bool {
        self.event_source.as_deref() == Some(STORAGE_EVENT_SOURCE)
    }

    pub fn bucket(&self) -> Option<&str> {
        self.s3.as_ref()?.bucket.as_ref()?.name.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.s3.as_ref()?.object.as_ref()?.key.as_deref()
    }

    /// Object size reported by the notification, 0 when absent
    pub fn size(&self) -> u64 {
        self.s3
            .as_ref()
            .and_then(|s3| s3.object.as_ref())
            .and_then(|object| object.size)
            .unwrap_or(0)
    }

    /// Bucket and key, if the record carries both
    pub fn object_ref(&self) -> Option<ObjectRef> {
        Some(ObjectRef {
            bucket: self.bucket()?.to_string(),
            key: self.key()?.to_string(),
        })
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_storage_notification() {
        let json = r#"{
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": "us-east-1",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "bucket": {"name": "b", "arn": "arn:aws:s3:::b"},
                    "object": {"key": "photos/a.png", "size": 1024, "eTag": "abc"}
                }
            }]
        }"#;

        let batch: NotificationBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.records.len(), 1);

        let record = &batch.records[0];
        assert!(record.is_storage_event());
        assert_eq!(record.bucket(), Some("b"));
        assert_eq!(record.key(), Some("photos/a.png"));
        assert_eq!(record.size(), 1024);
        assert_eq!(
            record.object_ref(),
            Some(ObjectRef {
                bucket: "b".to_string(),
                key: "photos/a.png".to_string(),
            })
        );
    }

    #[test]
    fn test_non_storage_record() {
        let json = r#"{"Records": [{"eventSource": "aws:sqs", "body": "{}"}]}"#;

        let batch: NotificationBatch = serde_json::from_str(json).unwrap();
        let record = &batch.records[0];
        assert!(!record.is_storage_event());
        assert!(record.object_ref().is_none());
        assert_eq!(record.size(), 0);
    }

    #[test]
    fn test_malformed_record_keeps_its_neighbours() {
        let json = r#"{"Records": [
            {"eventSource": "aws:s3", "s3": {"bucket": {"name": "b"}, "object": {"key": "good.png", "size": 10}}},
            {"eventSource": "aws:s3", "s3": {"bucket": {"name": "b"}, "object": {"key": "odd.png", "size": "10"}}}
        ]}"#;

        let batch: NotificationBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.records.len(), 2);

        let good = &batch.records[0];
        assert!(good.malformed.is_none());
        assert_eq!(good.size(), 10);

        let odd = &batch.records[1];
        assert!(odd.is_storage_event());
        assert_eq!(odd.bucket(), Some("b"));
        assert_eq!(odd.key(), Some("odd.png"));
        assert!(odd.malformed.as_deref().unwrap().contains("invalid type"));
    }

    #[test]
    fn test_missing_records_is_empty_batch() {
        let batch: NotificationBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.records.is_empty());
    }

    #[test]
    fn test_object_ref_display() {
        let target = ObjectRef {
            bucket: "b".to_string(),
            key: "photos/a.png".to_string(),
        };
        assert_eq!(target.to_string(), "s3://b/photos/a.png");
    }
}
