//! Lumen Indexer
//!
//! Handlers for object storage change notifications. Each invocation receives
//! a batch of notification records and processes them one at a time:
//!
//! - **Metadata recording**: reads an object's head metadata and writes an
//!   idempotent record keyed by bucket, key and entity tag
//! - **Thumbnail derivation**: downloads an image, corrects its orientation,
//!   shrinks and re-encodes it, uploads the result under a derivative prefix
//!   and records it
//!
//! ## Architecture
//!
//! ```text
//! Notification batch
//! ┌──────────────┐
//! │ Records      │
//! └──────────────┘
//!        │
//!        ▼
//! ┌──────────────┐   head / get    ┌──────────────┐
//! │ Batch        │────────────────▶│ Object       │
//! │ Driver       │                 │ Store (S3)   │
//! └──────────────┘                 └──────────────┘
//!        │                                ▲
//!        ▼                                │ put derivative
//! ┌──────────────┐    ┌──────────────┐    │
//! │ Metadata     │    │ Thumbnail    │────┘
//! │ Recorder     │    │ Generator    │
//! └──────────────┘    └──────────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌──────────────────────────────────┐
//! │ Metadata Table (DynamoDB)        │
//! └──────────────────────────────────┘
//! ```

pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod metadata_recorder;
pub mod metadata_table;
pub mod notification;
pub mod object_store;
pub mod record;
pub mod thumbnail;

pub use batch::{
    process_batch, BatchReport, BatchResponse, Disposition, OutcomeStatus, RecordHandler,
    RecordOutcome,
};
pub use config::Config;
pub use error::{ConfigError, StoreError, ThumbnailError};
pub use metadata_recorder::MetadataRecorder;
pub use metadata_table::{DynamoMetadataTable, MetadataTable};
pub use notification::{NotificationBatch, NotificationRecord, ObjectRef};
pub use object_store::{ObjectHead, ObjectStore, S3ObjectStore};
pub use record::{MetadataRecord, ObjectMetadata, RecordDetail};
pub use thumbnail::ThumbnailGenerator;
