use thiserror::Error;

/// Errors returned by the storage and table backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read object metadata for s3://{bucket}/{key}: {message}")]
    Head {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Failed to download s3://{bucket}/{key}: {message}")]
    Download {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Failed to upload s3://{bucket}/{key}: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Metadata table name is not configured")]
    TableNotConfigured,

    #[error("Failed to put item into table {table}: {message}")]
    PutItem { table: String, message: String },
}

/// Errors raised while deriving a thumbnail from an image payload
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Unsupported thumbnail format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode {format} thumbnail: {message}")]
    Encode { format: String, message: String },

    #[error("Thumbnail task panicked: {0}")]
    TaskFailed(String),
}

/// Configuration validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
