use crate::error::{ConfigError, ThumbnailError};
use crate::thumbnail::ThumbnailFormat;
use serde::Deserialize;
use tracing::{error, info, warn};

/// Deployment variables set by the function template, mapped onto config keys.
///
/// They sit above the built-in defaults but below config files and
/// `LUMEN__*` variables.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DDB_TABLE", "table.name"),
    ("THUMBNAIL_PREFIX", "thumbnail.prefix"),
    ("THUMBNAIL_SIZE", "thumbnail.size"),
    ("THUMBNAIL_FORMAT", "thumbnail.format"),
    ("BUCKET_NAME", "service.source_bucket"),
];

/// Main configuration shared by both handlers
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Metadata table configuration
    #[serde(default)]
    pub table: TableConfig,
    /// Thumbnail derivation configuration
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
    /// AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bucket the notifications are expected to come from (informational)
    #[serde(default)]
    pub source_bucket: Option<String>,
}

/// Metadata table configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableConfig {
    /// Table name. Required, but only enforced when an item is written.
    #[serde(default)]
    pub name: Option<String>,
}

/// Thumbnail derivation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailConfig {
    /// Key prefix for derivative objects
    #[serde(default = "default_thumbnail_prefix")]
    pub prefix: String,
    /// Maximum width and height of a derivative, in pixels
    #[serde(default = "default_thumbnail_size")]
    pub size: u32,
    /// Target encode format name (case-insensitive)
    #[serde(default = "default_thumbnail_format")]
    pub format: String,
}

/// AWS client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsConfig {
    /// Region override; the SDK default chain is used when unset
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Force path-style S3 access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_service_name() -> String {
    "lumen-indexer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_thumbnail_prefix() -> String {
    "thumbnails/".to_string()
}

fn default_thumbnail_size() -> u32 {
    200
}

fn default_thumbnail_format() -> String {
    "JPEG".to_string()
}

impl Config {
    /// Load configuration from defaults, config files and the environment
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|name| std::env::var(name).ok(), None)
    }

    /// Load configuration with an injectable environment.
    ///
    /// `legacy` resolves the deployment variables in [`LEGACY_ENV_KEYS`];
    /// `environment` replaces the process environment for `LUMEN__*` lookups.
    fn load_with<F>(
        legacy: F,
        environment: Option<config::Map<String, String>>,
    ) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("service.name", default_service_name())?
            .set_default("service.log_level", default_log_level())?
            .set_default("thumbnail.prefix", default_thumbnail_prefix())?
            .set_default("thumbnail.size", i64::from(default_thumbnail_size()))?
            .set_default("thumbnail.format", default_thumbnail_format())?;

        for (variable, key) in LEGACY_ENV_KEYS {
            if let Some(value) = legacy(*variable) {
                builder = builder.set_default(*key, value)?;
            }
        }

        let config = builder
            // Add config file if present
            .add_source(config::File::with_name("config/lumen").required(false))
            .add_source(config::File::with_name("/etc/lumen/lumen").required(false))
            // LUMEN__TABLE__NAME -> table.name
            .add_source(
                config::Environment::with_prefix("LUMEN")
                    .separator("__")
                    .try_parsing(true)
                    .source(environment),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Reject settings that would make the thumbnail pipeline misbehave.
    ///
    /// A missing table name is not rejected here; see [`Config::report_table`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail.size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "thumbnail.size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        // An empty prefix would make every key look like a derivative
        if self.thumbnail.prefix.is_empty() {
            return Err(ConfigError::MissingField("thumbnail.prefix".to_string()));
        }

        if self.thumbnail.format.trim().is_empty() {
            return Err(ConfigError::MissingField("thumbnail.format".to_string()));
        }

        if let Err(e) = self.thumbnail.encode_format() {
            warn!(
                format = %self.thumbnail.format,
                error = %e,
                "Thumbnail format cannot be encoded; every thumbnail will fail"
            );
        }

        Ok(())
    }

    /// Log the table configuration at startup.
    ///
    /// Returns false when the table name is missing, in which case every
    /// write fails per record.
    pub fn report_table(&self) -> bool {
        match self.table.name.as_deref() {
            Some(name) if !name.is_empty() => {
                info!(table = %name, "Metadata table configured");
                true
            }
            _ => {
                error!("Metadata table name not set (DDB_TABLE or LUMEN__TABLE__NAME)");
                false
            }
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            source_bucket: None,
        }
    }
}

impl ThumbnailConfig {
    /// Resolve the configured format the same way the encoder does
    pub fn encode_format(&self) -> Result<ThumbnailFormat, ThumbnailError> {
        ThumbnailFormat::parse(&self.format)
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            prefix: default_thumbnail_prefix(),
            size: default_thumbnail_size(),
            format: default_thumbnail_format(),
        }
    }
}
