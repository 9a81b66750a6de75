//! Process startup shared by the handler binaries.

use crate::batch::{process_batch, BatchResponse, RecordHandler};
use crate::config::{AwsConfig, Config};
use crate::notification::NotificationBatch;
use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_types::SdkConfig;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
pub fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Load configuration, start logging and report the settings the handlers rely on
pub fn start(handler_name: &str) -> Result<Config> {
    let config = Config::load().context("Failed to load configuration")?;

    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        handler = handler_name,
        source_bucket = config.service.source_bucket.as_deref().unwrap_or("<unset>"),
        "Starting handler"
    );

    config.validate().context("Invalid configuration")?;
    config.report_table();

    Ok(config)
}

/// Load shared AWS configuration, honouring a region override
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(ref region) = config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }

    loader.load().await
}

/// Run one invocation: process the batch and render the response
pub async fn invoke<H>(handler: &H, batch: NotificationBatch) -> Result<BatchResponse>
where
    H: RecordHandler + ?Sized,
{
    let report = process_batch(handler, &batch).await;
    report
        .into_response()
        .context("Failed to serialize batch response")
}
