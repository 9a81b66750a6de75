use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use lumen_indexer::bootstrap::{invoke, load_sdk_config, start};
use lumen_indexer::{
    BatchResponse, DynamoMetadataTable, MetadataTable, NotificationBatch, ObjectStore,
    S3ObjectStore, ThumbnailGenerator,
};
use std::sync::Arc;
use tracing::info;

async fn handle(
    generator: &ThumbnailGenerator,
    event: LambdaEvent<NotificationBatch>,
) -> Result<BatchResponse, Error> {
    info!(
        request_id = %event.context.request_id,
        records = event.payload.records.len(),
        "Event received"
    );

    Ok(invoke(generator, event.payload).await?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = start("thumbnail")?;

    info!(
        prefix = %config.thumbnail.prefix,
        size = config.thumbnail.size,
        format = %config.thumbnail.format,
        "Thumbnail settings"
    );

    let sdk_config = load_sdk_config(&config.aws).await;
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&sdk_config, &config.aws));
    let table: Arc<dyn MetadataTable> = Arc::new(DynamoMetadataTable::new(
        &sdk_config,
        &config.aws,
        config.table.name.clone(),
    ));

    let generator = ThumbnailGenerator::new(store, table, &config.thumbnail);

    run(service_fn(|event| handle(&generator, event))).await
}
