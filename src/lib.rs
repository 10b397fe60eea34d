pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod observability;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use application::{
    reliability::{
        circuit_breaker::CircuitBreaker,
        clock::{Clock, TokioClock},
    },
    usercases::{
        recording_download::RecordingDownloadUseCase,
        recording_ingestion::RecordingIngestionUseCase,
        recording_pipeline::RecordingPipelineUseCase,
        recording_upload::RecordingUploadUseCase,
        recording_validation::RecordingValidationUseCase,
    },
};
use domain::repositories::{
    recording_source::RecordingSourceClient, recording_state::RecordingStateRepository,
    storage::RecordingStorageClient,
};
use infrastructure::{
    axum_http::http_serve,
    http::recording_source::HttpRecordingSourceClient,
    postgres::{postgres_connection, repositories::recording_state::RecordingStatePostgres},
    storages::s3_recording_storage::S3RecordingStorageClient,
};

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("recording-ingest")?;

    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let state: Arc<dyn RecordingStateRepository + Send + Sync> =
        Arc::new(RecordingStatePostgres::new(Arc::new(postgres_pool)));

    let ingestion = dotenvy_env.recording_ingestion.clone();
    let source: Arc<dyn RecordingSourceClient + Send + Sync> = Arc::new(
        HttpRecordingSourceClient::new(ingestion.source_credentials.clone())?,
    );
    let storage: Arc<dyn RecordingStorageClient + Send + Sync> =
        Arc::new(S3RecordingStorageClient::new(&dotenvy_env.recording_storage).await?);
    info!(
        bucket = %dotenvy_env.recording_storage.bucket,
        "Recording storage client has been configured"
    );

    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let breaker = Arc::new(CircuitBreaker::new(
        "recording-storage",
        ingestion.storage_breaker,
        Arc::clone(&clock),
    ));

    let downloader = RecordingDownloadUseCase::new(
        source,
        ingestion.retry_policy,
        clock,
        ingestion.download,
    );
    let validator = RecordingValidationUseCase::new(ingestion.download.max_size_bytes);
    let uploader = RecordingUploadUseCase::new(
        storage,
        breaker,
        &dotenvy_env.recording_storage.key_prefix,
    );
    let pipeline = Arc::new(RecordingPipelineUseCase::new(
        downloader,
        validator,
        uploader,
        Arc::clone(&state),
    ));

    let (usecase, dispatcher) =
        RecordingIngestionUseCase::new(pipeline, state, ingestion.scheduler);
    let usecase = Arc::new(usecase);

    info!(
        max_concurrent_runs = ingestion.scheduler.max_concurrent_runs,
        queue_capacity = ingestion.scheduler.queue_capacity,
        "Recording ingestion started"
    );

    let mut dispatcher = tokio::spawn(dispatcher.run());
    let server_config = dotenvy_env.worker_server.clone();
    let server = tokio::spawn(http_serve::start(server_config, usecase));

    tokio::select! {
        result = &mut dispatcher => result??,
        result = server => {
            result??;
            // Server dropped its handle, so the queue is closed; let accepted runs finish.
            info!("Draining accepted recording ingestion runs");
            dispatcher.await??;
        }
    };

    Ok(())
}
