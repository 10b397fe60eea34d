use crate::{
    application::{
        reliability::{circuit_breaker::CircuitBreakerConfig, retry_policy::RetryPolicy},
        usercases::{recording_download::DownloadConfig, recording_ingestion::SchedulerConfig},
    },
    infrastructure::{
        http::recording_source::BasicCredentials,
        storages::s3_recording_storage::RecordingStorageConfig,
    },
};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub recording_ingestion: RecordingIngestion,
    pub recording_storage: RecordingStorageConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct RecordingIngestion {
    pub download: DownloadConfig,
    pub retry_policy: RetryPolicy,
    pub source_credentials: Option<BasicCredentials>,
    pub storage_breaker: CircuitBreakerConfig,
    pub scheduler: SchedulerConfig,
}
