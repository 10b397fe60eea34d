#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use recording_ingest::{
    application::{
        reliability::{
            circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
            clock::Clock,
            retry_policy::RetryPolicy,
        },
        usercases::{
            recording_download::{DownloadConfig, RecordingDownloadUseCase},
            recording_pipeline::RecordingPipelineUseCase,
            recording_upload::RecordingUploadUseCase,
            recording_validation::RecordingValidationUseCase,
        },
    },
    domain::{
        repositories::{recording_state::RecordingStateRepository, storage::RecordingStorageClient},
        value_objects::{
            enums::recording_statuses::RecordingStatus, ingestion_errors::IngestionError,
        },
    },
    infrastructure::http::recording_source::HttpRecordingSourceClient,
};
use uuid::Uuid;

/// Backoff sleeps return immediately and move this clock forward.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: usize,
    pub content_type: String,
}

#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<Vec<StoredObject>>,
    failing: Mutex<bool>,
    put_attempts: AtomicUsize,
}

impl InMemoryStorage {
    pub fn fail_uploads(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    /// Every `put_recording` call, successful or not.
    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordingStorageClient for InMemoryStorage {
    async fn put_recording(
        &self,
        object_key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), IngestionError> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(IngestionError::UploadRejected(
                "bucket refused the object".to_string(),
            ));
        }
        self.objects.lock().unwrap().push(StoredObject {
            key: object_key.to_string(),
            size_bytes: body.len(),
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRecordingRow {
    pub status: Option<RecordingStatus>,
    pub storage_key: Option<String>,
    pub size_bytes: Option<i64>,
    pub duration_sec: Option<i32>,
    pub error: Option<String>,
    pub history: Vec<RecordingStatus>,
}

/// Single call record, enough to observe what a run persisted.
#[derive(Default)]
pub struct InMemoryStateStore {
    row: Mutex<CallRecordingRow>,
}

impl InMemoryStateStore {
    pub fn row(&self) -> CallRecordingRow {
        self.row.lock().unwrap().clone()
    }

    fn write(&self, status: RecordingStatus) -> std::sync::MutexGuard<'_, CallRecordingRow> {
        let mut row = self.row.lock().unwrap();
        row.status = Some(status);
        row.history.push(status);
        row
    }
}

#[async_trait]
impl RecordingStateRepository for InMemoryStateStore {
    async fn mark_queued(&self, _call_id: Uuid, _call_sid: String) -> Result<bool> {
        if self.row().status == Some(RecordingStatus::Completed) {
            return Ok(false);
        }
        let mut row = self.write(RecordingStatus::Queued);
        row.storage_key = None;
        row.size_bytes = None;
        row.error = None;
        Ok(true)
    }

    async fn mark_progress(&self, _call_id: Uuid, status: RecordingStatus) -> Result<()> {
        if self.row().status.is_some_and(|current| current.is_terminal()) {
            return Ok(());
        }
        self.write(status);
        Ok(())
    }

    async fn mark_completed(
        &self,
        _call_id: Uuid,
        storage_key: String,
        duration_sec: i32,
        size_bytes: i64,
    ) -> Result<()> {
        let mut row = self.write(RecordingStatus::Completed);
        row.storage_key = Some(storage_key);
        row.duration_sec = Some(duration_sec);
        row.size_bytes = Some(size_bytes);
        Ok(())
    }

    async fn mark_failed(&self, _call_id: Uuid, error_message: String) -> Result<()> {
        let mut row = self.write(RecordingStatus::Failed);
        row.error = Some(error_message);
        Ok(())
    }
}

pub struct Harness {
    pub pipeline: Arc<RecordingPipelineUseCase>,
    pub storage: Arc<InMemoryStorage>,
    pub state: Arc<InMemoryStateStore>,
    pub breaker: Arc<CircuitBreaker>,
}

pub fn harness(breaker_config: CircuitBreakerConfig) -> Harness {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
    let storage = Arc::new(InMemoryStorage::default());
    let state = Arc::new(InMemoryStateStore::default());
    let breaker = Arc::new(CircuitBreaker::new(
        "recording-storage",
        breaker_config,
        Arc::clone(&clock),
    ));

    let source = HttpRecordingSourceClient::new(None).expect("http client builds");
    let download_config = DownloadConfig {
        attempt_timeout: Duration::from_secs(5),
        max_size_bytes: 1024 * 1024,
    };

    let pipeline = RecordingPipelineUseCase::new(
        RecordingDownloadUseCase::new(
            Arc::new(source),
            RetryPolicy::new(3, Duration::from_millis(100)),
            clock,
            download_config,
        ),
        RecordingValidationUseCase::new(download_config.max_size_bytes),
        RecordingUploadUseCase::new(
            storage.clone() as Arc<dyn RecordingStorageClient + Send + Sync>,
            Arc::clone(&breaker),
            "recordings",
        ),
        state.clone() as Arc<dyn RecordingStateRepository + Send + Sync>,
    );

    Harness {
        pipeline: Arc::new(pipeline),
        storage,
        state,
        breaker,
    }
}

/// RIFF header followed by zero padding.
pub fn wav_bytes(len: usize) -> Vec<u8> {
    let mut body = vec![0u8; len];
    body[..4].copy_from_slice(b"RIFF");
    body
}
