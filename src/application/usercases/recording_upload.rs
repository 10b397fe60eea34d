use std::sync::Arc;

use bytes::Bytes;
use chrono::{Datelike, Utc};
use mime_guess::MimeGuess;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    application::reliability::circuit_breaker::CircuitBreaker,
    domain::{
        repositories::storage::RecordingStorageClient,
        value_objects::{ingestion_errors::IngestionError, recording_validation::AudioContainer},
    },
};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

pub struct RecordingUploadUseCase {
    storage: Arc<dyn RecordingStorageClient + Send + Sync>,
    breaker: Arc<CircuitBreaker>,
    key_prefix: String,
}

impl RecordingUploadUseCase {
    pub fn new(
        storage: Arc<dyn RecordingStorageClient + Send + Sync>,
        breaker: Arc<CircuitBreaker>,
        key_prefix: &str,
    ) -> Self {
        Self {
            storage,
            breaker,
            key_prefix: normalize_prefix(key_prefix),
        }
    }

    /// Writes the recording through the storage breaker and returns its key.
    ///
    /// There is no retry loop here. A failed or rejected upload goes straight
    /// back to the caller; recovery happens through the breaker cooldown.
    pub async fn upload(
        &self,
        call_id: Uuid,
        call_sid: &str,
        body: Bytes,
        duration_sec: i32,
        container: Option<AudioContainer>,
    ) -> Result<String, IngestionError> {
        let now = Utc::now();
        let object_key =
            build_storage_key(&self.key_prefix, now.year(), now.month(), call_id, call_sid);
        let content_type = content_type_for(container);
        let size_bytes = body.len();

        let storage = Arc::clone(&self.storage);
        let key = object_key.clone();
        self.breaker
            .call(
                move || async move { storage.put_recording(&key, body, &content_type).await },
                |err: &IngestionError| {
                    let snapshot = self.breaker.snapshot();
                    error!(
                        %call_id,
                        call_sid,
                        storage_key = %object_key,
                        breaker = %self.breaker.name(),
                        breaker_mode = ?snapshot.mode,
                        consecutive_failures = snapshot.consecutive_failures,
                        error = %err,
                        "recording_upload: storage upload failed"
                    );
                },
            )
            .await?;

        info!(
            %call_id,
            call_sid,
            storage_key = %object_key,
            size_bytes,
            duration_sec,
            "recording_upload: storage upload completed"
        );

        Ok(object_key)
    }
}

/// `{prefix}{yyyy}/{mm}/{call_id}/{call_sid}`; same inputs, same key.
pub fn build_storage_key(
    prefix: &str,
    year: i32,
    month: u32,
    call_id: Uuid,
    call_sid: &str,
) -> String {
    format!("{prefix}{year:04}/{month:02}/{call_id}/{call_sid}")
}

fn content_type_for(container: Option<AudioContainer>) -> String {
    container
        .and_then(|container| MimeGuess::from_ext(container.extension()).first())
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}
