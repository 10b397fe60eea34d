use std::sync::Arc;

use tracing::{error, info, warn};

use super::{
    recording_download::RecordingDownloadUseCase, recording_upload::RecordingUploadUseCase,
    recording_validation::RecordingValidationUseCase,
};
use crate::domain::{
    repositories::recording_state::RecordingStateRepository,
    value_objects::{
        enums::recording_statuses::RecordingStatus,
        ingestion_errors::IngestionError,
        recording_jobs::RecordingJob,
        recording_pipeline::{PipelineEvent, PipelineStage},
    },
};

struct StoredRecording {
    storage_key: String,
    size_bytes: i64,
}

/// Runs one job through download, validation and upload, then writes the
/// outcome. Every run ends in exactly one terminal write attempt.
pub struct RecordingPipelineUseCase {
    downloader: RecordingDownloadUseCase,
    validator: RecordingValidationUseCase,
    uploader: RecordingUploadUseCase,
    state: Arc<dyn RecordingStateRepository + Send + Sync>,
}

impl RecordingPipelineUseCase {
    pub fn new(
        downloader: RecordingDownloadUseCase,
        validator: RecordingValidationUseCase,
        uploader: RecordingUploadUseCase,
        state: Arc<dyn RecordingStateRepository + Send + Sync>,
    ) -> Self {
        Self {
            downloader,
            validator,
            uploader,
            state,
        }
    }

    pub async fn run(&self, job: &RecordingJob) -> PipelineStage {
        let mut stage = PipelineStage::Queued;

        match self.drive(job, &mut stage).await {
            Ok(stored) => {
                info!(
                    call_id = %job.call_id,
                    call_sid = %job.call_sid,
                    storage_key = %stored.storage_key,
                    size_bytes = stored.size_bytes,
                    "recording_pipeline: run completed"
                );
                self.persist_completed(job, stored).await;
            }
            Err(err) => {
                let failed_in = stage;
                stage = failed_in
                    .failure_event()
                    .and_then(|event| failed_in.advance(event).ok())
                    .unwrap_or(PipelineStage::Failed);
                warn!(
                    call_id = %job.call_id,
                    call_sid = %job.call_sid,
                    stage = %failed_in,
                    error = %err,
                    "recording_pipeline: run failed"
                );
                self.persist_failed(job, &err).await;
            }
        }

        stage
    }

    async fn drive(
        &self,
        job: &RecordingJob,
        stage: &mut PipelineStage,
    ) -> Result<StoredRecording, IngestionError> {
        self.enter(job, stage, PipelineEvent::RunStarted).await?;
        let body = self
            .downloader
            .download(&job.recording_url, &job.call_sid, None)
            .await?;

        self.enter(job, stage, PipelineEvent::DownloadSucceeded).await?;
        let report = self.validator.validate(&body, &job.call_sid)?;
        let size_bytes = report.size_bytes as i64;

        self.enter(job, stage, PipelineEvent::ValidationPassed).await?;
        let storage_key = self
            .uploader
            .upload(
                job.call_id,
                &job.call_sid,
                body,
                job.recording_duration_sec,
                report.container,
            )
            .await?;

        self.enter(job, stage, PipelineEvent::UploadSucceeded).await?;
        Ok(StoredRecording {
            storage_key,
            size_bytes,
        })
    }

    /// Advances the stage and writes the matching intermediate status.
    /// Terminal statuses are written by `persist_completed` / `persist_failed`.
    async fn enter(
        &self,
        job: &RecordingJob,
        stage: &mut PipelineStage,
        event: PipelineEvent,
    ) -> Result<(), IngestionError> {
        let next = stage.advance(event)?;
        *stage = next;

        if event == PipelineEvent::ValidationPassed {
            self.record_progress(job, RecordingStatus::Validated).await;
        }
        if let Some(status) = next.persisted_status().filter(|status| !status.is_terminal()) {
            self.record_progress(job, status).await;
        }

        Ok(())
    }

    async fn record_progress(&self, job: &RecordingJob, status: RecordingStatus) {
        if let Err(err) = self.state.mark_progress(job.call_id, status).await {
            let err = IngestionError::Persistence(format!("{err:#}"));
            error!(
                call_id = %job.call_id,
                status = %status,
                error = %err,
                "recording_pipeline: failed to record progress"
            );
        }
    }

    async fn persist_completed(&self, job: &RecordingJob, stored: StoredRecording) {
        if let Err(err) = self
            .state
            .mark_completed(
                job.call_id,
                stored.storage_key,
                job.recording_duration_sec,
                stored.size_bytes,
            )
            .await
        {
            let err = IngestionError::Persistence(format!("{err:#}"));
            error!(
                call_id = %job.call_id,
                error = %err,
                "recording_pipeline: failed to mark recording completed"
            );
        }
    }

    async fn persist_failed(&self, job: &RecordingJob, cause: &IngestionError) {
        if let Err(err) = self
            .state
            .mark_failed(job.call_id, cause.to_string())
            .await
        {
            let err = IngestionError::Persistence(format!("{err:#}"));
            error!(
                call_id = %job.call_id,
                cause = %cause,
                error = %err,
                "recording_pipeline: failed to mark recording failed"
            );
        }
    }
}
