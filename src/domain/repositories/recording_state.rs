use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::recording_statuses::RecordingStatus;

/// Durable record of ingestion outcomes, stored on the owning call record.
#[automock]
#[async_trait]
pub trait RecordingStateRepository {
    /// Returns `false` when the call already completed; the row is left as is.
    /// A `failed` call may be queued again.
    async fn mark_queued(&self, call_id: Uuid, call_sid: String) -> Result<bool>;

    /// Intermediate status; never overwrites a terminal one.
    async fn mark_progress(&self, call_id: Uuid, status: RecordingStatus) -> Result<()>;

    async fn mark_completed(
        &self,
        call_id: Uuid,
        storage_key: String,
        duration_sec: i32,
        size_bytes: i64,
    ) -> Result<()>;

    async fn mark_failed(&self, call_id: Uuid, error_message: String) -> Result<()>;
}
