use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, prelude::*, update};
use tracing::debug;
use uuid::Uuid;

use crate::{
    domain::{
        entities::call_recordings::{
            RecordingCompletedChangeset, RecordingFailedChangeset, RecordingProgressChangeset,
            RecordingQueuedChangeset,
        },
        repositories::recording_state::RecordingStateRepository,
        value_objects::enums::recording_statuses::RecordingStatus,
    },
    infrastructure::postgres::{postgres_connection::PgPool, schema::calls},
};

pub struct RecordingStatePostgres {
    db_pool: Arc<PgPool>,
}

impl RecordingStatePostgres {
    pub fn new(db_pool: Arc<PgPool>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RecordingStateRepository for RecordingStatePostgres {
    async fn mark_queued(&self, call_id: Uuid, call_sid: String) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changes = RecordingQueuedChangeset {
            recording_status: RecordingStatus::Queued.to_string(),
            recording_storage_key: Some(None),
            recording_size_bytes: Some(None),
            recording_error: Some(None),
            recording_completed_at: Some(None),
            recording_failed_at: Some(None),
            updated_at: Utc::now(),
        };

        let completed = RecordingStatus::Completed.to_string();
        let updated = update(
            calls::table
                .filter(calls::id.eq(call_id))
                .filter(calls::call_sid.eq(&call_sid))
                .filter(
                    calls::recording_status
                        .is_null()
                        .or(calls::recording_status.ne(&completed)),
                ),
        )
        .set(&changes)
        .execute(&mut conn)?;

        if updated > 0 {
            return Ok(true);
        }

        let current = calls::table
            .filter(calls::id.eq(call_id))
            .filter(calls::call_sid.eq(&call_sid))
            .select(calls::recording_status)
            .first::<Option<String>>(&mut conn)
            .optional()?;

        match current {
            Some(Some(status)) if status == completed => Ok(false),
            _ => bail!("call {call_id} with callSid {call_sid} not found"),
        }
    }

    async fn mark_progress(&self, call_id: Uuid, status: RecordingStatus) -> Result<()> {
        if status.is_terminal() {
            bail!("{status} is terminal and cannot be written as progress");
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changes = RecordingProgressChangeset {
            recording_status: status.to_string(),
            updated_at: Utc::now(),
        };
        let terminal = vec![
            RecordingStatus::Completed.to_string(),
            RecordingStatus::Failed.to_string(),
        ];

        let updated = update(
            calls::table.filter(calls::id.eq(call_id)).filter(
                calls::recording_status
                    .is_null()
                    .or(calls::recording_status.ne_all(terminal)),
            ),
        )
        .set(&changes)
        .execute(&mut conn)?;

        if updated == 0 {
            debug!(
                %call_id,
                status = %status,
                "recording_state: progress skipped; call missing or already terminal"
            );
        }

        Ok(())
    }

    async fn mark_completed(
        &self,
        call_id: Uuid,
        storage_key: String,
        duration_sec: i32,
        size_bytes: i64,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let changes = RecordingCompletedChangeset {
            recording_status: RecordingStatus::Completed.to_string(),
            recording_storage_key: storage_key,
            recording_duration_sec: duration_sec,
            recording_size_bytes: size_bytes,
            recording_error: Some(None),
            recording_completed_at: now,
            updated_at: now,
        };

        let updated = update(calls::table.filter(calls::id.eq(call_id)))
            .set(&changes)
            .execute(&mut conn)?;

        if updated == 0 {
            bail!("call {call_id} not found");
        }

        Ok(())
    }

    async fn mark_failed(&self, call_id: Uuid, error_message: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let changes = RecordingFailedChangeset {
            recording_status: RecordingStatus::Failed.to_string(),
            recording_error: error_message,
            recording_failed_at: now,
            updated_at: now,
        };

        let updated = update(calls::table.filter(calls::id.eq(call_id)))
            .set(&changes)
            .execute(&mut conn)?;

        if updated == 0 {
            bail!("call {call_id} not found");
        }

        Ok(())
    }
}
