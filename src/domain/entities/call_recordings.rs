use chrono::{DateTime, Utc};
use diesel::AsChangeset;

use crate::infrastructure::postgres::schema::calls;

// Ingestion only ever updates the recording columns of a call row; the row
// itself belongs to the calls CRUD layer.

/// Re-queuing clears the outcome of any earlier run.
#[derive(AsChangeset)]
#[diesel(table_name = calls)]
pub struct RecordingQueuedChangeset {
    pub recording_status: String,
    pub recording_storage_key: Option<Option<String>>,
    pub recording_size_bytes: Option<Option<i64>>,
    pub recording_error: Option<Option<String>>,
    pub recording_completed_at: Option<Option<DateTime<Utc>>>,
    pub recording_failed_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = calls)]
pub struct RecordingProgressChangeset {
    pub recording_status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = calls)]
pub struct RecordingCompletedChangeset {
    pub recording_status: String,
    pub recording_storage_key: String,
    pub recording_duration_sec: i32,
    pub recording_size_bytes: i64,
    pub recording_error: Option<Option<String>>,
    pub recording_completed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(AsChangeset)]
#[diesel(table_name = calls)]
pub struct RecordingFailedChangeset {
    pub recording_status: String,
    pub recording_error: String,
    pub recording_failed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
