pub mod recording_statuses;
