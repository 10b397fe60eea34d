pub mod enums;
pub mod ingestion_errors;
pub mod recording_jobs;
pub mod recording_pipeline;
pub mod recording_validation;
