pub mod recording_download;
pub mod recording_ingestion;
pub mod recording_pipeline;
pub mod recording_upload;
pub mod recording_validation;
