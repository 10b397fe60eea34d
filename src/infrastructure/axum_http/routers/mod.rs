pub mod recording_ingestion;
