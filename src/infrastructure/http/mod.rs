pub mod recording_source;
