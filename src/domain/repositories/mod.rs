pub mod recording_source;
pub mod recording_state;
pub mod storage;
