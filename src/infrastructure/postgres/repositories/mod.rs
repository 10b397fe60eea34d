pub mod recording_state;
