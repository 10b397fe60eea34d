pub mod call_recordings;
