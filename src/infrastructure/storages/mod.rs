pub mod s3_recording_storage;
