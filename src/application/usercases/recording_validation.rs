use tracing::{debug, warn};

use crate::domain::value_objects::{
    ingestion_errors::IngestionError,
    recording_validation::{AudioContainer, ValidationAdvisory, ValidationReport},
};

const SIGNATURE_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct RecordingValidationUseCase {
    max_size_bytes: u64,
}

impl RecordingValidationUseCase {
    pub fn new(max_size_bytes: u64) -> Self {
        Self { max_size_bytes }
    }

    /// Size checks are fatal. An unrecognised header is only an advisory:
    /// some provider payloads are valid audio without a known signature.
    pub fn validate(&self, body: &[u8], call_sid: &str) -> Result<ValidationReport, IngestionError> {
        if body.is_empty() {
            return Err(IngestionError::InvalidRecording(
                "recording buffer is empty".to_string(),
            ));
        }

        let size_bytes = body.len();
        if size_bytes as u64 > self.max_size_bytes {
            return Err(IngestionError::InvalidRecording(format!(
                "recording is {} bytes, exceeds ceiling of {} bytes",
                size_bytes, self.max_size_bytes
            )));
        }

        let header = &body[..size_bytes.min(SIGNATURE_LEN)];
        let container = AudioContainer::sniff(header);

        let advisory = match container {
            Some(container) => {
                debug!(call_sid, %container, size_bytes, "recording_validation: signature recognised");
                None
            }
            None => {
                let header_hex = hex_preview(header);
                warn!(
                    call_sid,
                    size_bytes,
                    header = %header_hex,
                    "recording_validation: unrecognised audio signature; continuing"
                );
                Some(ValidationAdvisory { header_hex })
            }
        };

        Ok(ValidationReport {
            size_bytes,
            container,
            advisory,
        })
    }
}

fn hex_preview(header: &[u8]) -> String {
    header
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
