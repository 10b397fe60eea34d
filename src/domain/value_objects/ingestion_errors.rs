use thiserror::Error;

use super::recording_pipeline::IllegalTransition;

/// Failure taxonomy shared by every stage of a recording ingestion run.
///
/// Only [`IngestionError::TransientTransport`] is retryable. Everything else
/// terminates the run and is written to the call record as a `failed` outcome.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Network failure, timeout, 408/429 or 5xx while talking to a remote.
    #[error("transient transport error{}: {message}", status_suffix(.status))]
    TransientTransport {
        message: String,
        status: Option<u16>,
    },

    /// 4xx other than 408/429, or a body that is empty or over the ceiling.
    #[error("client content error{}: {message}", status_suffix(.status))]
    ClientContent {
        message: String,
        status: Option<u16>,
    },

    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    /// Storage refused the object for a reason that retrying will not fix.
    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("circuit breaker open for {dependency}; call not attempted")]
    BreakerOpen { dependency: String },

    #[error("download failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: Box<IngestionError>,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl IngestionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientTransport {
            message: message.into(),
            status: None,
        }
    }

    pub fn client_content(message: impl Into<String>) -> Self {
        Self::ClientContent {
            message: message.into(),
            status: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientTransport { .. })
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TransientTransport { status, .. } | Self::ClientContent { status, .. } => *status,
            Self::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (status {code})"))
        .unwrap_or_default()
}
