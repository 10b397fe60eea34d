use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Recording lifecycle persisted on the owning call record.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    #[default]
    Queued,
    Downloading,
    Validated,
    Uploading,
    Completed,
    Failed,
}

impl RecordingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordingStatus::Completed | RecordingStatus::Failed)
    }
}

impl Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let recording_status = match self {
            RecordingStatus::Queued => "queued",
            RecordingStatus::Downloading => "downloading",
            RecordingStatus::Validated => "validated",
            RecordingStatus::Uploading => "uploading",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Failed => "failed",
        };
        write!(f, "{}", recording_status)
    }
}

impl FromStr for RecordingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RecordingStatus::Queued),
            "downloading" => Ok(RecordingStatus::Downloading),
            "validated" => Ok(RecordingStatus::Validated),
            "uploading" => Ok(RecordingStatus::Uploading),
            "completed" => Ok(RecordingStatus::Completed),
            "failed" => Ok(RecordingStatus::Failed),
            other => Err(anyhow::anyhow!("Unsupported recording status: {}", other)),
        }
    }
}
