use std::fmt::Display;

use thiserror::Error;

use super::enums::recording_statuses::RecordingStatus;

/// Stage of a single ingestion run.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    #[default]
    Queued,
    Downloading,
    Validating,
    Uploading,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    RunStarted,
    DownloadSucceeded,
    DownloadFailed,
    ValidationPassed,
    ValidationFailed,
    UploadSucceeded,
    UploadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal pipeline transition: {event:?} while {stage}")]
pub struct IllegalTransition {
    pub stage: PipelineStage,
    pub event: PipelineEvent,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }

    pub fn advance(self, event: PipelineEvent) -> Result<PipelineStage, IllegalTransition> {
        use PipelineEvent as E;
        use PipelineStage as S;

        let next = match (self, event) {
            (S::Queued, E::RunStarted) => S::Downloading,
            (S::Downloading, E::DownloadSucceeded) => S::Validating,
            (S::Downloading, E::DownloadFailed) => S::Failed,
            (S::Validating, E::ValidationPassed) => S::Uploading,
            (S::Validating, E::ValidationFailed) => S::Failed,
            (S::Uploading, E::UploadSucceeded) => S::Completed,
            (S::Uploading, E::UploadFailed) => S::Failed,
            (stage, event) => return Err(IllegalTransition { stage, event }),
        };

        Ok(next)
    }

    /// The failure event for the stage a run was in when it broke off.
    pub fn failure_event(&self) -> Option<PipelineEvent> {
        match self {
            PipelineStage::Downloading => Some(PipelineEvent::DownloadFailed),
            PipelineStage::Validating => Some(PipelineEvent::ValidationFailed),
            PipelineStage::Uploading => Some(PipelineEvent::UploadFailed),
            PipelineStage::Queued | PipelineStage::Completed | PipelineStage::Failed => None,
        }
    }

    /// Status written to the call record on entering this stage. `Validating`
    /// has no persisted counterpart; `validated` is written once it passes.
    pub fn persisted_status(&self) -> Option<RecordingStatus> {
        match self {
            PipelineStage::Queued => Some(RecordingStatus::Queued),
            PipelineStage::Downloading => Some(RecordingStatus::Downloading),
            PipelineStage::Validating => None,
            PipelineStage::Uploading => Some(RecordingStatus::Uploading),
            PipelineStage::Completed => Some(RecordingStatus::Completed),
            PipelineStage::Failed => Some(RecordingStatus::Failed),
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            PipelineStage::Queued => "queued",
            PipelineStage::Downloading => "downloading",
            PipelineStage::Validating => "validating",
            PipelineStage::Uploading => "uploading",
            PipelineStage::Completed => "completed",
            PipelineStage::Failed => "failed",
        };
        write!(f, "{}", stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_completed() {
        let stage = PipelineStage::Queued
            .advance(PipelineEvent::RunStarted)
            .and_then(|s| s.advance(PipelineEvent::DownloadSucceeded))
            .and_then(|s| s.advance(PipelineEvent::ValidationPassed))
            .and_then(|s| s.advance(PipelineEvent::UploadSucceeded))
            .unwrap();

        assert_eq!(stage, PipelineStage::Completed);
        assert!(stage.is_terminal());
    }

    #[test]
    fn each_working_stage_can_fail() {
        assert_eq!(
            PipelineStage::Downloading.advance(PipelineEvent::DownloadFailed),
            Ok(PipelineStage::Failed)
        );
        assert_eq!(
            PipelineStage::Validating.advance(PipelineEvent::ValidationFailed),
            Ok(PipelineStage::Failed)
        );
        assert_eq!(
            PipelineStage::Uploading.advance(PipelineEvent::UploadFailed),
            Ok(PipelineStage::Failed)
        );
    }

    #[test]
    fn failure_event_matches_working_stage() {
        for stage in [
            PipelineStage::Downloading,
            PipelineStage::Validating,
            PipelineStage::Uploading,
        ] {
            let event = stage.failure_event().unwrap();
            assert_eq!(stage.advance(event), Ok(PipelineStage::Failed));
        }
        assert_eq!(PipelineStage::Completed.failure_event(), None);
    }

    #[test]
    fn terminal_stages_accept_no_events() {
        for terminal in [PipelineStage::Completed, PipelineStage::Failed] {
            for event in [
                PipelineEvent::RunStarted,
                PipelineEvent::DownloadSucceeded,
                PipelineEvent::UploadFailed,
            ] {
                assert_eq!(
                    terminal.advance(event),
                    Err(IllegalTransition {
                        stage: terminal,
                        event
                    })
                );
            }
        }
    }

    #[test]
    fn stages_cannot_be_skipped() {
        assert!(
            PipelineStage::Queued
                .advance(PipelineEvent::UploadSucceeded)
                .is_err()
        );
        assert!(
            PipelineStage::Downloading
                .advance(PipelineEvent::ValidationPassed)
                .is_err()
        );
    }
}
