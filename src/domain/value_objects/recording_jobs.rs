use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

// Call-completed job descriptor handed over by the webhook layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordingIngestionRequest {
    pub call_id: Uuid,
    pub call_sid: String,
    pub recording_url: String,
    /// Seconds; providers may send fractional values.
    pub recording_duration: f64,
}

impl RecordingIngestionRequest {
    pub fn to_job(self) -> Result<RecordingJob> {
        let call_sid = self.call_sid.trim().to_string();
        if call_sid.is_empty() {
            bail!("callSid is required");
        }

        let recording_url = Url::parse(self.recording_url.trim())
            .map_err(|err| anyhow::anyhow!("recordingUrl is invalid: {err}"))?;
        if !matches!(recording_url.scheme(), "http" | "https") {
            bail!("recordingUrl is invalid: unsupported scheme {}", recording_url.scheme());
        }

        let duration = self.recording_duration;
        if !duration.is_finite() {
            bail!("recordingDuration is invalid: must be a finite number");
        }
        if duration < 0.0 {
            bail!("recordingDuration is invalid: must not be negative");
        }
        if duration.round() > f64::from(i32::MAX) {
            bail!("recordingDuration is invalid: {duration} seconds is out of range");
        }

        Ok(RecordingJob {
            call_id: self.call_id,
            call_sid,
            recording_url,
            recording_duration_sec: duration.round() as i32,
        })
    }
}

/// One ingestion run's input. Never persisted; only the outcome is.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingJob {
    pub call_id: Uuid,
    pub call_sid: String,
    pub recording_url: Url,
    pub recording_duration_sec: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QueuedResponse {
    pub queued: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> RecordingIngestionRequest {
        RecordingIngestionRequest {
            call_id: Uuid::new_v4(),
            call_sid: "CA1234567890".to_string(),
            recording_url: url.to_string(),
            recording_duration: 42.0,
        }
    }

    #[test]
    fn deserializes_camel_case_descriptor() {
        let call_id = Uuid::new_v4();
        let raw = serde_json::json!({
            "callId": call_id,
            "callSid": "CA42",
            "recordingUrl": "https://api.provider.test/recordings/RE42",
            "recordingDuration": 17
        });

        let request: RecordingIngestionRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.call_id, call_id);
        assert_eq!(request.call_sid, "CA42");
        assert_eq!(request.recording_duration, 17.0);
    }

    #[test]
    fn fractional_duration_rounds_to_whole_seconds() {
        let raw = serde_json::json!({
            "callId": Uuid::new_v4(),
            "callSid": "CA42",
            "recordingUrl": "https://api.provider.test/recordings/RE42",
            "recordingDuration": 12.5
        });

        let parsed: RecordingIngestionRequest = serde_json::from_value(raw).unwrap();
        let job = parsed.to_job().unwrap();
        assert_eq!(job.recording_duration_sec, 13);

        let mut req = request("https://api.provider.test/recordings/RE1");
        req.recording_duration = 0.4;
        assert_eq!(req.to_job().unwrap().recording_duration_sec, 0);
    }

    #[test]
    fn negative_and_non_finite_durations_are_rejected() {
        for duration in [-1.0, -0.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e12] {
            let mut req = request("https://api.provider.test/recordings/RE1");
            req.recording_duration = duration;
            let err = req.to_job().unwrap_err().to_string();
            assert!(err.contains("recordingDuration is invalid"), "{duration}: {err}");
        }
    }

    #[test]
    fn valid_request_becomes_job() {
        let job = request("https://api.provider.test/recordings/RE1")
            .to_job()
            .unwrap();
        assert_eq!(job.call_sid, "CA1234567890");
        assert_eq!(job.recording_url.host_str(), Some("api.provider.test"));
        assert_eq!(job.recording_duration_sec, 42);
    }

    #[test]
    fn unsupported_urls_are_rejected() {
        for raw in ["not a url", "ftp://provider.test/rec.wav", "file:///tmp/rec.wav"] {
            let err = request(raw).to_job().unwrap_err().to_string();
            assert!(err.contains("recordingUrl is invalid"), "got: {err}");
        }
    }

    #[test]
    fn blank_call_sid_is_rejected() {
        let mut req = request("https://api.provider.test/recordings/RE1");
        req.call_sid = "   ".to_string();
        let err = req.to_job().unwrap_err().to_string();
        assert!(err.contains("callSid is required"), "got: {err}");
    }

    #[test]
    fn queued_response_serializes_as_flag() {
        let body = serde_json::to_value(QueuedResponse { queued: true }).unwrap();
        assert_eq!(body, serde_json::json!({ "queued": true }));
    }
}
