use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::{info, warn};
use url::Url;

use crate::{
    application::reliability::{
        clock::Clock,
        retry_policy::{RetryDecision, RetryPolicy},
    },
    domain::{
        repositories::recording_source::RecordingSourceClient,
        value_objects::ingestion_errors::IngestionError,
    },
};

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MAX_RECORDING_SIZE_BYTES: u64 = 104_857_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConfig {
    pub attempt_timeout: Duration,
    pub max_size_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_size_bytes: DEFAULT_MAX_RECORDING_SIZE_BYTES,
        }
    }
}

pub struct RecordingDownloadUseCase {
    source: Arc<dyn RecordingSourceClient + Send + Sync>,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    config: DownloadConfig,
}

impl RecordingDownloadUseCase {
    pub fn new(
        source: Arc<dyn RecordingSourceClient + Send + Sync>,
        retry_policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            source,
            retry_policy,
            clock,
            config,
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.config.max_size_bytes
    }

    /// Fetches the recording, retrying transient failures with backoff.
    ///
    /// Empty or oversized bodies and non-retryable 4xx responses fail on the
    /// spot. Running out of attempts yields `RetriesExhausted` wrapping the
    /// last error.
    pub async fn download(
        &self,
        url: &Url,
        call_sid: &str,
        attempt_timeout: Option<Duration>,
    ) -> Result<Bytes, IngestionError> {
        let attempt_timeout = attempt_timeout.unwrap_or(self.config.attempt_timeout);
        let max_attempts = self.retry_policy.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let fetched = match tokio::time::timeout(
                attempt_timeout,
                self.source.fetch(url, self.config.max_size_bytes),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(IngestionError::transient(format!(
                    "download timed out after {}ms",
                    attempt_timeout.as_millis()
                ))),
            };

            let err = match fetched {
                Ok(body) => {
                    self.check_body(&body)?;
                    info!(
                        call_sid,
                        attempt,
                        size_bytes = body.len(),
                        "recording_download: download completed"
                    );
                    return Ok(body);
                }
                Err(err) => err,
            };

            match self.retry_policy.decide(&err, attempt) {
                RetryDecision::Retry { delay } => {
                    warn!(
                        call_sid,
                        attempt,
                        max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "recording_download: attempt failed; retrying"
                    );
                    self.clock.sleep(delay).await;
                }
                RetryDecision::GiveUp if err.is_retryable() => {
                    warn!(
                        call_sid,
                        attempt,
                        error = %err,
                        "recording_download: retries exhausted"
                    );
                    return Err(IngestionError::RetriesExhausted {
                        attempts: attempt,
                        last_error: Box::new(err),
                    });
                }
                RetryDecision::GiveUp => {
                    warn!(
                        call_sid,
                        attempt,
                        error = %err,
                        "recording_download: non-retryable failure"
                    );
                    return Err(err);
                }
            }
        }
    }

    fn check_body(&self, body: &Bytes) -> Result<(), IngestionError> {
        if body.is_empty() {
            return Err(IngestionError::client_content("recording body is empty"));
        }

        let size = body.len() as u64;
        if size > self.config.max_size_bytes {
            return Err(IngestionError::client_content(format!(
                "recording is {} bytes, exceeds ceiling of {} bytes",
                size, self.config.max_size_bytes
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        application::reliability::{
            clock::testing::ManualClock,
            retry_policy::MAX_JITTER,
        },
        domain::repositories::recording_source::MockRecordingSourceClient,
    };

    const BASE: Duration = Duration::from_millis(1_000);

    fn recording_url() -> Url {
        Url::parse("https://api.provider.test/recordings/RE42").unwrap()
    }

    fn usecase(
        source: impl RecordingSourceClient + Send + Sync + 'static,
        clock: Arc<ManualClock>,
    ) -> RecordingDownloadUseCase {
        RecordingDownloadUseCase::new(
            Arc::new(source),
            RetryPolicy::new(3, BASE),
            clock,
            DownloadConfig {
                attempt_timeout: Duration::from_secs(60),
                max_size_bytes: 1_024,
            },
        )
    }

    fn status_error(status: u16) -> IngestionError {
        IngestionError::TransientTransport {
            message: format!("provider responded {status}"),
            status: Some(status),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let mut source = MockRecordingSourceClient::new();
        let mut calls = 0;
        source.expect_fetch().times(3).returning(move |_, _| {
            calls += 1;
            if calls < 3 {
                Err(status_error(503))
            } else {
                Ok(Bytes::from_static(b"RIFF....WAVE"))
            }
        });
        let clock = Arc::new(ManualClock::new());

        let body = usecase(source, Arc::clone(&clock))
            .download(&recording_url(), "CA42", None)
            .await
            .unwrap();

        assert_eq!(&body[..4], b"RIFF");
        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 2);
        for (index, delay) in sleeps.iter().enumerate() {
            let floor = BASE * 2u32.pow(index as u32);
            assert!(*delay >= floor && *delay < floor + MAX_JITTER, "{delay:?}");
        }
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let mut source = MockRecordingSourceClient::new();
        source
            .expect_fetch()
            .times(3)
            .returning(|_, _| Err(status_error(503)));
        let clock = Arc::new(ManualClock::new());

        let err = usecase(source, Arc::clone(&clock))
            .download(&recording_url(), "CA42", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestionError::RetriesExhausted { attempts: 3, .. }
        ));
        assert!(err.to_string().contains("after 3 attempts"), "got: {err}");
        assert_eq!(clock.sleeps().len(), 2, "no sleep after the final attempt");
    }

    #[tokio::test]
    async fn client_errors_fail_after_one_attempt() {
        for status in [400, 401, 403, 404, 410] {
            let mut source = MockRecordingSourceClient::new();
            source.expect_fetch().times(1).returning(move |_, _| {
                Err(IngestionError::ClientContent {
                    message: format!("provider responded {status}"),
                    status: Some(status),
                })
            });
            let clock = Arc::new(ManualClock::new());

            let err = usecase(source, Arc::clone(&clock))
                .download(&recording_url(), "CA42", None)
                .await
                .unwrap_err();

            assert!(matches!(err, IngestionError::ClientContent { .. }), "got: {err}");
            assert!(clock.sleeps().is_empty());
        }
    }

    #[tokio::test]
    async fn request_timeout_and_rate_limit_are_retried() {
        for status in [408, 429] {
            let mut source = MockRecordingSourceClient::new();
            source
                .expect_fetch()
                .times(3)
                .returning(move |_, _| Err(status_error(status)));
            let clock = Arc::new(ManualClock::new());

            let err = usecase(source, clock)
                .download(&recording_url(), "CA42", None)
                .await
                .unwrap_err();

            assert_eq!(err.status(), Some(status));
            assert!(matches!(err, IngestionError::RetriesExhausted { .. }));
        }
    }

    #[tokio::test]
    async fn empty_body_is_fatal_without_retry() {
        let mut source = MockRecordingSourceClient::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(Bytes::new()));
        let clock = Arc::new(ManualClock::new());

        let err = usecase(source, Arc::clone(&clock))
            .download(&recording_url(), "CA42", None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("empty"), "got: {err}");
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_fatal_without_retry() {
        let mut source = MockRecordingSourceClient::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(Bytes::from(vec![0u8; 1_025])));

        let err = usecase(source, Arc::new(ManualClock::new()))
            .download(&recording_url(), "CA42", None)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestionError::ClientContent { .. }));
        assert!(err.to_string().contains("exceeds ceiling"), "got: {err}");
    }

    struct StalledSource;

    #[async_trait]
    impl RecordingSourceClient for StalledSource {
        async fn fetch(&self, _url: &Url, _max_size_bytes: u64) -> Result<Bytes, IngestionError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(Bytes::from_static(b"late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_counts_as_transient_failure() {
        let err = usecase(StalledSource, Arc::new(ManualClock::new()))
            .download(
                &recording_url(),
                "CA42",
                Some(Duration::from_millis(250)),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestionError::RetriesExhausted { attempts: 3, .. }
        ));
        assert!(err.to_string().contains("timed out after 250ms"), "got: {err}");
    }
}
