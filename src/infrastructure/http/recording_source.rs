use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::{
    application::reliability::retry_policy::is_retryable_status,
    domain::{
        repositories::recording_source::RecordingSourceClient,
        value_objects::ingestion_errors::IngestionError,
    },
};

#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Fetches recordings from the telephony provider over HTTP.
pub struct HttpRecordingSourceClient {
    client: Client,
    credentials: Option<BasicCredentials>,
}

impl HttpRecordingSourceClient {
    pub fn new(credentials: Option<BasicCredentials>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build recording source http client")?;

        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl RecordingSourceClient for HttpRecordingSourceClient {
    async fn fetch(&self, url: &Url, max_size_bytes: u64) -> Result<Bytes, IngestionError> {
        let mut request = self.client.get(url.clone());
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().await.map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > max_size_bytes {
                return Err(oversized(content_length, max_size_bytes));
            }
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| {
                IngestionError::transient(format!("failed to read recording body: {err}"))
            })?;

            let received = (body.len() + chunk.len()) as u64;
            if received > max_size_bytes {
                return Err(oversized(received, max_size_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            status = status.as_u16(),
            size_bytes = body.len(),
            "recording_source: body received"
        );

        Ok(body.freeze())
    }
}

fn classify_request_error(err: reqwest::Error) -> IngestionError {
    let status = err.status().map(|status| status.as_u16());
    if err.is_builder() {
        return IngestionError::ClientContent {
            message: format!("recording request could not be built: {err}"),
            status,
        };
    }

    IngestionError::TransientTransport {
        message: format!("recording request failed: {err}"),
        status,
    }
}

fn classify_status(status: StatusCode) -> IngestionError {
    let message = format!("recording source responded {status}");
    let code = Some(status.as_u16());

    if is_retryable_status(status.as_u16()) {
        IngestionError::TransientTransport {
            message,
            status: code,
        }
    } else {
        IngestionError::ClientContent {
            message,
            status: code,
        }
    }
}

fn oversized(size_bytes: u64, max_size_bytes: u64) -> IngestionError {
    IngestionError::client_content(format!(
        "recording is at least {size_bytes} bytes, exceeds ceiling of {max_size_bytes} bytes"
    ))
}
