use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, timeout::TimeoutConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::{Region, StalledStreamProtectionConfig},
    error::{ProvideErrorMetadata, SdkError},
    operation::put_object::PutObjectError,
    primitives::ByteStream,
    types::ServerSideEncryption,
};
use bytes::Bytes;
use http::Uri;
use tracing::info;

use crate::domain::{
    repositories::storage::RecordingStorageClient, value_objects::ingestion_errors::IngestionError,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const BODY_PREVIEW_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct RecordingStorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub key_prefix: String,
}

/// Durable recording storage on any S3-compatible endpoint.
pub struct S3RecordingStorageClient {
    client: Client,
    bucket: String,
}

impl S3RecordingStorageClient {
    pub async fn new(config: &RecordingStorageConfig) -> Result<Self> {
        let client = build_s3_client(config)
            .await
            .context("failed to build recording storage s3 client")?;

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl RecordingStorageClient for S3RecordingStorageClient {
    async fn put_recording(
        &self,
        object_key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), IngestionError> {
        let size_bytes = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .content_type(content_type)
            .content_length(size_bytes as i64)
            .body(ByteStream::from(body))
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|err| map_put_object_error(err, &self.bucket, object_key))?;

        info!(
            bucket = %self.bucket,
            key = %object_key,
            size_bytes,
            "recording_storage: object written"
        );

        Ok(())
    }
}

async fn build_s3_client(config: &RecordingStorageConfig) -> Result<Client> {
    let endpoint = format!("{}/", config.endpoint.trim_end_matches('/'));
    Uri::from_str(&endpoint).context("invalid s3 endpoint URL")?;

    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "recording-storage",
    );

    let region = Region::new(config.region.clone());
    let shared_config = aws_config::defaults(BehaviorVersion::latest())
        .region(region.clone())
        .credentials_provider(credentials)
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .read_timeout(READ_TIMEOUT)
                .build(),
        )
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
        .endpoint_url(endpoint)
        .force_path_style(true)
        .region(region)
        .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
        .build();

    Ok(Client::from_conf(s3_config))
}

fn is_retryable_s3_error<E>(err: &SdkError<E>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service_err) => {
            is_retryable_storage_status(service_err.raw().status().as_u16())
        }
        _ => false,
    }
}

fn is_retryable_storage_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..=599).contains(&status)
}

/// Transient storage failures feed the breaker as `TransientTransport`;
/// anything a retry cannot fix becomes `UploadRejected`.
fn map_put_object_error(
    err: SdkError<PutObjectError>,
    bucket: &str,
    object_key: &str,
) -> IngestionError {
    let retryable = is_retryable_s3_error(&err);

    let (status, detail) = match &err {
        SdkError::ServiceError(service_err) => {
            let raw = service_err.raw();
            let body = raw
                .body()
                .bytes()
                .map(|bytes| String::from_utf8_lossy(bytes).trim().to_owned())
                .unwrap_or_default();
            let status = raw.status().as_u16();
            let detail = describe_service_failure(
                status,
                service_err.err().code().unwrap_or("unknown"),
                service_err.err().message().unwrap_or_default(),
                &body,
                bucket,
                object_key,
            );
            (Some(status), detail)
        }
        other => (
            None,
            format!("failed to upload recording [bucket={bucket}, key={object_key}]: {other}"),
        ),
    };

    if retryable {
        IngestionError::TransientTransport {
            message: detail,
            status,
        }
    } else {
        IngestionError::UploadRejected(detail)
    }
}

fn describe_service_failure(
    status: u16,
    code: &str,
    message: &str,
    body: &str,
    bucket: &str,
    object_key: &str,
) -> String {
    let mut detail = format!("failed to upload recording (status {status}, code {code})");

    if !message.is_empty() {
        detail.push_str(&format!(": {message}"));
    }

    detail.push_str(&format!(" [bucket={bucket}, key={object_key}]"));

    if !body.is_empty() {
        let preview = body.chars().take(BODY_PREVIEW_CHARS).collect::<String>();
        detail.push_str(&format!("; body={preview}"));
    }

    detail
}
