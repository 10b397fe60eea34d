use async_trait::async_trait;
use bytes::Bytes;
use mockall::automock;
use url::Url;

use crate::domain::value_objects::ingestion_errors::IngestionError;

#[automock]
#[async_trait]
pub trait RecordingSourceClient {
    /// Single fetch attempt. Implementations classify failures into
    /// `TransientTransport` or `ClientContent` and must not retry.
    async fn fetch(&self, url: &Url, max_size_bytes: u64) -> Result<Bytes, IngestionError>;
}
