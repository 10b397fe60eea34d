use async_trait::async_trait;
use bytes::Bytes;
use mockall::automock;

use crate::domain::value_objects::ingestion_errors::IngestionError;

#[automock]
#[async_trait]
pub trait RecordingStorageClient {
    async fn put_recording(
        &self,
        object_key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), IngestionError>;
}
