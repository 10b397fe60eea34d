use anyhow::Result;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = recording_ingest::run().await {
        error!("Recording ingestion exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}
