use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::{info, warn};

use crate::{
    application::usercases::recording_ingestion::{EnqueueError, RecordingIngestionUseCase},
    domain::value_objects::recording_jobs::RecordingIngestionRequest,
};

pub fn routes(usecase: Arc<RecordingIngestionUseCase>) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .with_state(usecase)
}

pub async fn ingest(
    State(usecase): State<Arc<RecordingIngestionUseCase>>,
    Json(payload): Json<RecordingIngestionRequest>,
) -> Response {
    info!(
        call_id = %payload.call_id,
        call_sid = %payload.call_sid,
        "recording_ingestion: ingest received"
    );

    let job = match payload.to_job() {
        Ok(job) => job,
        Err(err) => {
            warn!(error = %err, "recording_ingestion: rejected job descriptor");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    match usecase.enqueue(job).await {
        Ok(queued) => (StatusCode::ACCEPTED, Json(queued)).into_response(),
        Err(err) => map_error(err),
    }
}

fn map_error(err: EnqueueError) -> Response {
    let status = match err {
        EnqueueError::QueueFull | EnqueueError::Closed => StatusCode::SERVICE_UNAVAILABLE,
    };

    warn!(
        status = status.as_u16(),
        error = %err,
        "recording_ingestion: enqueue failed"
    );
    (status, err.to_string()).into_response()
}
