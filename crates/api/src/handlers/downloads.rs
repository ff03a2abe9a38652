//! Streaming of output artifacts.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::handlers::parse_job_id;
use crate::orchestration::results;
use crate::state::AppState;

/// GET /api/v1/jobs/{id}/outputs/{category}
///
/// Streams one output artifact of a completed job as an attachment.
pub async fn download_output(
    State(state): State<AppState>,
    Path((id, category)): Path<(String, String)>,
) -> AppResult<Response> {
    let job_id = parse_job_id(&id)?;
    let artifact = results::open_output(&state, job_id, &category).await?;

    let stream = ReaderStream::new(artifact.file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type)
        .header(header::CONTENT_LENGTH, artifact.len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}
