//! Handlers for the `/jobs` resource.
//!
//! Submission, lookup, listing, deletion and the progress relay. The
//! orchestration modules do the work; these functions translate HTTP in
//! and out.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use stemdeck_core::error::CoreError;
use stemdeck_core::options::OPTION_FIELDS;

use crate::error::{AppError, AppResult};
use crate::handlers::parse_job_id;
use crate::orchestration::intake::{self, Submission};
use crate::orchestration::{cancellation, progress};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the payload.
const FILE_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a multipart read failure, keeping the body-limit rejection as 413.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Drain the multipart body into a [`Submission`].
///
/// Unknown fields are skipped. A repeated field keeps its last value.
async fn read_submission(mut multipart: Multipart) -> AppResult<Submission> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == FILE_FIELD {
            submission.declared_name = field.file_name().map(str::to_owned);
            let data = field.bytes().await.map_err(multipart_error)?;
            submission.payload = Some(data.to_vec());
        } else if OPTION_FIELDS.contains(&name.as_str()) {
            let value = field.text().await.map_err(multipart_error)?;
            submission.fields.insert(name, value);
        }
    }

    Ok(submission)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Accept an upload and queue it for processing. Returns the job in
/// `pending` with 201; processing continues in the background.
pub async fn submit_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let submission = read_submission(multipart).await?;
    let job = intake::submit(&state, submission).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /api/v1/jobs
///
/// List all jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut jobs = state.registry.list().await;
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let job = state
        .registry
        .get(job_id)
        .await
        .ok_or_else(|| CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        })?;
    Ok(Json(DataResponse { data: job }))
}

/// DELETE /api/v1/jobs/{id}
///
/// Cancel the job if it is still running, then remove it. Returns 204.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let job_id = parse_job_id(&id)?;
    cancellation::cancel_and_remove(&state, job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/jobs/{id}/progress
///
/// Relay the engine's progress document verbatim. Always 200; an
/// unavailable engine yields a placeholder payload.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let body = progress::relay_progress(&state, job_id).await;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    ))
}
