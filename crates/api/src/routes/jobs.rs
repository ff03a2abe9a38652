//! Route definitions for the `/jobs` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

use crate::handlers::{downloads, jobs};
use crate::state::AppState;

/// Allowance for multipart boundaries and option fields on top of the
/// payload ceiling.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                          -> list_jobs
/// POST   /                          -> submit_job
/// GET    /{id}                      -> get_job
/// DELETE /{id}                      -> delete_job
/// GET    /{id}/progress             -> get_progress
/// GET    /{id}/outputs/{category}   -> download_output
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(jobs::list_jobs).post(jobs::submit_job).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
            )),
        )
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/progress", get(jobs::get_progress))
        .route("/{id}/outputs/{category}", get(downloads::download_output))
}
