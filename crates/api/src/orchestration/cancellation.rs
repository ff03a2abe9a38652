//! Job deletion with best-effort engine cancellation.

use stemdeck_core::error::CoreError;
use stemdeck_core::job::Job;
use stemdeck_core::types::JobId;

use crate::error::AppResult;
use crate::state::AppState;

/// Failure reason recorded on a job cancelled before it finished.
pub const CANCELLED_REASON: &str = "Cancelled by user";

/// Cancel (if still running) and remove a job.
///
/// The engine is told to stop first, but its answer does not matter: the
/// job is forced to `failed` and removed from the registry either way.
/// Returns the final record as it was at removal.
pub async fn cancel_and_remove(state: &AppState, job_id: JobId) -> AppResult<Job> {
    let current = state.registry.get(job_id).await.ok_or_else(|| not_found(job_id))?;

    if !current.is_terminal() {
        match state.engine.cancel(job_id).await {
            Ok(()) => tracing::info!(%job_id, "Engine acknowledged cancellation"),
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Failed to cancel job on engine");
            }
        }
    }

    let removed = state
        .registry
        .remove_with(job_id, |job| {
            if !job.is_terminal() {
                // Infallible from a non-terminal status.
                let _ = job.fail(CANCELLED_REASON);
            }
        })
        .await
        .ok_or_else(|| not_found(job_id))?;

    tracing::info!(%job_id, status = %removed.status(), "Job deleted");
    Ok(removed)
}

fn not_found(job_id: JobId) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: job_id.to_string(),
    }
}
