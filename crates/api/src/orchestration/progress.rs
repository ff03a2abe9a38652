//! Advisory progress relay.
//!
//! Asks the engine how far along a job is and passes its answer through
//! untouched. Never consults or changes the registry.

use stemdeck_core::types::JobId;
use stemdeck_engine::ProgressReport;

use crate::state::AppState;

/// Engine progress document for `job_id`, as a JSON string.
///
/// Any engine failure (unreachable, timeout, non-2xx) degrades to
/// [`ProgressReport::unknown`]; the caller always gets a payload.
pub async fn relay_progress(state: &AppState, job_id: JobId) -> String {
    match state.engine.status(job_id).await {
        Ok(body) if !body.trim().is_empty() => body,
        Ok(_) => {
            tracing::debug!(%job_id, "Engine returned an empty status body");
            unknown_progress()
        }
        Err(e) => {
            tracing::debug!(%job_id, error = %e, "Engine status unavailable");
            unknown_progress()
        }
    }
}

fn unknown_progress() -> String {
    serde_json::to_string(&ProgressReport::unknown())
        .unwrap_or_else(|_| r#"{"status":"unknown","progress":0,"stage":"Checking status..."}"#.into())
}
