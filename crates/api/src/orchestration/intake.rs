//! Upload intake: validate a submission, persist its payload, register the
//! job and hand it to the orchestrator.

use std::collections::HashMap;

use stemdeck_core::job::Job;
use stemdeck_core::options::ProcessingOptions;
use stemdeck_core::sanitize::sanitize_filename;
use stemdeck_core::storage::{upload_key, upload_path};
use stemdeck_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Failure reason recorded when the payload cannot be written.
pub const SAVE_FAILED_REASON: &str = "Failed to save file";

/// A decoded upload request.
#[derive(Debug, Default)]
pub struct Submission {
    /// Client-declared file name, untrusted.
    pub declared_name: Option<String>,
    /// Payload bytes; `None` when no `file` part was sent.
    pub payload: Option<Vec<u8>>,
    /// Raw option values keyed by field name.
    pub fields: HashMap<String, String>,
}

/// Accept a submission and start processing it.
///
/// Everything that can be rejected is checked before a job exists. If the
/// payload cannot be persisted afterwards, the job is left `failed` so it
/// never sits in `pending` with nothing to process.
pub async fn submit(state: &AppState, submission: Submission) -> AppResult<Job> {
    let Submission {
        declared_name,
        payload,
        fields,
    } = submission;

    let payload = payload.ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    let max = state.config.storage.max_upload_bytes;
    if payload.len() > max {
        return Err(AppError::PayloadTooLarge(format!(
            "Uploaded file is {} bytes; the limit is {max} bytes",
            payload.len()
        )));
    }

    let options = ProcessingOptions::from_form(&fields)?;
    let source_name = sanitize_filename(declared_name.as_deref().unwrap_or_default());

    let job_id = JobId::new_v4();
    let job = Job::new(job_id, source_name, options);
    state.registry.create(job.clone()).await?;

    let storage_key = upload_key(job_id, &job.source_name);
    let path = upload_path(&state.config.storage.upload_dir, job_id, &job.source_name);

    if let Err(e) = persist(&path, &payload).await {
        tracing::error!(%job_id, path = %path.display(), error = %e, "Failed to save upload");
        match state
            .registry
            .mutate(job_id, |job| job.fail(SAVE_FAILED_REASON))
            .await
        {
            Some(Ok(())) => {}
            Some(Err(e)) => tracing::debug!(%job_id, error = %e, "Failure write skipped"),
            None => tracing::debug!(%job_id, "Job deleted before its upload was saved"),
        }
        return Err(AppError::Storage(SAVE_FAILED_REASON.into()));
    }

    tracing::info!(
        %job_id,
        source_name = %job.source_name,
        bytes = payload.len(),
        model = %job.options.model,
        stem_mode = %job.options.stem_mode,
        "Job submitted"
    );

    state.orchestrator.launch(job_id, path, storage_key);
    Ok(job)
}

async fn persist(path: &std::path::Path, payload: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, payload).await
}
