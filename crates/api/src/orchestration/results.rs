//! Output artifact lookup for completed jobs.

use std::path::Path;

use stemdeck_core::error::CoreError;
use stemdeck_core::job::JobStatus;
use stemdeck_core::storage::{check_output_location, ensure_within_root};
use stemdeck_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// An opened output file, ready to stream.
#[derive(Debug)]
pub struct OutputArtifact {
    pub file: tokio::fs::File,
    pub len: u64,
    pub content_type: &'static str,
    /// File name suggested to the client.
    pub file_name: String,
}

/// Resolve and open the artifact for `category` of a completed job.
///
/// The stored location must sit inside the output root both as written
/// and after symlinks are resolved.
pub async fn open_output(
    state: &AppState,
    job_id: JobId,
    category: &str,
) -> AppResult<OutputArtifact> {
    let job = state.registry.get(job_id).await.ok_or(CoreError::NotFound {
        entity: "Job",
        id: job_id.to_string(),
    })?;

    if job.status() != JobStatus::Completed {
        return Err(CoreError::PreconditionFailed(format!(
            "Job is {}, outputs are only available once it has completed",
            job.status()
        ))
        .into());
    }

    let location = job
        .outputs()
        .get(category)
        .ok_or_else(|| CoreError::NotFound {
            entity: "Output",
            id: category.to_string(),
        })?;

    let output_root = &state.config.storage.output_dir;
    let path = check_output_location(output_root, location)?;

    let missing = || CoreError::NotFound {
        entity: "OutputFile",
        id: category.to_string(),
    };
    let canonical_root = tokio::fs::canonicalize(output_root)
        .await
        .map_err(|e| AppError::Storage(format!("Output storage is unavailable: {e}")))?;
    let canonical = tokio::fs::canonicalize(&path).await.map_err(|_| missing())?;
    ensure_within_root(&canonical_root, &canonical)?;

    let file = tokio::fs::File::open(&canonical).await.map_err(|_| missing())?;
    let metadata = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    if !metadata.is_file() {
        return Err(missing().into());
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(category)
        .replace('"', "_");

    tracing::debug!(%job_id, category, bytes = metadata.len(), "Streaming output");

    Ok(OutputArtifact {
        file,
        len: metadata.len(),
        content_type: content_type_for_extension(&path),
        file_name,
    })
}

/// Guess a Content-Type from a file extension.
pub fn content_type_for_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
