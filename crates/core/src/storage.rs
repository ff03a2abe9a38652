//! Storage keys and output path safety.
//!
//! Uploads live under an upload root keyed by job id; the engine writes
//! artifacts under a separate output root. Anything the registry hands
//! out for download must stay inside the output root.

use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;
use crate::types::JobId;

/// Storage key for an uploaded payload: `{job_id}_{sanitized_name}`.
///
/// The job id prefix keeps keys unique even when two uploads share a name.
pub fn upload_key(job_id: JobId, sanitized_name: &str) -> String {
    format!("{job_id}_{sanitized_name}")
}

/// Full path for an uploaded payload under `upload_root`.
pub fn upload_path(upload_root: &Path, job_id: JobId, sanitized_name: &str) -> PathBuf {
    upload_root.join(upload_key(job_id, sanitized_name))
}

/// Lexical check that `location` names something strictly inside `root`.
///
/// Rejects any `..` component outright rather than trying to normalize it,
/// so `/outputs/../uploads/x` never passes even though it starts with the
/// root. Symlinks are not resolved here; see [`ensure_within_root`] for the
/// canonical check.
pub fn is_within_root(root: &Path, location: &Path) -> bool {
    if location
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return false;
    }
    location.starts_with(root) && location != root
}

/// Validate an output location reported for a job.
///
/// Relative roots and locations are resolved against the working directory
/// first, so a relative root still matches absolute engine paths. `..`
/// components survive that resolution and are rejected.
pub fn check_output_location(root: &Path, location: &str) -> Result<PathBuf, CoreError> {
    let outside = || {
        CoreError::Forbidden(format!(
            "Output location '{location}' is outside the output storage root"
        ))
    };
    if location.is_empty() {
        return Err(outside());
    }
    let root = std::path::absolute(root).map_err(|_| outside())?;
    let path = std::path::absolute(location).map_err(|_| outside())?;
    if is_within_root(&root, &path) {
        Ok(path)
    } else {
        Err(outside())
    }
}

/// Containment check on already-canonicalized paths.
///
/// Catches symlinks inside the root that point elsewhere.
pub fn ensure_within_root(canonical_root: &Path, canonical_location: &Path) -> Result<(), CoreError> {
    if canonical_location.starts_with(canonical_root) && canonical_location != canonical_root {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Output location resolves outside the output storage root".into(),
        ))
    }
}
