pub mod downloads;
pub mod jobs;

use stemdeck_core::types::JobId;

use crate::error::{AppError, AppResult};

/// Parse a job id path segment.
pub(crate) fn parse_job_id(raw: &str) -> AppResult<JobId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid job id '{raw}'")))
}
