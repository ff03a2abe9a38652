//! Job record and lifecycle state machine.
//!
//! ```text
//! pending --> processing --> completed
//!    |             |
//!    +-------------+-------> failed
//! ```
//!
//! `completed` and `failed` are terminal. Every status change goes through
//! [`Job::transition`], which rejects anything not in the table above and
//! keeps the record's fields consistent with its status.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::CoreError;
use crate::options::ProcessingOptions;
use crate::types::{JobId, Timestamp};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// The only permitted status changes.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted transformation request.
///
/// Status-dependent fields are private; they only change through the
/// transition methods so that `error`, `outputs` and `completed_at` always
/// agree with `status`.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    status: JobStatus,
    /// Sanitized display name of the uploaded file.
    pub source_name: String,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(flatten)]
    pub options: ProcessingOptions,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_label: Option<String>,
}

impl Job {
    /// Create a job in `pending`.
    pub fn new(id: JobId, source_name: String, options: ProcessingOptions) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            source_name,
            created_at: chrono::Utc::now(),
            completed_at: None,
            error: None,
            options,
            outputs: BTreeMap::new(),
            duration_label: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Output category to storage location. Empty unless completed.
    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    pub fn duration_label(&self) -> Option<&str> {
        self.duration_label.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move `pending` to `processing`.
    pub fn start_processing(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::Processing)
    }

    /// Move `processing` to `completed`, recording the outputs.
    ///
    /// At least one output is required; an empty map leaves the job
    /// untouched and returns a validation error.
    pub fn complete(
        &mut self,
        outputs: BTreeMap<String, String>,
        duration_label: Option<String>,
    ) -> Result<(), CoreError> {
        if outputs.is_empty() {
            return Err(CoreError::Validation(
                "A completed job needs at least one output".into(),
            ));
        }
        self.transition(JobStatus::Completed)?;
        self.outputs = outputs;
        self.duration_label = duration_label;
        Ok(())
    }

    /// Move a non-terminal job to `failed` with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "Unknown failure".to_string()
        } else {
            reason
        };
        self.transition(JobStatus::Failed)?;
        self.error = Some(reason);
        Ok(())
    }

    /// Apply a status change from the transition table.
    ///
    /// Leaving `pending`/`processing` for a terminal status stamps
    /// `completed_at` exactly once.
    fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(chrono::Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn job() -> Job {
        Job::new(JobId::new_v4(), "song.mp3".into(), ProcessingOptions::default())
    }

    fn outputs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Transition table
    // -----------------------------------------------------------------------

    #[test]
    fn transition_table_is_closed() {
        use JobStatus::*;
        let all = [Pending, Processing, Completed, Failed];
        let allowed = [
            (Pending, Processing),
            (Pending, Failed),
            (Processing, Completed),
            (Processing, Failed),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    // -----------------------------------------------------------------------
    // Record invariants
    // -----------------------------------------------------------------------

    #[test]
    fn new_job_is_pending_and_clean() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.completed_at().is_none());
        assert!(job.error().is_none());
        assert!(job.outputs().is_empty());
    }

    #[test]
    fn happy_path_records_outputs() {
        let mut job = job();
        job.start_processing().unwrap();
        assert_eq!(job.status(), JobStatus::Processing);
        assert!(job.completed_at().is_none());

        job.complete(
            outputs(&[("vocals", "/o/v.mp3"), ("other", "/o/o.mp3")]),
            Some("1m 02s".into()),
        )
        .unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.completed_at().is_some());
        assert_eq!(job.outputs().len(), 2);
        assert_eq!(job.duration_label(), Some("1m 02s"));
        assert!(job.error().is_none());
    }

    #[test]
    fn complete_requires_outputs() {
        let mut job = job();
        job.start_processing().unwrap();
        assert_matches!(
            job.complete(BTreeMap::new(), None),
            Err(CoreError::Validation(_))
        );
        assert_eq!(job.status(), JobStatus::Processing);
    }

    #[test]
    fn cannot_complete_from_pending() {
        let mut job = job();
        assert_matches!(
            job.complete(outputs(&[("vocals", "/o/v.mp3")]), None),
            Err(CoreError::InvalidTransition {
                from: JobStatus::Pending,
                to: JobStatus::Completed
            })
        );
        assert!(job.outputs().is_empty());
    }

    #[test]
    fn pending_job_can_fail() {
        let mut job = job();
        job.fail("Cancelled by user").unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error(), Some("Cancelled by user"));
        assert!(job.completed_at().is_some());
    }

    #[test]
    fn blank_failure_reason_is_replaced() {
        let mut job = job();
        job.fail("   ").unwrap();
        assert_eq!(job.error(), Some("Unknown failure"));
    }

    #[test]
    fn terminal_jobs_never_change() {
        let mut job = job();
        job.fail("boom").unwrap();
        let stamped = job.completed_at();

        assert_matches!(job.fail("again"), Err(CoreError::InvalidTransition { .. }));
        assert_matches!(job.start_processing(), Err(CoreError::InvalidTransition { .. }));
        assert_eq!(job.error(), Some("boom"));
        assert_eq!(job.completed_at(), stamped);
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    #[test]
    fn pending_job_serializes_without_terminal_fields() {
        let json = serde_json::to_value(job()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["source_name"], "song.mp3");
        assert_eq!(json["output_format"], "mp3");
        assert_eq!(json["model"], "htdemucs");
        assert!(json.get("completed_at").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("outputs").is_none());
    }

    #[test]
    fn completed_job_serializes_outputs() {
        let mut job = job();
        job.start_processing().unwrap();
        job.complete(outputs(&[("drums", "/o/d.wav")]), None).unwrap();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["outputs"]["drums"], "/o/d.wav");
        assert!(json["completed_at"].is_string());
    }
}
