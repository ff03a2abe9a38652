//! Background processing of submitted jobs.
//!
//! Every job gets its own task as soon as it is submitted. A semaphore
//! limits how many of those tasks talk to the engine at once; the rest
//! wait in `pending`. A task only touches shared state through
//! [`JobRegistry::mutate`], so a job deleted underneath it simply makes
//! its writes vanish.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use stemdeck_core::job::Job;
use stemdeck_core::storage::check_output_location;
use stemdeck_core::types::JobId;
use stemdeck_engine::{EngineApiError, ProcessRequest, TransformationEngine};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::registry::JobRegistry;

/// Failure reason recorded for jobs cut short by shutdown.
pub const SHUTDOWN_REASON: &str = "Processing interrupted by server shutdown";

/// Runs jobs against the transformation engine with bounded concurrency.
pub struct ProcessingOrchestrator {
    registry: Arc<JobRegistry>,
    engine: Arc<dyn TransformationEngine>,
    slots: Arc<Semaphore>,
    output_root: Arc<PathBuf>,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

/// What the engine produced for a successful job.
struct Completion {
    outputs: BTreeMap<String, String>,
    duration_label: Option<String>,
}

impl ProcessingOrchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        engine: Arc<dyn TransformationEngine>,
        output_root: PathBuf,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            registry,
            engine,
            slots: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            output_root: Arc::new(output_root),
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Start background processing for a registered `pending` job.
    ///
    /// `file_name` is the name the payload is sent to the engine under.
    /// Returns immediately; the outcome lands in the registry.
    pub fn launch(&self, job_id: JobId, upload_path: PathBuf, file_name: String) {
        let run = JobRun {
            job_id,
            upload_path,
            file_name,
            registry: Arc::clone(&self.registry),
            engine: Arc::clone(&self.engine),
            slots: Arc::clone(&self.slots),
            output_root: Arc::clone(&self.output_root),
            cancel: self.cancel.clone(),
        };
        self.tasks.spawn(run.execute());
        tracing::debug!(%job_id, "Job task spawned");
    }

    /// Number of job tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Interrupt every job task and wait up to `grace` for them to settle.
    ///
    /// Interrupted jobs are finalized as failed. Returns `true` if all
    /// tasks finished within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let remaining = self.tasks.len();
        tracing::info!(remaining, "Shutting down processing orchestrator");
        self.cancel.cancel();
        self.tasks.close();

        match tokio::time::timeout(grace, self.tasks.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.tasks.len(),
                    grace_secs = grace.as_secs(),
                    "Job tasks still running after shutdown grace period"
                );
                false
            }
        }
    }
}

/// Everything one job task owns.
struct JobRun {
    job_id: JobId,
    upload_path: PathBuf,
    file_name: String,
    registry: Arc<JobRegistry>,
    engine: Arc<dyn TransformationEngine>,
    slots: Arc<Semaphore>,
    output_root: Arc<PathBuf>,
    cancel: CancellationToken,
}

impl JobRun {
    async fn execute(self) {
        let job_id = self.job_id;

        // Wait for a dispatch slot; the job stays pending meanwhile.
        let permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.slots).acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            self.finalize(Err(SHUTDOWN_REASON.to_string())).await;
            self.discard_upload().await;
            return;
        };

        match self.registry.mutate(job_id, Job::start_processing).await {
            Some(Ok(())) => {
                tracing::info!(%job_id, "Job processing started");
                let outcome = self.dispatch().await;
                self.finalize(outcome).await;
            }
            Some(Err(e)) => {
                tracing::debug!(%job_id, error = %e, "Job no longer dispatchable");
            }
            None => {
                tracing::debug!(%job_id, "Job deleted before dispatch");
            }
        }

        self.discard_upload().await;
    }

    /// Send the payload to the engine and validate what comes back.
    async fn dispatch(&self) -> Result<Completion, String> {
        let payload = tokio::fs::read(&self.upload_path).await.map_err(|e| {
            tracing::error!(job_id = %self.job_id, error = %e, "Failed to read upload");
            "Failed to read uploaded file".to_string()
        })?;

        let options = self
            .registry
            .mutate(self.job_id, |job| job.options.clone())
            .await
            .ok_or_else(|| "Job was removed".to_string())?;

        let request = ProcessRequest {
            job_id: self.job_id,
            file_name: self.file_name.clone(),
            payload,
            options,
        };

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(SHUTDOWN_REASON.to_string()),
            result = self.engine.process(request) => result.map_err(describe_engine_error)?,
        };

        if response.outputs.is_empty() {
            return Err("Processor returned no outputs".to_string());
        }
        for location in response.outputs.values() {
            check_output_location(&self.output_root, location).map_err(|e| e.to_string())?;
        }

        Ok(Completion {
            outputs: response.outputs,
            duration_label: response.processing_time,
        })
    }

    /// Write the terminal state. A missing job is a deleted job; the
    /// result is dropped.
    async fn finalize(&self, outcome: Result<Completion, String>) {
        let job_id = self.job_id;
        let written = match outcome {
            Ok(Completion {
                outputs,
                duration_label,
            }) => {
                let categories = outputs.len();
                self.registry
                    .mutate(job_id, |job| job.complete(outputs, duration_label))
                    .await
                    .map(|result| {
                        if result.is_ok() {
                            tracing::info!(%job_id, categories, "Job completed");
                        }
                        result
                    })
            }
            Err(reason) => self
                .registry
                .mutate(job_id, |job| {
                    let result = job.fail(reason.as_str());
                    if result.is_ok() {
                        tracing::warn!(%job_id, error = %reason, "Job failed");
                    }
                    result
                })
                .await,
        };

        match written {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                tracing::debug!(%job_id, error = %e, "Terminal write skipped");
            }
            None => {
                tracing::debug!(%job_id, "Job deleted while processing, result discarded");
            }
        }
    }

    async fn discard_upload(&self) {
        remove_upload(&self.upload_path).await;
    }
}

/// Best-effort removal of a stored payload.
pub(crate) async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Upload removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload");
        }
    }
}

/// Failure detail recorded on the job for an engine error.
fn describe_engine_error(err: EngineApiError) -> String {
    match err {
        EngineApiError::Request(e) => format!("Failed to process: {e}"),
        EngineApiError::ApiError { status, body } => {
            let body = body.trim();
            if body.is_empty() {
                format!("Processor failed with status {status}")
            } else {
                format!("Processor failed: {body}")
            }
        }
        EngineApiError::InvalidResponse(detail) => {
            format!("Failed to parse processor response: {detail}")
        }
    }
}
