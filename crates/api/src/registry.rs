use std::collections::HashMap;
use std::sync::Arc;

use stemdeck_core::error::CoreError;
use stemdeck_core::job::Job;
use stemdeck_core::types::JobId;
use tokio::sync::{Mutex, RwLock};

/// In-memory store of job records, keyed by job id.
///
/// The map lock guards membership; each record has its own lock so
/// updates to different jobs never wait on each other. Removal takes the
/// map's write lock, which means it cannot interleave with an update in
/// flight: an update either finishes before the removal or finds the id
/// gone afterwards.
///
/// Designed to be wrapped in `Arc` and shared across the application.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl JobRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly created job under its own id.
    pub async fn create(&self, job: Job) -> Result<JobId, CoreError> {
        let id = job.id;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&id) {
            return Err(CoreError::Conflict(format!("Job {id} already exists")));
        }
        jobs.insert(id, Arc::new(Mutex::new(job)));
        Ok(id)
    }

    /// Snapshot of a single job.
    pub async fn get(&self, id: JobId) -> Option<Job> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id)?;
        let job = entry.lock().await.clone();
        Some(job)
    }

    /// Snapshot of every job, in no particular order.
    pub async fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut out = Vec::with_capacity(jobs.len());
        for entry in jobs.values() {
            out.push(entry.lock().await.clone());
        }
        out
    }

    /// Apply `f` to the job under exclusive access.
    ///
    /// Returns `None` without calling `f` when the id is not registered,
    /// which is the expected outcome when a job was deleted while work on
    /// it was still running.
    pub async fn mutate<F, T>(&self, id: JobId, f: F) -> Option<T>
    where
        F: FnOnce(&mut Job) -> T,
    {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&id)?;
        let mut job = entry.lock().await;
        Some(f(&mut job))
    }

    /// Remove a job, running `finalize` on it first.
    ///
    /// Removal and finalization happen under the map's write lock, so no
    /// reader observes the finalized record and no later [`mutate`] can
    /// reach it. Returns the final record, or `None` if the id was absent.
    ///
    /// [`mutate`]: JobRegistry::mutate
    pub async fn remove_with<F>(&self, id: JobId, finalize: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.remove(&id)?;
        let mut job = entry.lock().await;
        finalize(&mut job);
        Some(job.clone())
    }

    /// Remove a job. Returns `true` if it was present.
    pub async fn delete(&self, id: JobId) -> bool {
        self.jobs.write().await.remove(&id).is_some()
    }

    /// Number of registered jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
