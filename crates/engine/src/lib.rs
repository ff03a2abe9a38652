//! Client for the stem-separation engine.
//!
//! The engine is a separate HTTP service that runs the actual separation.
//! This crate wraps its three endpoints (process, status, cancel) and
//! exposes them behind the [`TransformationEngine`] trait so the API server
//! can be exercised without a live engine.

pub mod api;
pub mod messages;

pub use api::{EngineApi, EngineApiError, EngineTimeouts};
pub use messages::{ProcessRequest, ProcessResponse, ProgressReport};

use async_trait::async_trait;
use stemdeck_core::types::JobId;

/// Outbound operations against the transformation engine.
#[async_trait]
pub trait TransformationEngine: Send + Sync {
    /// Run a separation and wait for its result.
    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, EngineApiError>;

    /// Fetch the engine's raw progress document for a job.
    async fn status(&self, job_id: JobId) -> Result<String, EngineApiError>;

    /// Ask the engine to abandon a job.
    async fn cancel(&self, job_id: JobId) -> Result<(), EngineApiError>;
}
