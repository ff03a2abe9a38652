use std::sync::Arc;

use stemdeck_engine::TransformationEngine;

use crate::config::ServerConfig;
use crate::orchestration::ProcessingOrchestrator;
use crate::registry::JobRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Canonical store of job records.
    pub registry: Arc<JobRegistry>,
    /// Transformation engine client (status and cancel calls).
    pub engine: Arc<dyn TransformationEngine>,
    /// Background job runner.
    pub orchestrator: Arc<ProcessingOrchestrator>,
}

impl AppState {
    /// Wire a registry and orchestrator around an engine.
    pub fn new(config: ServerConfig, engine: Arc<dyn TransformationEngine>) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let orchestrator = Arc::new(ProcessingOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&engine),
            config.storage.output_dir.clone(),
            config.max_concurrent_jobs,
        ));
        Self {
            config: Arc::new(config),
            registry,
            engine,
            orchestrator,
        }
    }
}
