#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use stemdeck_api::config::{EngineConfig, LogFormat, ServerConfig, StorageConfig};
use stemdeck_api::router::build_app_router;
use stemdeck_api::state::AppState;
use stemdeck_core::job::{Job, JobStatus};
use stemdeck_core::types::JobId;
use stemdeck_engine::{
    EngineApiError, EngineTimeouts, ProcessRequest, ProcessResponse, TransformationEngine,
};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower::ServiceExt;

pub const BOUNDARY: &str = "stemdeck-test-boundary";

// ---------------------------------------------------------------------------
// Scripted engine
// ---------------------------------------------------------------------------

/// In-process stand-in for the transformation engine.
///
/// On `process` it optionally waits on a gate, then either writes one
/// small file per configured output category under the output root and
/// reports them, or fails the way it was told to.
pub struct FakeEngine {
    output_root: PathBuf,
    categories: Vec<String>,
    failure: Option<(u16, String)>,
    escape_root: bool,
    gate: Option<Arc<Semaphore>>,
    status_body: Option<String>,
    cancel_fails: bool,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub dispatched: Mutex<Vec<JobId>>,
    pub cancelled: Mutex<Vec<JobId>>,
}

impl FakeEngine {
    pub fn new(output_root: &Path) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            categories: vec!["vocals".into(), "other".into()],
            failure: None,
            escape_root: false,
            gate: None,
            status_body: None,
            cancel_fails: false,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            dispatched: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Answer `/process` with a non-success status and body.
    pub fn failing(mut self, status: u16, body: &str) -> Self {
        self.failure = Some((status, body.to_string()));
        self
    }

    /// Report output locations outside the output root.
    pub fn escaping_root(mut self) -> Self {
        self.escape_root = true;
        self
    }

    /// Hold every `process` call until a permit is added to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Answer status queries with `body`; without it, status fails.
    pub fn with_status(mut self, body: &str) -> Self {
        self.status_body = Some(body.to_string());
        self
    }

    pub fn cancel_fails(mut self) -> Self {
        self.cancel_fails = true;
        self
    }

    pub fn dispatched(&self) -> Vec<JobId> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<JobId> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransformationEngine for FakeEngine {
    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, EngineApiError> {
        self.dispatched.lock().unwrap().push(request.job_id);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let result = self.produce(&request).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn status(&self, job_id: JobId) -> Result<String, EngineApiError> {
        match &self.status_body {
            Some(body) => Ok(body.replace("{job_id}", &job_id.to_string())),
            None => Err(EngineApiError::ApiError {
                status: 503,
                body: "starting".into(),
            }),
        }
    }

    async fn cancel(&self, job_id: JobId) -> Result<(), EngineApiError> {
        self.cancelled.lock().unwrap().push(job_id);
        if self.cancel_fails {
            return Err(EngineApiError::ApiError {
                status: 500,
                body: "cancel not supported".into(),
            });
        }
        Ok(())
    }
}

impl FakeEngine {
    async fn produce(&self, request: &ProcessRequest) -> Result<ProcessResponse, EngineApiError> {
        if let Some((status, body)) = &self.failure {
            return Err(EngineApiError::ApiError {
                status: *status,
                body: body.clone(),
            });
        }

        let job_dir = self.output_root.join(request.job_id.to_string());
        tokio::fs::create_dir_all(&job_dir).await.unwrap();

        let ext = request.options.output_format.as_str();
        let mut outputs = BTreeMap::new();
        for category in &self.categories {
            let location = if self.escape_root {
                format!("/tmp/{category}.{ext}")
            } else {
                let path = job_dir.join(format!("{category}.{ext}"));
                tokio::fs::write(&path, format!("{category} audio"))
                    .await
                    .unwrap();
                path.to_string_lossy().into_owned()
            };
            outputs.insert(category.clone(), location);
        }

        Ok(ProcessResponse {
            outputs,
            processing_time: Some("0m 01s".into()),
        })
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Temporary upload/output roots for one test.
pub struct TestDirs {
    pub root: TempDir,
    pub uploads: PathBuf,
    pub outputs: PathBuf,
}

impl TestDirs {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let uploads = root.path().join("uploads");
        let outputs = root.path().join("outputs");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::create_dir_all(&outputs).unwrap();
        Self {
            root,
            uploads,
            outputs,
        }
    }

    /// Number of payloads currently stored.
    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(&self.uploads).unwrap().count()
    }
}

/// Build a test `ServerConfig` pointed at the given storage roots.
pub fn test_config(dirs: &TestDirs) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        log_format: LogFormat::Pretty,
        storage: StorageConfig {
            upload_dir: dirs.uploads.clone(),
            output_dir: dirs.outputs.clone(),
            max_upload_bytes: 1024 * 1024,
        },
        engine: EngineConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeouts: EngineTimeouts::default(),
        },
        max_concurrent_jobs: 2,
    }
}

pub fn build_test_state(config: ServerConfig, engine: Arc<dyn TransformationEngine>) -> AppState {
    AppState::new(config, engine)
}

/// Build the full application router, mirroring `main.rs`.
pub fn build_test_app(state: AppState) -> Router {
    let config = state.config.as_ref().clone();
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Encode a multipart body with an optional file part and text fields.
pub fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: audio/mpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_multipart(app: Router, uri: &str, body: Vec<u8>) -> Response<Body> {
    let request = Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

/// Submit `song.mp3` with the given option fields.
pub async fn upload(app: Router, fields: &[(&str, &str)]) -> Response<Body> {
    post_multipart(
        app,
        "/api/v1/jobs",
        multipart_body(Some(("song.mp3", b"ID3 fake audio")), fields),
    )
    .await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Read the `data.id` of a created-job response.
pub fn job_id_of(json: &serde_json::Value) -> JobId {
    json["data"]["id"].as_str().unwrap().parse().unwrap()
}

// ---------------------------------------------------------------------------
// Waiting
// ---------------------------------------------------------------------------

/// Poll the registry until the job satisfies `pred`, failing after 5 s.
pub async fn wait_for<F>(state: &AppState, job_id: JobId, pred: F) -> Job
where
    F: Fn(&Job) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = state.registry.get(job_id).await {
            if pred(&job) {
                return job;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} never reached the expected state"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_status(state: &AppState, job_id: JobId, status: JobStatus) -> Job {
    wait_for(state, job_id, |job| job.status() == status).await
}

/// Wait until the engine has seen `count` dispatches.
pub async fn wait_for_dispatches(engine: &FakeEngine, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while engine.dispatched().len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "engine never saw {count} dispatches"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until every job task has finished.
pub async fn wait_for_idle(state: &AppState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while state.orchestrator.in_flight() > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "job tasks never finished"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
