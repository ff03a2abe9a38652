//! REST client for the engine's HTTP endpoints.
//!
//! Wraps `POST /process`, `GET /status/{job_id}` and
//! `POST /cancel/{job_id}` using [`reqwest`]. Each call carries its own
//! timeout: processing is allowed to run for tens of minutes, while status
//! and cancel calls are kept short so a stalled engine cannot hold up a
//! client request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use stemdeck_core::types::JobId;

use crate::messages::{ProcessRequest, ProcessResponse};
use crate::TransformationEngine;

/// Per-endpoint request timeouts.
#[derive(Debug, Clone, Copy)]
pub struct EngineTimeouts {
    pub process: Duration,
    pub status: Duration,
    pub cancel: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            process: Duration::from_secs(30 * 60),
            status: Duration::from_secs(5),
            cancel: Duration::from_secs(10),
        }
    }
}

/// HTTP client for a single engine instance.
pub struct EngineApi {
    client: reqwest::Client,
    api_url: String,
    timeouts: EngineTimeouts,
}

/// Errors from the engine REST layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// The HTTP request itself failed (connect, timeout, DNS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine answered with a non-2xx status.
    #[error("Engine API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body, forwarded as the failure detail.
        body: String,
    },

    /// A 2xx response whose body could not be understood.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

impl EngineApi {
    /// Create a client for the engine at `api_url`, e.g. `http://host:5000`.
    pub fn new(api_url: impl Into<String>, timeouts: EngineTimeouts) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, timeouts)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        timeouts: EngineTimeouts,
    ) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            timeouts,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a payload for separation and wait for the result.
    ///
    /// Sends a multipart `POST /process` with the payload under `file`,
    /// the job id, and every option field.
    pub async fn submit(&self, request: ProcessRequest) -> Result<ProcessResponse, EngineApiError> {
        let ProcessRequest {
            job_id,
            file_name,
            payload,
            options,
        } = request;

        let mut form = Form::new()
            .part("file", Part::bytes(payload).file_name(file_name))
            .text("job_id", job_id.to_string());
        for (field, value) in options.to_form_fields() {
            form = form.text(field, value);
        }

        tracing::debug!(%job_id, url = %self.api_url, "Dispatching job to engine");

        let response = self
            .client
            .post(format!("{}/process", self.api_url))
            .multipart(form)
            .timeout(self.timeouts.process)
            .send()
            .await?;

        let body = Self::ensure_success(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| EngineApiError::InvalidResponse(e.to_string()))
    }

    /// Fetch the engine's progress document for a job, body untouched.
    pub async fn fetch_status(&self, job_id: JobId) -> Result<String, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/status/{job_id}", self.api_url))
            .timeout(self.timeouts.status)
            .send()
            .await?;

        Ok(Self::ensure_success(response).await?.text().await?)
    }

    /// Ask the engine to stop working on a job.
    pub async fn cancel_job(&self, job_id: JobId) -> Result<(), EngineApiError> {
        let response = self
            .client
            .post(format!("{}/cancel/{job_id}", self.api_url))
            .timeout(self.timeouts.cancel)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`EngineApiError::ApiError`] carrying the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EngineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TransformationEngine for EngineApi {
    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, EngineApiError> {
        self.submit(request).await
    }

    async fn status(&self, job_id: JobId) -> Result<String, EngineApiError> {
        self.fetch_status(job_id).await
    }

    async fn cancel(&self, job_id: JobId) -> Result<(), EngineApiError> {
        self.cancel_job(job_id).await
    }
}
