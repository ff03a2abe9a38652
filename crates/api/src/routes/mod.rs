pub mod health;
pub mod jobs;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                                  submit (POST), list (GET)
/// /jobs/{id}                             get (GET), cancel + delete (DELETE)
/// /jobs/{id}/progress                    advisory engine progress
/// /jobs/{id}/outputs/{category}          stream one output artifact
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router(config.storage.max_upload_bytes))
}
