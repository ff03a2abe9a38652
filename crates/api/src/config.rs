use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use stemdeck_engine::EngineTimeouts;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight jobs, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Log output format (default: pretty).
    pub log_format: LogFormat,
    /// Upload/output storage roots and the upload size ceiling.
    pub storage: StorageConfig,
    /// Transformation engine location and timeouts.
    pub engine: EngineConfig,
    /// Upper bound on jobs dispatched to the engine at once (default: `2`).
    pub max_concurrent_jobs: usize,
}

/// Where payloads and artifacts live on disk.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// Transformation engine endpoint.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub url: String,
    pub timeouts: EngineTimeouts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `HOST`                        | `0.0.0.0`                |
    /// | `PORT`                        | `8080`                   |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`        | `120`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                     |
    /// | `LOG_FORMAT`                  | `pretty`                 |
    /// | `UPLOAD_DIR`                  | `storage/uploads`        |
    /// | `OUTPUT_DIR`                  | `storage/outputs`        |
    /// | `MAX_UPLOAD_BYTES`            | `104857600`              |
    /// | `ENGINE_URL`                  | `http://localhost:5000`  |
    /// | `ENGINE_PROCESS_TIMEOUT_SECS` | `1800`                   |
    /// | `ENGINE_STATUS_TIMEOUT_SECS`  | `5`                      |
    /// | `ENGINE_CANCEL_TIMEOUT_SECS`  | `10`                     |
    /// | `MAX_CONCURRENT_JOBS`         | `2`                      |
    ///
    /// Panics on a malformed value; misconfiguration should fail at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage = StorageConfig {
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "storage/uploads".into())
                .into(),
            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "storage/outputs".into())
                .into(),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 100 * 1024 * 1024),
        };

        let engine = EngineConfig {
            url: std::env::var("ENGINE_URL").unwrap_or_else(|_| "http://localhost:5000".into()),
            timeouts: EngineTimeouts {
                process: Duration::from_secs(env_or("ENGINE_PROCESS_TIMEOUT_SECS", 1800)),
                status: Duration::from_secs(env_or("ENGINE_STATUS_TIMEOUT_SECS", 5)),
                cancel: Duration::from_secs(env_or("ENGINE_CANCEL_TIMEOUT_SECS", 10)),
            },
        };

        let max_concurrent_jobs: usize = env_or("MAX_CONCURRENT_JOBS", 2);
        assert!(max_concurrent_jobs > 0, "MAX_CONCURRENT_JOBS must be at least 1");

        Self {
            host,
            port: env_or("PORT", 8080),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 120),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            log_format: env_or("LOG_FORMAT", LogFormat::Pretty),
            storage,
            engine,
            max_concurrent_jobs,
        }
    }
}

/// Read and parse `key`, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}
