//! Request and response bodies exchanged with the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use stemdeck_core::options::ProcessingOptions;
use stemdeck_core::types::JobId;

/// Everything the engine needs to run one separation.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub job_id: JobId,
    /// Name the payload is sent under (the upload's storage key).
    pub file_name: String,
    pub payload: Vec<u8>,
    pub options: ProcessingOptions,
}

/// Body of a successful `/process` response.
///
/// Extra fields (`status`, `job_id`, ...) are ignored. Values that are not
/// strings are dropped instead of failing the whole response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessResponse {
    /// Output category to storage location.
    #[serde(default, deserialize_with = "string_entries")]
    pub outputs: BTreeMap<String, String>,
    /// Human-readable total processing time, e.g. `"2m 13s"`.
    #[serde(default, deserialize_with = "string_or_none")]
    pub processing_time: Option<String>,
}

fn string_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(map) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(category, location)| match location {
            Value::String(location) => Some((category, location)),
            _ => None,
        })
        .collect())
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Advisory progress document.
///
/// Only used for the fallback served when the engine cannot be asked;
/// real engine responses are relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub status: String,
    pub progress: f64,
    pub stage: String,
}

impl ProgressReport {
    /// Placeholder returned while the engine is unreachable or still
    /// starting up.
    pub fn unknown() -> Self {
        Self {
            status: "unknown".into(),
            progress: 0.0,
            stage: "Checking status...".into(),
        }
    }
}
