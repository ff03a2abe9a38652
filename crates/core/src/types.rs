/// Jobs are keyed by a random v4 UUID assigned at intake.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
