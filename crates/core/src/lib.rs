//! Domain rules for stem-separation jobs.
//!
//! Pure types and functions shared by the engine client and the API
//! server: the job record and its state machine, the processing-option
//! allow-lists, filename sanitization, and storage path safety.

pub mod error;
pub mod job;
pub mod options;
pub mod sanitize;
pub mod storage;
pub mod types;
