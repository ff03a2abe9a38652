//! Job orchestration: intake, background processing, cancellation, the
//! progress relay and output lookup.
//!
//! Handlers stay thin and call into these modules; all of them share
//! state only through the [`JobRegistry`](crate::registry::JobRegistry).

pub mod cancellation;
pub mod intake;
pub mod orchestrator;
pub mod progress;
pub mod results;

pub use orchestrator::ProcessingOrchestrator;
