//! Video job submission, polling and result aggregation.
//!
//! [`JobOrchestrator`] validates and submits jobs, [`JobPoller`] runs one
//! status loop per job, and [`JobBoard`] holds the project's job table that
//! both write into.

pub mod board;
pub mod orchestrator;
pub mod poller;

pub use board::JobBoard;
pub use orchestrator::JobOrchestrator;
pub use poller::{JobPoller, JobStatusSink};
