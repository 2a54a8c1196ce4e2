//! Concurrent text streaming into comparison columns.
//!
//! [`StreamSession`] runs one remote stream and reports it through a
//! [`StreamSink`]. [`StreamOrchestrator`] owns a project's column board and
//! keeps at most one live [`StreamHandle`] per column.

pub mod orchestrator;
pub mod session;

pub use orchestrator::StreamOrchestrator;
pub use session::{StreamHandle, StreamSession, StreamSink};
