//! Orchestration engine for concurrent text streams and polled video jobs.
//!
//! - [`stream`] fans one request out to several model columns, each backed
//!   by a cancellable [`StreamSession`](stream::StreamSession).
//! - [`jobs`] submits video jobs, polls them to a terminal status and
//!   merges results into the per-project job table.
//! - [`Studio`] hands each project its own orchestrators and owns the
//!   durable version store.
//!
//! Lifecycle changes are broadcast on an [`EventBus`].

pub mod config;
pub mod error;
pub mod events;
mod gate;
pub mod jobs;
pub mod store;
pub mod stream;
pub mod studio;
#[cfg(test)]
mod testing;

pub use config::StudioConfig;
pub use error::EngineError;
pub use events::{EventBus, StudioEvent};
pub use studio::{ProjectSession, Studio};
