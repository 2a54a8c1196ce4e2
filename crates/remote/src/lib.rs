//! Client for the remote generation service.
//!
//! Provides typed wire messages, an incremental server-sent-event decoder
//! for token streams, an HTTP client built on [`reqwest`], and the
//! transport traits the orchestration engine is written against.

pub mod api;
pub mod messages;
pub mod sse;
pub mod transport;

pub use api::{GenerationApi, RemoteApiError};
pub use transport::{ChunkStream, JobTransport, TextStreamTransport};
