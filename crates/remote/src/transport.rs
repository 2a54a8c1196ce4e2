//! Transport seams consumed by the orchestration engine.
//!
//! [`GenerationApi`](crate::api::GenerationApi) implements both traits
//! over HTTP. Tests substitute in-memory fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::api::RemoteApiError;
use crate::messages::{JobSubmission, SubmitAck, TaskStatusReport, TextStreamRequest};

/// Ordered text increments of one generation stream.
///
/// The stream ends normally when generation is done; an `Err` item is the
/// last item and carries the reason the stream failed.
pub type ChunkStream = BoxStream<'static, Result<String, RemoteApiError>>;

/// Opens token-streamed text generations.
#[async_trait]
pub trait TextStreamTransport: Send + Sync + 'static {
    async fn open_stream(&self, request: TextStreamRequest) -> Result<ChunkStream, RemoteApiError>;
}

/// Submits long-running media jobs and reports their status.
#[async_trait]
pub trait JobTransport: Send + Sync + 'static {
    async fn submit(&self, submission: &JobSubmission) -> Result<SubmitAck, RemoteApiError>;

    async fn status(&self, task_id: &str) -> Result<TaskStatusReport, RemoteApiError>;
}
