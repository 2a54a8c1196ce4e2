//! In-memory transports and sinks shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use studio_core::job::JobStatus;
use studio_remote::messages::{JobSubmission, SubmitAck, TaskStatusReport, TextStreamRequest};
use studio_remote::{ChunkStream, JobTransport, RemoteApiError, TextStreamTransport};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::sync::Barrier;

use crate::gate::lock;
use crate::stream::StreamSink;

pub(crate) type ChunkSender = mpsc::UnboundedSender<Result<String, RemoteApiError>>;

/// Text transport whose streams are fed by the test through channels.
#[derive(Default)]
pub(crate) struct ChannelTextTransport {
    streams: Mutex<HashMap<String, VecDeque<mpsc::UnboundedReceiver<Result<String, RemoteApiError>>>>>,
    opened: Mutex<Vec<TextStreamRequest>>,
}

impl ChannelTextTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a stream for the next request to `model_id`.
    pub(crate) fn script(&self, model_id: &str) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.streams)
            .entry(model_id.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    pub(crate) fn opened(&self) -> Vec<TextStreamRequest> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl TextStreamTransport for ChannelTextTransport {
    async fn open_stream(&self, request: TextStreamRequest) -> Result<ChunkStream, RemoteApiError> {
        let rx = lock(&self.streams)
            .get_mut(&request.model_id)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| RemoteApiError::ApiError {
                status: 404,
                body: format!("unknown model {}", request.model_id),
            })?;
        lock(&self.opened).push(request);
        Ok(rx.boxed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkEvent {
    Chunk(String),
    Done,
    Error(String),
}

/// Forwards every callback into a channel the test can await.
pub(crate) struct RecordingSink {
    tx: tokio_mpsc::UnboundedSender<SinkEvent>,
}

impl RecordingSink {
    pub(crate) fn new() -> (Arc<Self>, tokio_mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl StreamSink for RecordingSink {
    fn on_chunk(&self, chunk: &str) {
        let _ = self.tx.send(SinkEvent::Chunk(chunk.to_string()));
    }

    fn on_done(&self) {
        let _ = self.tx.send(SinkEvent::Done);
    }

    fn on_error(&self, reason: &str) {
        let _ = self.tx.send(SinkEvent::Error(reason.to_string()));
    }
}

/// One scripted reply of the status endpoint.
#[derive(Debug, Clone)]
pub(crate) enum StatusReply {
    Report(TaskStatusReport),
    Unreachable,
}

impl StatusReply {
    pub(crate) fn status(status: JobStatus, urls: &[&str]) -> Self {
        Self::Report(TaskStatusReport {
            status,
            result_urls: urls.iter().map(|u| u.to_string()).collect(),
            error_message: None,
        })
    }

    pub(crate) fn failed(message: Option<&str>, urls: &[&str]) -> Self {
        Self::Report(TaskStatusReport {
            status: JobStatus::Failed,
            result_urls: urls.iter().map(|u| u.to_string()).collect(),
            error_message: message.map(str::to_string),
        })
    }
}

/// Job transport with scripted acknowledgements and status replies.
///
/// Each task replays its queue in order and then repeats the last reply.
/// Unscripted tasks report `processing`.
#[derive(Default)]
pub(crate) struct ScriptedJobTransport {
    acks: Mutex<VecDeque<Option<Vec<String>>>>,
    replies: Mutex<HashMap<String, VecDeque<StatusReply>>>,
    submissions: Mutex<Vec<JobSubmission>>,
    status_calls: Mutex<Vec<String>>,
    submit_barrier: Mutex<Option<Arc<Barrier>>>,
}

impl ScriptedJobTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acknowledge the next submission with these task ids.
    pub(crate) fn ack(&self, task_ids: &[&str]) {
        lock(&self.acks).push_back(Some(task_ids.iter().map(|t| t.to_string()).collect()));
    }

    /// Reject the next submission with a 503.
    pub(crate) fn reject_next(&self) {
        lock(&self.acks).push_back(None);
    }

    /// Replace the scripted replies for `task_id`.
    pub(crate) fn reply(&self, task_id: &str, replies: Vec<StatusReply>) {
        lock(&self.replies).insert(task_id.to_string(), replies.into());
    }

    /// Make every later submission wait on `barrier` before it is acknowledged.
    pub(crate) fn hold_submissions(&self, barrier: Arc<Barrier>) {
        *lock(&self.submit_barrier) = Some(barrier);
    }

    pub(crate) fn submissions(&self) -> Vec<JobSubmission> {
        lock(&self.submissions).clone()
    }

    pub(crate) fn status_calls_for(&self, task_id: &str) -> usize {
        lock(&self.status_calls)
            .iter()
            .filter(|t| t.as_str() == task_id)
            .count()
    }
}

#[async_trait]
impl JobTransport for ScriptedJobTransport {
    async fn submit(&self, submission: &JobSubmission) -> Result<SubmitAck, RemoteApiError> {
        let index = {
            let mut submissions = lock(&self.submissions);
            submissions.push(submission.clone());
            submissions.len()
        };
        let barrier = lock(&self.submit_barrier).clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        match lock(&self.acks).pop_front() {
            Some(Some(task_ids)) => Ok(SubmitAck {
                task_ids,
                status: JobStatus::Pending,
            }),
            Some(None) => Err(RemoteApiError::ApiError {
                status: 503,
                body: "unavailable".into(),
            }),
            None => Ok(SubmitAck {
                task_ids: vec![format!("task-{index}")],
                status: JobStatus::Pending,
            }),
        }
    }

    async fn status(&self, task_id: &str) -> Result<TaskStatusReport, RemoteApiError> {
        lock(&self.status_calls).push(task_id.to_string());
        let reply = {
            let mut replies = lock(&self.replies);
            match replies.get_mut(task_id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(StatusReply::Report(report)) => Ok(report),
            Some(StatusReply::Unreachable) => Err(RemoteApiError::Stream("connection reset".into())),
            None => Ok(TaskStatusReport {
                status: JobStatus::Processing,
                result_urls: Vec::new(),
                error_message: None,
            }),
        }
    }
}
