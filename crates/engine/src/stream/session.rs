//! A single cancellable text generation stream.
//!
//! The remote stream is read on a spawned task. Each increment is handed to
//! the sink through the handle's gate, so after [`StreamHandle::cancel`]
//! returns the sink is never called again for that handle, even if the
//! network read is still being torn down.

use std::sync::Arc;

use futures::StreamExt;
use studio_core::types::DbId;
use studio_remote::messages::TextStreamRequest;
use studio_remote::TextStreamTransport;
use uuid::Uuid;

use crate::gate::Gate;

/// Receives the output of one stream.
///
/// `on_chunk` is called once per increment in arrival order, then exactly
/// one of `on_done` or `on_error`, unless the handle is cancelled first.
/// Callbacks run on the runtime's worker threads and must return quickly.
pub trait StreamSink: Send + Sync + 'static {
    fn on_chunk(&self, chunk: &str);
    fn on_done(&self);
    fn on_error(&self, reason: &str);
}

struct HandleInner {
    id: Uuid,
    column_id: DbId,
    gate: Gate,
}

/// Cheap, cloneable control handle for a running stream.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<HandleInner>,
}

impl StreamHandle {
    pub(crate) fn new(column_id: DbId) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                column_id,
                gate: Gate::new(),
            }),
        }
    }

    /// Unique id of this stream run.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn column_id(&self) -> DbId {
        self.inner.column_id
    }

    /// Stop delivering callbacks for this stream.
    ///
    /// Returns `true` if the stream was still live. Calling it again, or
    /// after the stream has finished, is a no-op that returns `false`.
    pub fn cancel(&self) -> bool {
        let was_live = self.inner.gate.cancel();
        if was_live {
            tracing::debug!(column_id = self.inner.column_id, stream_id = %self.inner.id, "Stream cancelled");
        }
        was_live
    }

    /// `true` until the stream finishes, fails or is cancelled.
    pub fn is_active(&self) -> bool {
        self.inner.gate.is_open()
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.inner.id)
            .field("column_id", &self.inner.column_id)
            .finish()
    }
}

/// Opens streams on a spawned task.
pub struct StreamSession;

impl StreamSession {
    /// Open a stream for `column_id` and return its handle.
    ///
    /// Must be called from within a Tokio runtime. Transport failures are
    /// reported through [`StreamSink::on_error`]; nothing is retried.
    pub fn open(
        transport: Arc<dyn TextStreamTransport>,
        column_id: DbId,
        request: TextStreamRequest,
        sink: Arc<dyn StreamSink>,
    ) -> StreamHandle {
        let handle = StreamHandle::new(column_id);
        Self::attach(handle.clone(), transport, request, sink);
        handle
    }

    /// Start streaming into an already-registered handle.
    pub(crate) fn attach(
        handle: StreamHandle,
        transport: Arc<dyn TextStreamTransport>,
        request: TextStreamRequest,
        sink: Arc<dyn StreamSink>,
    ) {
        tokio::spawn(run_stream(handle.inner, transport, request, sink));
    }
}

async fn run_stream(
    inner: Arc<HandleInner>,
    transport: Arc<dyn TextStreamTransport>,
    request: TextStreamRequest,
    sink: Arc<dyn StreamSink>,
) {
    let gate = &inner.gate;
    let model_id = request.model_id.clone();

    let opened = tokio::select! {
        biased;
        _ = gate.cancelled() => return,
        opened = transport.open_stream(request) => opened,
    };

    let mut chunks = match opened {
        Ok(chunks) => chunks,
        Err(e) => {
            tracing::warn!(column_id = inner.column_id, model_id = %model_id, error = %e, "Failed to open stream");
            gate.deliver_final(|| sink.on_error(&e.to_string()));
            return;
        }
    };

    let mut count: usize = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = gate.cancelled() => return,
            next = chunks.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                if gate.deliver(|| sink.on_chunk(&chunk)).is_none() {
                    return;
                }
                count += 1;
            }
            Some(Err(e)) => {
                tracing::warn!(
                    column_id = inner.column_id,
                    model_id = %model_id,
                    chunks = count,
                    error = %e,
                    "Stream failed",
                );
                gate.deliver_final(|| sink.on_error(&e.to_string()));
                return;
            }
            None => {
                tracing::debug!(column_id = inner.column_id, model_id = %model_id, chunks = count, "Stream complete");
                gate.deliver_final(|| sink.on_done());
                return;
            }
        }
    }
}
