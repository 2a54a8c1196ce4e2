//! Fan-out of one request to every comparison column of a project.
//!
//! The board and the handle map are the only shared mutable state. Sink
//! callbacks lock them while holding a stream's gate, so the orchestrator
//! never cancels a handle while holding either lock: handles are taken
//! out of the map first and cancelled afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use studio_core::columns::{ColumnBoard, GenerationColumn};
use studio_core::error::CoreError;
use studio_core::types::DbId;
use studio_remote::messages::{GenerationParams, TextStreamRequest};
use studio_remote::TextStreamTransport;
use uuid::Uuid;

use crate::events::{EventBus, StudioEvent};
use crate::gate::lock;
use crate::stream::session::{StreamHandle, StreamSession, StreamSink};

type HandleMap = HashMap<DbId, StreamHandle>;

/// Owns a project's columns and their live streams.
pub struct StreamOrchestrator {
    project_id: DbId,
    transport: Arc<dyn TextStreamTransport>,
    board: Arc<Mutex<ColumnBoard>>,
    handles: Arc<Mutex<HandleMap>>,
    events: Arc<EventBus>,
}

impl StreamOrchestrator {
    /// Create an orchestrator with one column per model.
    pub fn new<I, S>(
        project_id: DbId,
        transport: Arc<dyn TextStreamTransport>,
        events: Arc<EventBus>,
        models: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            project_id,
            transport,
            board: Arc::new(Mutex::new(ColumnBoard::new(models))),
            handles: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn project_id(&self) -> DbId {
        self.project_id
    }

    /// Stream `input` through every column concurrently.
    ///
    /// Columns that are already generating are restarted. Returns the ids
    /// of the columns that were started.
    pub fn generate_all(&self, input: &str, prompt: &str, params: &GenerationParams) -> Vec<DbId> {
        let ids = lock(&self.board).ids();
        let mut started = Vec::with_capacity(ids.len());
        for id in ids {
            match self.generate_one(id, input, prompt, params) {
                Ok(_) => started.push(id),
                // Removed concurrently; nothing to start.
                Err(CoreError::NotFound { .. }) => {}
                Err(e) => {
                    tracing::warn!(project_id = self.project_id, column_id = id, error = %e, "Column not started");
                }
            }
        }
        tracing::info!(project_id = self.project_id, columns = started.len(), "Generation started");
        started
    }

    /// Start (or restart) streaming into a single column.
    pub fn generate_one(
        &self,
        column_id: DbId,
        input: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<StreamHandle, CoreError> {
        let model_id = self.column(column_id)?.model_id;

        let handle = StreamHandle::new(column_id);
        let previous = lock(&self.handles).insert(column_id, handle.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let begun = lock(&self.board).begin(column_id).map(|_| ());
        if let Err(e) = begun {
            self.release(column_id, handle.id());
            return Err(e);
        }

        let sink = Arc::new(ColumnSink {
            project_id: self.project_id,
            column_id,
            stream_id: handle.id(),
            board: Arc::clone(&self.board),
            handles: Arc::clone(&self.handles),
            events: Arc::clone(&self.events),
        });

        self.events.publish(StudioEvent::ColumnStarted {
            project_id: self.project_id,
            column_id,
            model_id: model_id.clone(),
        });

        let request = TextStreamRequest {
            input: input.to_string(),
            model_id,
            prompt: prompt.to_string(),
            params: params.clone(),
        };
        StreamSession::attach(handle.clone(), Arc::clone(&self.transport), request, sink);
        Ok(handle)
    }

    /// Cancel a column's stream. Returns `true` if one was live.
    ///
    /// The column keeps the text received so far.
    pub fn cancel(&self, column_id: DbId) -> bool {
        let handle = lock(&self.handles).remove(&column_id);
        let Some(handle) = handle else {
            return false;
        };
        if !handle.cancel() {
            return false;
        }
        {
            // A restart may have registered a new run in the meantime.
            let handles = lock(&self.handles);
            if !handles.contains_key(&column_id) {
                lock(&self.board).halt(column_id);
            }
        }
        self.events.publish(StudioEvent::ColumnCancelled {
            project_id: self.project_id,
            column_id,
        });
        true
    }

    /// Cancel every live stream. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<DbId> = lock(&self.handles).keys().copied().collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn add_column(&self, model_id: impl Into<String>) -> DbId {
        lock(&self.board).add(model_id)
    }

    /// Remove a column and cancel its stream.
    ///
    /// Fails with `Conflict` for the last remaining column.
    pub fn remove_column(&self, column_id: DbId) -> Result<GenerationColumn, CoreError> {
        let removed = lock(&self.board).remove(column_id)?;
        let handle = lock(&self.handles).remove(&column_id);
        if let Some(handle) = handle {
            handle.cancel();
        }
        Ok(removed)
    }

    /// Change a column's model. Takes effect on the next generation.
    pub fn set_model(&self, column_id: DbId, model_id: impl Into<String>) -> Result<(), CoreError> {
        lock(&self.board).set_model(column_id, model_id)
    }

    pub fn select(&self, column_id: DbId) -> Result<(), CoreError> {
        lock(&self.board).select(column_id)
    }

    /// A copy of every column in board order.
    pub fn snapshot(&self) -> Vec<GenerationColumn> {
        lock(&self.board).columns().to_vec()
    }

    pub fn column(&self, column_id: DbId) -> Result<GenerationColumn, CoreError> {
        lock(&self.board)
            .get(column_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "generation_column",
                id: column_id,
            })
    }

    pub fn selected(&self) -> Option<GenerationColumn> {
        lock(&self.board).selected().cloned()
    }

    pub fn is_any_generating(&self) -> bool {
        lock(&self.board).columns().iter().any(|c| c.is_generating)
    }

    // ---- private helpers ----

    fn release(&self, column_id: DbId, stream_id: Uuid) {
        release_handle(&self.handles, column_id, stream_id);
    }
}

/// Drop the map entry for `column_id` only if it still belongs to `stream_id`.
fn release_handle(handles: &Mutex<HandleMap>, column_id: DbId, stream_id: Uuid) {
    let mut handles = lock(handles);
    if handles.get(&column_id).map(StreamHandle::id) == Some(stream_id) {
        handles.remove(&column_id);
    }
}

/// Writes one stream's output into its column.
struct ColumnSink {
    project_id: DbId,
    column_id: DbId,
    stream_id: Uuid,
    board: Arc<Mutex<ColumnBoard>>,
    handles: Arc<Mutex<HandleMap>>,
    events: Arc<EventBus>,
}

impl StreamSink for ColumnSink {
    fn on_chunk(&self, chunk: &str) {
        lock(&self.board).append(self.column_id, chunk);
    }

    fn on_done(&self) {
        lock(&self.board).finish(self.column_id);
        release_handle(&self.handles, self.column_id, self.stream_id);
        tracing::info!(project_id = self.project_id, column_id = self.column_id, "Column finished");
        self.events.publish(StudioEvent::ColumnFinished {
            project_id: self.project_id,
            column_id: self.column_id,
        });
    }

    fn on_error(&self, reason: &str) {
        lock(&self.board).fail(self.column_id, reason);
        release_handle(&self.handles, self.column_id, self.stream_id);
        self.events.publish(StudioEvent::ColumnFailed {
            project_id: self.project_id,
            column_id: self.column_id,
            error: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use studio_remote::RemoteApiError;
    use tokio::sync::broadcast;

    use super::*;
    use crate::testing::ChannelTextTransport;

    fn orchestrator(
        transport: &Arc<ChannelTextTransport>,
        models: &[&str],
    ) -> (StreamOrchestrator, broadcast::Receiver<StudioEvent>) {
        let events = Arc::new(EventBus::default());
        let rx = events.subscribe();
        let orch = StreamOrchestrator::new(
            1,
            Arc::clone(transport) as Arc<dyn TextStreamTransport>,
            events,
            models.iter().copied(),
        );
        (orch, rx)
    }

    /// Wait until `n` terminal column events have been observed.
    async fn wait_terminal(rx: &mut broadcast::Receiver<StudioEvent>, n: usize) -> Vec<StudioEvent> {
        let mut seen = Vec::new();
        while seen.len() < n {
            let event = rx.recv().await.unwrap();
            if matches!(
                event,
                StudioEvent::ColumnFinished { .. } | StudioEvent::ColumnFailed { .. }
            ) {
                seen.push(event);
            }
        }
        seen
    }

    #[tokio::test]
    async fn sibling_error_does_not_affect_other_columns() {
        let transport = ChannelTextTransport::new();
        let a = transport.script("modelA");
        let b = transport.script("modelB");
        let c = transport.script("modelC");
        let (orch, mut rx) = orchestrator(&transport, &["modelA", "modelB", "modelC"]);

        let started = orch.generate_all("input", "prompt", &GenerationParams::default());
        assert_eq!(started.len(), 3);
        assert!(orch.snapshot().iter().all(|col| col.is_generating));

        a.unbounded_send(Ok("Alpha ".into())).unwrap();
        b.unbounded_send(Ok("Be".into())).unwrap();
        c.unbounded_send(Ok("Gam".into())).unwrap();
        b.unbounded_send(Ok("ta".into())).unwrap();
        a.unbounded_send(Ok("one".into())).unwrap();
        b.unbounded_send(Err(RemoteApiError::Stream("overloaded".into())))
            .unwrap();
        c.unbounded_send(Ok("ma".into())).unwrap();
        drop(a);
        drop(c);

        wait_terminal(&mut rx, 3).await;

        let cols = orch.snapshot();
        assert_eq!(cols[0].content, "Alpha one");
        assert!(!cols[0].is_generating);
        assert!(cols[0].error.is_none());

        assert_eq!(cols[1].content, "Beta");
        assert!(!cols[1].is_generating);
        assert_eq!(cols[1].error.as_deref(), Some("Stream error: overloaded"));

        assert_eq!(cols[2].content, "Gamma");
        assert!(!cols[2].is_generating);
        assert!(cols[2].error.is_none());
        assert!(!orch.is_any_generating());
    }

    #[tokio::test]
    async fn cancel_freezes_column_content() {
        let transport = ChannelTextTransport::new();
        let tx = transport.script("m");
        let (orch, mut rx) = orchestrator(&transport, &["m"]);
        let id = orch.snapshot()[0].id;

        orch.generate_one(id, "in", "p", &GenerationParams::default())
            .unwrap();
        tx.unbounded_send(Ok("kept".into())).unwrap();
        while orch.column(id).unwrap().content.is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(orch.cancel(id));
        assert!(!orch.cancel(id));
        tx.unbounded_send(Ok(" dropped".into())).ok();
        drop(tx);
        tokio::task::yield_now().await;

        let col = orch.column(id).unwrap();
        assert_eq!(col.content, "kept");
        assert!(!col.is_generating);
        assert!(col.error.is_none());

        let mut cancelled = false;
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, StudioEvent::ColumnFinished { .. }));
            cancelled |= matches!(event, StudioEvent::ColumnCancelled { .. });
        }
        assert!(cancelled);
    }

    #[tokio::test]
    async fn restart_replaces_previous_stream() {
        let transport = ChannelTextTransport::new();
        let first = transport.script("m");
        let (orch, mut rx) = orchestrator(&transport, &["m"]);
        let id = orch.snapshot()[0].id;

        let old = orch
            .generate_one(id, "in", "p", &GenerationParams::default())
            .unwrap();
        first.unbounded_send(Ok("stale".into())).unwrap();
        while orch.column(id).unwrap().content.is_empty() {
            tokio::task::yield_now().await;
        }

        let second = transport.script("m");
        let new = orch
            .generate_one(id, "in", "p", &GenerationParams::default())
            .unwrap();
        assert!(!old.is_active());
        assert!(new.is_active());
        assert_eq!(orch.column(id).unwrap().content, "");

        first.unbounded_send(Ok(" more stale".into())).ok();
        second.unbounded_send(Ok("fresh".into())).unwrap();
        drop(first);
        drop(second);
        wait_terminal(&mut rx, 1).await;

        assert_eq!(orch.column(id).unwrap().content, "fresh");
        assert_eq!(transport.opened().len(), 2);
    }

    #[tokio::test]
    async fn selection_is_exclusive() {
        let transport = ChannelTextTransport::new();
        let (orch, _rx) = orchestrator(&transport, &["a", "b", "c"]);
        let ids: Vec<DbId> = orch.snapshot().iter().map(|c| c.id).collect();

        assert_eq!(orch.selected().unwrap().id, ids[0]);
        orch.select(ids[1]).unwrap();
        let selected: Vec<DbId> = orch
            .snapshot()
            .iter()
            .filter(|c| c.is_selected)
            .map(|c| c.id)
            .collect();
        assert_eq!(selected, vec![ids[1]]);

        assert_matches!(orch.select(99), Err(CoreError::NotFound { .. }));
        assert_eq!(orch.selected().unwrap().id, ids[1]);
    }

    #[tokio::test]
    async fn removing_generating_column_cancels_it() {
        let transport = ChannelTextTransport::new();
        let _a = transport.script("a");
        let b = transport.script("b");
        let (orch, _rx) = orchestrator(&transport, &["a", "b"]);
        let ids: Vec<DbId> = orch.snapshot().iter().map(|c| c.id).collect();

        let handle = orch
            .generate_one(ids[1], "in", "p", &GenerationParams::default())
            .unwrap();
        orch.select(ids[1]).unwrap();
        orch.remove_column(ids[1]).unwrap();

        assert!(!handle.is_active());
        assert_eq!(orch.selected().unwrap().id, ids[0]);
        b.unbounded_send(Ok("late".into())).ok();

        assert_matches!(orch.remove_column(ids[0]), Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn set_model_applies_to_next_run() {
        let transport = ChannelTextTransport::new();
        let tx = transport.script("other");
        let (orch, mut rx) = orchestrator(&transport, &["m"]);
        let id = orch.snapshot()[0].id;

        orch.set_model(id, "other").unwrap();
        orch.generate_one(id, "in", "p", &GenerationParams::default())
            .unwrap();
        drop(tx);
        wait_terminal(&mut rx, 1).await;

        assert_eq!(transport.opened()[0].model_id, "other");
    }
}
