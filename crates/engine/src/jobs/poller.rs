//! Fixed-interval status polling, one loop per job.
//!
//! Each loop owns a [`RoundTracker`] for the round it was started for and
//! writes aggregated updates into a [`JobStatusSink`] through its gate, so
//! [`JobPoller::stop`] is effective as soon as it returns. Stopping is
//! local bookkeeping only; nothing is cancelled on the remote service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use studio_core::job::{JobUpdate, RoundTracker, Transition};
use studio_core::types::DbId;
use studio_remote::{JobTransport, RemoteApiError};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::events::{EventBus, StudioEvent};
use crate::gate::{lock, Gate};

/// Receives aggregated status updates from poll loops.
///
/// Called while the loop's gate is held; implementations must not call
/// back into the poller.
pub trait JobStatusSink: Send + Sync + 'static {
    fn apply(&self, job_id: DbId, update: JobUpdate) -> Transition;
}

struct ActivePoll {
    poll_id: Uuid,
    round: u32,
    gate: Arc<Gate>,
}

type ActiveMap = HashMap<DbId, ActivePoll>;

/// Runs status loops for the jobs of one project.
pub struct JobPoller {
    project_id: DbId,
    transport: Arc<dyn JobTransport>,
    sink: Arc<dyn JobStatusSink>,
    interval: Duration,
    active: Arc<Mutex<ActiveMap>>,
    events: Arc<EventBus>,
}

impl JobPoller {
    pub fn new(
        project_id: DbId,
        transport: Arc<dyn JobTransport>,
        sink: Arc<dyn JobStatusSink>,
        events: Arc<EventBus>,
        interval: Duration,
    ) -> Self {
        Self {
            project_id,
            transport,
            sink,
            interval,
            active: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Start polling `task_ids` for `round` of `job_id`.
    ///
    /// A loop already registered for the same or a newer round wins and
    /// this returns `false`. A loop for an older round is stopped and
    /// replaced. Must be called from within a Tokio runtime.
    pub fn start(&self, job_id: DbId, round: u32, task_ids: Vec<String>) -> bool {
        let gate = Arc::new(Gate::new());
        let poll_id = Uuid::new_v4();
        let superseded = {
            let mut active = lock(&self.active);
            if let Some(existing) = active.get(&job_id) {
                if existing.round >= round {
                    tracing::debug!(job_id, round, active_round = existing.round, "Polling already active");
                    return false;
                }
            }
            active.insert(
                job_id,
                ActivePoll {
                    poll_id,
                    round,
                    gate: Arc::clone(&gate),
                },
            )
        };
        if let Some(old) = superseded {
            old.gate.cancel();
            tracing::debug!(job_id, round = old.round, "Polling superseded by newer round");
        }

        tracing::info!(
            project_id = self.project_id,
            job_id,
            round,
            tasks = task_ids.len(),
            interval_secs = self.interval.as_secs(),
            "Polling started",
        );

        let poll = PollLoop {
            project_id: self.project_id,
            job_id,
            poll_id,
            gate,
            tracker: RoundTracker::new(round, &task_ids),
            transport: Arc::clone(&self.transport),
            sink: Arc::clone(&self.sink),
            active: Arc::clone(&self.active),
            events: Arc::clone(&self.events),
            interval: self.interval,
        };
        tokio::spawn(poll.run());
        true
    }

    /// Stop polling a job. Returns `false` if it was not being polled.
    pub fn stop(&self, job_id: DbId) -> bool {
        let entry = lock(&self.active).remove(&job_id);
        match entry {
            Some(poll) => {
                poll.gate.cancel();
                tracing::debug!(job_id, round = poll.round, "Polling stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every loop. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let drained: Vec<(DbId, ActivePoll)> = lock(&self.active).drain().collect();
        for (_, poll) in &drained {
            poll.gate.cancel();
        }
        if !drained.is_empty() {
            tracing::info!(project_id = self.project_id, count = drained.len(), "All polling stopped");
        }
        drained.len()
    }

    pub fn is_polling(&self, job_id: DbId) -> bool {
        lock(&self.active).contains_key(&job_id)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    /// Query every task of a round once, without registering a loop.
    pub async fn poll_once(&self, round: u32, task_ids: &[String]) -> Result<JobUpdate, RemoteApiError> {
        let mut tracker = RoundTracker::new(round, task_ids);
        poll_unresolved(self.transport.as_ref(), &mut tracker)
            .await
            .map_err(|(_, e)| e)?;
        Ok(tracker.aggregate())
    }
}

/// Query each unresolved task once and record its report.
///
/// Stops at the first transport error, returning the task id it hit.
async fn poll_unresolved(
    transport: &dyn JobTransport,
    tracker: &mut RoundTracker,
) -> Result<(), (String, RemoteApiError)> {
    for task_id in tracker.unresolved() {
        match transport.status(&task_id).await {
            Ok(report) => {
                tracing::debug!(task_id = %task_id, status = ?report.status, urls = report.result_urls.len(), "Task status");
                tracker.record(&task_id, report.status, report.result_urls, report.error_message);
            }
            Err(e) => return Err((task_id, e)),
        }
    }
    Ok(())
}

struct PollLoop {
    project_id: DbId,
    job_id: DbId,
    poll_id: Uuid,
    gate: Arc<Gate>,
    tracker: RoundTracker,
    transport: Arc<dyn JobTransport>,
    sink: Arc<dyn JobStatusSink>,
    active: Arc<Mutex<ActiveMap>>,
    events: Arc<EventBus>,
    interval: Duration,
}

impl PollLoop {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.gate.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                biased;
                _ = self.gate.cancelled() => break,
                polled = poll_unresolved(self.transport.as_ref(), &mut self.tracker) => polled,
            };

            if let Err((task_id, e)) = polled {
                tracing::warn!(
                    job_id = self.job_id,
                    round = self.tracker.round(),
                    task_id = %task_id,
                    error = %e,
                    "Status poll failed, polling stopped",
                );
                self.gate.deliver_final(|| {
                    self.events.publish(StudioEvent::PollingStopped {
                        project_id: self.project_id,
                        job_id: self.job_id,
                        error: e.to_string(),
                    })
                });
                break;
            }

            let update = self.tracker.aggregate();
            let terminal = update.status.is_terminal();
            let applied = if terminal {
                self.gate.deliver_final(|| self.sink.apply(self.job_id, update))
            } else {
                self.gate.deliver(|| self.sink.apply(self.job_id, update))
            };

            // Anything but progress means the round is over for this loop.
            if !matches!(applied, Some(Transition::Progressed { .. })) {
                break;
            }
        }

        self.deregister();
    }

    fn deregister(&self) {
        let mut active = lock(&self.active);
        if active.get(&self.job_id).map(|p| p.poll_id) == Some(self.poll_id) {
            active.remove(&self.job_id);
        }
    }
}
