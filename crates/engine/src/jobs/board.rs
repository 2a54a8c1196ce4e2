//! The per-project job table.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use studio_core::job::{GenerationJob, JobUpdate, Transition};
use studio_core::types::DbId;
use studio_core::validation::JobSpec;

use crate::error::EngineError;
use crate::events::{EventBus, StudioEvent};
use crate::gate::lock;
use crate::jobs::poller::JobStatusSink;

struct Table {
    jobs: BTreeMap<DbId, GenerationJob>,
    next_id: DbId,
}

/// Jobs of one project, keyed by job id.
///
/// Every mutation is a read-modify-write of a single job under the table
/// lock. Events are published after the lock is released.
pub struct JobBoard {
    project_id: DbId,
    table: Mutex<Table>,
    events: Arc<EventBus>,
}

impl JobBoard {
    pub fn new(project_id: DbId, events: Arc<EventBus>) -> Self {
        Self {
            project_id,
            table: Mutex::new(Table {
                jobs: BTreeMap::new(),
                next_id: 1,
            }),
            events,
        }
    }

    /// Record an acknowledged submission as a new pending job.
    pub fn insert(&self, spec: JobSpec, task_ids: Vec<String>) -> GenerationJob {
        let mut table = lock(&self.table);
        let id = table.next_id;
        table.next_id += 1;
        let job = GenerationJob::submitted(id, self.project_id, spec, task_ids, Utc::now());
        table.jobs.insert(id, job.clone());
        job
    }

    pub fn get(&self, job_id: DbId) -> Option<GenerationJob> {
        lock(&self.table).jobs.get(&job_id).cloned()
    }

    /// All jobs in submission order.
    pub fn list(&self) -> Vec<GenerationJob> {
        lock(&self.table).jobs.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.table).jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a new round for an acknowledged resubmission. Clears results.
    pub fn begin_round(&self, job_id: DbId, task_ids: Vec<String>) -> Result<u32, EngineError> {
        let mut table = lock(&self.table);
        let job = table
            .jobs
            .get_mut(&job_id)
            .ok_or(EngineError::JobNotFound(job_id))?;
        Ok(job.begin_round(task_ids, Utc::now()))
    }

    /// Merge a status observation into a job and announce the outcome.
    pub fn apply(&self, job_id: DbId, update: JobUpdate) -> Transition {
        let round = update.round;
        let (transition, job) = {
            let mut table = lock(&self.table);
            let Some(job) = table.jobs.get_mut(&job_id) else {
                return Transition::Stale;
            };
            (job.apply(update, Utc::now()), job.clone())
        };

        match transition {
            Transition::Stale => {
                tracing::debug!(job_id, round, current_round = job.round, "Discarded stale job update");
            }
            Transition::Ignored => {}
            Transition::Progressed { new_results } => {
                if new_results > 0 {
                    tracing::debug!(job_id, new_results, total = job.result_urls.len(), "Job results arrived");
                    self.events.publish(StudioEvent::JobProgress {
                        project_id: self.project_id,
                        job_id,
                        result_count: job.result_urls.len(),
                    });
                }
            }
            Transition::Succeeded => {
                tracing::info!(job_id, results = job.result_urls.len(), "Job succeeded");
                self.events.publish(StudioEvent::JobSucceeded {
                    project_id: self.project_id,
                    job_id,
                    result_urls: job.result_urls,
                });
            }
            Transition::Failed => {
                let error = job.error_message.clone().unwrap_or_default();
                tracing::warn!(job_id, error = %error, results = job.result_urls.len(), "Job failed");
                self.events.publish(StudioEvent::JobFailed {
                    project_id: self.project_id,
                    job_id,
                    error,
                    result_count: job.result_urls.len(),
                });
            }
        }

        transition
    }
}

impl JobStatusSink for JobBoard {
    fn apply(&self, job_id: DbId, update: JobUpdate) -> Transition {
        JobBoard::apply(self, job_id, update)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use studio_core::job::{JobStatus, GENERIC_FAILURE_MESSAGE};

    use super::*;

    fn board() -> (JobBoard, tokio::sync::broadcast::Receiver<StudioEvent>) {
        let events = Arc::new(EventBus::default());
        let rx = events.subscribe();
        (JobBoard::new(3, events), rx)
    }

    fn update(round: u32, status: JobStatus, urls: &[&str]) -> JobUpdate {
        JobUpdate {
            round,
            status,
            result_urls: urls.iter().map(|u| u.to_string()).collect(),
            error_message: None,
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let (board, _rx) = board();
        let a = board.insert(JobSpec::text_to_video("a", "m"), vec!["t1".into()]);
        let b = board.insert(JobSpec::text_to_video("b", "m"), vec!["t2".into()]);
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.project_id, 3);
        assert_eq!(board.list().len(), 2);
    }

    #[test]
    fn success_publishes_result_urls() {
        let (board, mut rx) = board();
        let job = board.insert(JobSpec::text_to_video("a", "m"), vec!["t1".into()]);

        let t = board.apply(job.id, update(1, JobStatus::Succeeded, &["u1"]));
        assert_eq!(t, Transition::Succeeded);
        assert_eq!(
            rx.try_recv().unwrap(),
            StudioEvent::JobSucceeded {
                project_id: 3,
                job_id: job.id,
                result_urls: vec!["u1".into()],
            }
        );
    }

    #[test]
    fn failure_without_message_uses_generic_text() {
        let (board, mut rx) = board();
        let job = board.insert(JobSpec::text_to_video("a", "m"), vec!["t1".into()]);

        board.apply(job.id, update(1, JobStatus::Failed, &[]));
        assert_eq!(
            board.get(job.id).unwrap().error_message.as_deref(),
            Some(GENERIC_FAILURE_MESSAGE)
        );
        assert_matches!(rx.try_recv().unwrap(), StudioEvent::JobFailed { result_count: 0, .. });
    }

    #[test]
    fn begin_round_makes_old_updates_stale() {
        let (board, _rx) = board();
        let job = board.insert(JobSpec::text_to_video("a", "m"), vec!["t1".into()]);
        board.apply(job.id, update(1, JobStatus::Processing, &["old"]));

        assert_eq!(board.begin_round(job.id, vec!["t2".into()]).unwrap(), 2);
        assert_eq!(
            board.apply(job.id, update(1, JobStatus::Succeeded, &["late"])),
            Transition::Stale
        );
        let job = board.get(job.id).unwrap();
        assert!(job.result_urls.is_empty());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn unknown_job() {
        let (board, _rx) = board();
        assert_eq!(board.apply(9, update(1, JobStatus::Succeeded, &[])), Transition::Stale);
        assert_matches!(board.begin_round(9, vec![]), Err(EngineError::JobNotFound(9)));
    }
}
