//! Media generation jobs: task types, lifecycle status and result merging.
//!
//! A [`GenerationJob`] moves `pending -> processing -> {succeeded | failed}`.
//! Every (re)submission opens a new *round*; status updates are tagged with
//! the round they were polled for and anything from an older round is
//! discarded. Result URLs are merged as a first-seen-ordered union, so an
//! update can never drop a URL that was already recorded.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};
use crate::validation::JobSpec;

/// Message recorded when the remote side reports failure without a reason.
pub const GENERIC_FAILURE_MESSAGE: &str = "Generation failed";

/// Kind of video generation requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ImageToVideo,
    ReferenceToVideo,
    TextToVideo,
    KeyframeToVideo,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageToVideo => "image_to_video",
            Self::ReferenceToVideo => "reference_to_video",
            Self::TextToVideo => "text_to_video",
            Self::KeyframeToVideo => "keyframe_to_video",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job or of a single remote attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "queued")]
    Pending,
    #[serde(alias = "running")]
    Processing,
    #[serde(alias = "success", alias = "completed")]
    Succeeded,
    #[serde(alias = "error")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// A status observation for one round of a job, produced by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub round: u32,
    pub status: JobStatus,
    pub result_urls: Vec<String>,
    pub error_message: Option<String>,
}

/// What applying a [`JobUpdate`] did to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The update belonged to an older round and was dropped.
    Stale,
    /// The job was already terminal; nothing changed.
    Ignored,
    /// Still in flight. `new_results` counts URLs appended by this update.
    Progressed { new_results: usize },
    Succeeded,
    Failed,
}

/// The job record the UI reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationJob {
    pub id: DbId,
    pub project_id: DbId,
    pub task_type: TaskType,
    pub status: JobStatus,
    /// Submission round; bumped by every regenerate.
    pub round: u32,
    /// Remote task identifiers of the current round, in submission order.
    pub submitted_artifact_ids: Vec<String>,
    pub result_urls: Vec<String>,
    pub group_count: u32,
    pub error_message: Option<String>,
    /// The validated submission, kept so the job can be regenerated.
    pub spec: JobSpec,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GenerationJob {
    /// Create a job for an acknowledged first submission.
    pub fn submitted(
        id: DbId,
        project_id: DbId,
        spec: JobSpec,
        task_ids: Vec<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            project_id,
            task_type: spec.task_type,
            status: JobStatus::Pending,
            round: 1,
            submitted_artifact_ids: task_ids,
            result_urls: Vec::new(),
            group_count: spec.group_count,
            error_message: None,
            spec,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a new submission round after the remote side acknowledged it.
    ///
    /// This is the only place results are cleared.
    pub fn begin_round(&mut self, task_ids: Vec<String>, now: Timestamp) -> u32 {
        self.round += 1;
        self.status = JobStatus::Pending;
        self.submitted_artifact_ids = task_ids;
        self.result_urls.clear();
        self.error_message = None;
        self.updated_at = now;
        self.round
    }

    /// Merge a status observation into the job.
    pub fn apply(&mut self, update: JobUpdate, now: Timestamp) -> Transition {
        if update.round != self.round {
            return Transition::Stale;
        }
        if self.status.is_terminal() {
            return Transition::Ignored;
        }

        let new_results = merge_urls(&mut self.result_urls, update.result_urls);
        self.updated_at = now;

        match update.status {
            JobStatus::Pending | JobStatus::Processing => {
                self.status = JobStatus::Processing;
                Transition::Progressed { new_results }
            }
            JobStatus::Succeeded => {
                self.status = JobStatus::Succeeded;
                Transition::Succeeded
            }
            JobStatus::Failed => {
                self.status = JobStatus::Failed;
                self.error_message = Some(
                    update
                        .error_message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
                );
                Transition::Failed
            }
        }
    }
}

/// Append every URL from `incoming` not already in `existing`, keeping
/// first-seen order. Returns the number appended.
pub fn merge_urls(existing: &mut Vec<String>, incoming: Vec<String>) -> usize {
    let before = existing.len();
    for url in incoming {
        if !existing.contains(&url) {
            existing.push(url);
        }
    }
    existing.len() - before
}

/// Status of one remote attempt as last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attempt {
    task_id: String,
    status: JobStatus,
    error_message: Option<String>,
}

/// Tracks the remote attempts of one round and folds them into a single
/// job-level status.
///
/// A round with `group_count > 1` has several remote tasks. The job
/// succeeds once every attempt succeeded and fails as soon as any attempt
/// fails.
#[derive(Debug, Clone)]
pub struct RoundTracker {
    round: u32,
    attempts: Vec<Attempt>,
    result_urls: Vec<String>,
}

impl RoundTracker {
    pub fn new(round: u32, task_ids: &[String]) -> Self {
        Self {
            round,
            attempts: task_ids
                .iter()
                .map(|task_id| Attempt {
                    task_id: task_id.clone(),
                    status: JobStatus::Pending,
                    error_message: None,
                })
                .collect(),
            result_urls: Vec::new(),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Remote task ids that have not reached a terminal status yet.
    pub fn unresolved(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| !a.status.is_terminal())
            .map(|a| a.task_id.clone())
            .collect()
    }

    /// Record one attempt's status report.
    pub fn record(
        &mut self,
        task_id: &str,
        status: JobStatus,
        result_urls: Vec<String>,
        error_message: Option<String>,
    ) {
        merge_urls(&mut self.result_urls, result_urls);
        if let Some(attempt) = self.attempts.iter_mut().find(|a| a.task_id == task_id) {
            if !attempt.status.is_terminal() {
                attempt.status = status;
                attempt.error_message = error_message;
            }
        }
    }

    /// Fold every attempt into one job-level update.
    pub fn aggregate(&self) -> JobUpdate {
        let failed = self
            .attempts
            .iter()
            .find(|a| a.status == JobStatus::Failed);

        let status = if failed.is_some() {
            JobStatus::Failed
        } else if !self.attempts.is_empty()
            && self.attempts.iter().all(|a| a.status == JobStatus::Succeeded)
        {
            JobStatus::Succeeded
        } else {
            JobStatus::Processing
        };

        JobUpdate {
            round: self.round,
            status,
            result_urls: self.result_urls.clone(),
            error_message: failed.and_then(|a| a.error_message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::validation::JobSpec;

    fn job() -> GenerationJob {
        GenerationJob::submitted(
            1,
            7,
            JobSpec::text_to_video("a cat", "model-x"),
            vec!["t1".into()],
            Utc::now(),
        )
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
    fn first_response_moves_pending_to_processing() {
        let mut job = job();
        assert_eq!(job.status, JobStatus::Pending);
        let t = job.apply(update(1, JobStatus::Pending, &[]), Utc::now());
        assert_eq!(t, Transition::Progressed { new_results: 0 });
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn urls_merge_as_ordered_union() {
        let mut job = job();
        job.apply(update(1, JobStatus::Processing, &["a", "b"]), Utc::now());
        let t = job.apply(update(1, JobStatus::Processing, &["b", "c", "a"]), Utc::now());
        assert_eq!(t, Transition::Progressed { new_results: 1 });
        assert_eq!(job.result_urls, vec!["a", "b", "c"]);
    }

    #[test]
    fn out_of_order_update_never_drops_urls() {
        let mut job = job();
        job.apply(update(1, JobStatus::Processing, &["a", "b"]), Utc::now());
        job.apply(update(1, JobStatus::Processing, &["a"]), Utc::now());
        assert_eq!(job.result_urls, vec!["a", "b"]);
    }

    #[test]
    fn failure_uses_generic_message_when_absent() {
        let mut job = job();
        let t = job.apply(update(1, JobStatus::Failed, &[]), Utc::now());
        assert_eq!(t, Transition::Failed);
        assert_eq!(job.error_message.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn terminal_job_ignores_further_updates() {
        let mut job = job();
        job.apply(update(1, JobStatus::Succeeded, &["a"]), Utc::now());
        let t = job.apply(update(1, JobStatus::Processing, &["z"]), Utc::now());
        assert_eq!(t, Transition::Ignored);
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.result_urls, vec!["a"]);
    }

    #[test]
    fn stale_round_is_dropped() {
        let mut job = job();
        job.apply(update(1, JobStatus::Processing, &["old"]), Utc::now());
        let round = job.begin_round(vec!["t2".into()], Utc::now());
        assert_eq!(round, 2);
        assert!(job.result_urls.is_empty());

        let t = job.apply(update(1, JobStatus::Succeeded, &["old", "older"]), Utc::now());
        assert_eq!(t, Transition::Stale);
        assert!(job.result_urls.is_empty());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn tracker_succeeds_only_when_all_attempts_succeed() {
        let ids = vec!["t1".to_string(), "t2".to_string()];
        let mut tracker = RoundTracker::new(1, &ids);
        tracker.record("t1", JobStatus::Succeeded, vec!["u1".into()], None);
        assert_eq!(tracker.aggregate().status, JobStatus::Processing);
        assert_eq!(tracker.unresolved(), vec!["t2".to_string()]);

        tracker.record("t2", JobStatus::Succeeded, vec!["u2".into()], None);
        let agg = tracker.aggregate();
        assert_eq!(agg.status, JobStatus::Succeeded);
        assert_eq!(agg.result_urls, vec!["u1", "u2"]);
        assert!(tracker.unresolved().is_empty());
    }

    #[test]
    fn tracker_fails_on_any_failed_attempt_and_keeps_urls() {
        let ids = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
        let mut tracker = RoundTracker::new(1, &ids);
        tracker.record("t1", JobStatus::Succeeded, vec!["u1".into()], None);
        tracker.record("t2", JobStatus::Succeeded, vec!["u2".into()], None);
        tracker.record("t3", JobStatus::Failed, vec![], Some("nsfw".into()));

        let agg = tracker.aggregate();
        assert_eq!(agg.status, JobStatus::Failed);
        assert_eq!(agg.result_urls, vec!["u1", "u2"]);
        assert_eq!(agg.error_message.as_deref(), Some("nsfw"));
    }

    #[test]
    fn tracker_ignores_reports_after_attempt_resolved() {
        let ids = vec!["t1".to_string()];
        let mut tracker = RoundTracker::new(3, &ids);
        tracker.record("t1", JobStatus::Succeeded, vec![], None);
        tracker.record("t1", JobStatus::Failed, vec![], None);
        assert_eq!(tracker.aggregate().status, JobStatus::Succeeded);
        assert_eq!(tracker.aggregate().round, 3);
    }

    #[test]
    fn status_accepts_remote_aliases() {
        let s: JobStatus = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(s, JobStatus::Processing);
        let s: JobStatus = serde_json::from_str(r#""queued""#).unwrap();
        assert_eq!(s, JobStatus::Pending);
    }
}
