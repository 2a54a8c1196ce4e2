//! Validated submission and regeneration of video jobs.

use std::sync::Arc;
use std::time::Duration;

use studio_core::job::{GenerationJob, Transition};
use studio_core::types::DbId;
use studio_core::validation::{validate_submission, JobSpec};
use studio_remote::messages::JobSubmission;
use studio_remote::JobTransport;

use crate::error::EngineError;
use crate::events::{EventBus, StudioEvent};
use crate::jobs::board::JobBoard;
use crate::jobs::poller::{JobPoller, JobStatusSink};

/// Submits, regenerates and tracks the video jobs of one project.
pub struct JobOrchestrator {
    project_id: DbId,
    transport: Arc<dyn JobTransport>,
    board: Arc<JobBoard>,
    poller: JobPoller,
    events: Arc<EventBus>,
}

impl JobOrchestrator {
    pub fn new(
        project_id: DbId,
        transport: Arc<dyn JobTransport>,
        events: Arc<EventBus>,
        poll_interval: Duration,
    ) -> Self {
        let board = Arc::new(JobBoard::new(project_id, Arc::clone(&events)));
        let poller = JobPoller::new(
            project_id,
            Arc::clone(&transport),
            Arc::clone(&board) as Arc<dyn JobStatusSink>,
            Arc::clone(&events),
            poll_interval,
        );
        Self {
            project_id,
            transport,
            board,
            poller,
            events,
        }
    }

    /// Validate and submit a job, then start polling it.
    ///
    /// A spec that fails validation is rejected before any network call and
    /// leaves the job table unchanged.
    pub async fn submit(&self, spec: JobSpec) -> Result<GenerationJob, EngineError> {
        validate_submission(&spec)?;
        let task_ids = self.send(&spec).await?;

        let job = self.board.insert(spec, task_ids);
        tracing::info!(
            project_id = self.project_id,
            job_id = job.id,
            task_type = %job.task_type,
            tasks = job.submitted_artifact_ids.len(),
            "Job submitted",
        );
        self.announce(&job);
        self.poller
            .start(job.id, job.round, job.submitted_artifact_ids.clone());
        Ok(job)
    }

    /// Resubmit a job's stored spec as a new round.
    ///
    /// Existing results are only cleared once the remote side has
    /// acknowledged the new round; a failed resubmission leaves the job as
    /// it was. The loop of the previous round is replaced when the new
    /// round starts polling, so concurrent regenerations always leave the
    /// newest round polled.
    pub async fn regenerate(&self, job_id: DbId) -> Result<GenerationJob, EngineError> {
        let job = self.job(job_id)?;
        validate_submission(&job.spec)?;
        let task_ids = self.send(&job.spec).await?;

        let round = self.board.begin_round(job_id, task_ids.clone())?;
        let job = self.job(job_id)?;
        tracing::info!(project_id = self.project_id, job_id, round, "Job regenerated");
        self.announce(&job);
        self.poller.start(job_id, round, task_ids);
        Ok(job)
    }

    /// Fetch a job's status once and resume polling if it is still running.
    ///
    /// Used to recover after a poll loop stopped on a transport error.
    pub async fn refresh(&self, job_id: DbId) -> Result<GenerationJob, EngineError> {
        let job = self.job(job_id)?;
        if job.status.is_terminal() || self.poller.is_polling(job_id) {
            return Ok(job);
        }

        let update = self
            .poller
            .poll_once(job.round, &job.submitted_artifact_ids)
            .await?;
        // A regeneration that landed meanwhile owns the job now.
        let transition = self.board.apply(job_id, update);
        if matches!(transition, Transition::Progressed { .. }) {
            self.poller
                .start(job_id, job.round, job.submitted_artifact_ids.clone());
        }
        self.job(job_id)
    }

    /// Stop polling one job. The remote job keeps running.
    pub fn stop(&self, job_id: DbId) -> bool {
        self.poller.stop(job_id)
    }

    pub fn stop_all(&self) -> usize {
        self.poller.stop_all()
    }

    pub fn is_polling(&self, job_id: DbId) -> bool {
        self.poller.is_polling(job_id)
    }

    pub fn job(&self, job_id: DbId) -> Result<GenerationJob, EngineError> {
        self.board
            .get(job_id)
            .ok_or(EngineError::JobNotFound(job_id))
    }

    pub fn jobs(&self) -> Vec<GenerationJob> {
        self.board.list()
    }

    // ---- private helpers ----

    async fn send(&self, spec: &JobSpec) -> Result<Vec<String>, EngineError> {
        let submission = JobSubmission::from(spec);
        let ack = self.transport.submit(&submission).await.map_err(|e| {
            tracing::error!(project_id = self.project_id, task_type = %spec.task_type, error = %e, "Job submission failed");
            e
        })?;
        if ack.task_ids.is_empty() {
            return Err(EngineError::EmptyAcknowledgement);
        }
        Ok(ack.task_ids)
    }

    fn announce(&self, job: &GenerationJob) {
        self.events.publish(StudioEvent::JobSubmitted {
            project_id: self.project_id,
            job_id: job.id,
            round: job.round,
            task_count: job.submitted_artifact_ids.len(),
        });
    }
}
