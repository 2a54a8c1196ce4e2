use studio_core::error::CoreError;
use studio_core::types::DbId;
use studio_core::validation::SubmissionRejection;
use studio_db::DbError;
use studio_remote::RemoteApiError;

/// Errors surfaced by the orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A submission failed its preconditions. No network call was made.
    #[error("Submission rejected: {0}")]
    Rejected(#[from] SubmissionRejection),

    #[error(transparent)]
    Remote(#[from] RemoteApiError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Job {0} not found")]
    JobNotFound(DbId),

    #[error("Remote service acknowledged the submission without any task ids")]
    EmptyAcknowledgement,
}
