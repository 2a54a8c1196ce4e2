//! Submission specs and their task-type-specific preconditions.
//!
//! [`validate_submission`] runs before any network call. Each failure is
//! a named [`SubmissionRejection`] so the UI can tell the user exactly
//! which input is missing or over the limit.

use serde::{Deserialize, Serialize};

use crate::job::TaskType;
use crate::references::{ReferenceItem, ReferenceList};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of video references in a `reference_to_video` job.
pub const MAX_REFERENCE_VIDEOS: usize = 3;
/// Maximum number of reference items (videos + images) in one job.
pub const MAX_REFERENCE_ITEMS: usize = 5;
/// Maximum number of reference items when interleaved generation is on.
pub const MAX_INTERLEAVED_ITEMS: usize = 1;

/// Default clip length in seconds.
pub const DEFAULT_DURATION_SECS: u32 = 5;
/// Default output resolution.
pub const DEFAULT_RESOLUTION: &str = "720p";

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

/// Everything needed to submit (and later regenerate) a video job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub task_type: TaskType,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub model_id: String,
    pub duration_seconds: u32,
    pub resolution: String,
    /// Number of independent attempts requested in one submission.
    pub group_count: u32,
    pub seed: Option<i64>,
    pub watermark: bool,
    /// Interleaved generation mode; restricts references to one item.
    #[serde(default)]
    pub interleaved: bool,
    pub first_frame: Option<ReferenceItem>,
    pub last_frame: Option<ReferenceItem>,
    #[serde(default)]
    pub references: ReferenceList,
}

impl JobSpec {
    /// A spec with defaults for everything except type, prompt and model.
    pub fn new(task_type: TaskType, prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            task_type,
            prompt: prompt.into(),
            negative_prompt: None,
            model_id: model_id.into(),
            duration_seconds: DEFAULT_DURATION_SECS,
            resolution: DEFAULT_RESOLUTION.to_string(),
            group_count: 1,
            seed: None,
            watermark: false,
            interleaved: false,
            first_frame: None,
            last_frame: None,
            references: ReferenceList::new(),
        }
    }

    pub fn text_to_video(prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::new(TaskType::TextToVideo, prompt, model_id)
    }

    pub fn with_group_count(mut self, group_count: u32) -> Self {
        self.group_count = group_count;
        self
    }

    pub fn with_first_frame(mut self, item: ReferenceItem) -> Self {
        self.first_frame = Some(item);
        self
    }

    pub fn with_last_frame(mut self, item: ReferenceItem) -> Self {
        self.last_frame = Some(item);
        self
    }

    pub fn with_references(mut self, references: ReferenceList) -> Self {
        self.references = references;
        self
    }

    fn has_any_reference(&self) -> bool {
        self.first_frame.is_some() || self.last_frame.is_some() || !self.references.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// A precondition that a submission failed to meet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionRejection {
    #[error("{task_type} requires a first-frame reference")]
    MissingFirstFrame { task_type: TaskType },

    #[error("{task_type} requires a last-frame reference")]
    MissingLastFrame { task_type: TaskType },

    #[error("reference_to_video requires at least one reference item")]
    MissingReferences,

    #[error("Too many reference items: {got} exceeds the combined cap of {max}")]
    TooManyReferences { max: usize, got: usize },

    #[error("Too many reference videos: {got} exceeds the cap of {max}")]
    TooManyVideos { max: usize, got: usize },

    #[error("Interleaved generation allows at most {max} reference item (got {got})")]
    InterleavedLimit { max: usize, got: usize },

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("{task_type} does not accept reference inputs")]
    ReferencesNotAllowed { task_type: TaskType },

    #[error("A model must be chosen")]
    MissingModel,

    #[error("Group count must be at least 1 (got {0})")]
    InvalidGroupCount(u32),

    #[error("Duration must be positive")]
    InvalidDuration,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check every precondition for `spec.task_type`.
pub fn validate_submission(spec: &JobSpec) -> Result<(), SubmissionRejection> {
    if spec.model_id.trim().is_empty() {
        return Err(SubmissionRejection::MissingModel);
    }
    if spec.group_count == 0 {
        return Err(SubmissionRejection::InvalidGroupCount(spec.group_count));
    }
    if spec.duration_seconds == 0 {
        return Err(SubmissionRejection::InvalidDuration);
    }

    match spec.task_type {
        TaskType::ImageToVideo => {
            if spec.first_frame.is_none() {
                return Err(SubmissionRejection::MissingFirstFrame {
                    task_type: spec.task_type,
                });
            }
        }
        TaskType::KeyframeToVideo => {
            if spec.first_frame.is_none() {
                return Err(SubmissionRejection::MissingFirstFrame {
                    task_type: spec.task_type,
                });
            }
            if spec.last_frame.is_none() {
                return Err(SubmissionRejection::MissingLastFrame {
                    task_type: spec.task_type,
                });
            }
        }
        TaskType::ReferenceToVideo => validate_references(spec)?,
        TaskType::TextToVideo => {
            if spec.prompt.trim().is_empty() {
                return Err(SubmissionRejection::EmptyPrompt);
            }
            if spec.has_any_reference() {
                return Err(SubmissionRejection::ReferencesNotAllowed {
                    task_type: spec.task_type,
                });
            }
        }
    }

    Ok(())
}

fn validate_references(spec: &JobSpec) -> Result<(), SubmissionRejection> {
    let refs = &spec.references;
    if refs.is_empty() {
        return Err(SubmissionRejection::MissingReferences);
    }
    if refs.len() > MAX_REFERENCE_ITEMS {
        return Err(SubmissionRejection::TooManyReferences {
            max: MAX_REFERENCE_ITEMS,
            got: refs.len(),
        });
    }
    if refs.video_count() > MAX_REFERENCE_VIDEOS {
        return Err(SubmissionRejection::TooManyVideos {
            max: MAX_REFERENCE_VIDEOS,
            got: refs.video_count(),
        });
    }
    if spec.interleaved && refs.len() > MAX_INTERLEAVED_ITEMS {
        return Err(SubmissionRejection::InterleavedLimit {
            max: MAX_INTERLEAVED_ITEMS,
            got: refs.len(),
        });
    }
    Ok(())
}
