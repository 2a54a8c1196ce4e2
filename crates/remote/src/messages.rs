//! Wire types for the text-stream and video-job endpoints.
//!
//! Stream bodies are server-sent events. Each `data:` line carries either
//! `{"text": "..."}` or `{"error": "..."}`, and `data: [DONE]` ends the
//! stream. Job endpoints exchange plain JSON.

use serde::{Deserialize, Serialize};
use studio_core::job::{JobStatus, TaskType};
use studio_core::references::{ReferenceItem, SourceType};
use studio_core::validation::JobSpec;

/// Sentinel `data:` payload that ends a stream normally.
pub const STREAM_DONE_SENTINEL: &str = "[DONE]";

// ---------------------------------------------------------------------------
// Text streaming
// ---------------------------------------------------------------------------

/// Optional sampling parameters forwarded verbatim to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Body of `POST /v1/text/stream`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStreamRequest {
    pub input: String,
    pub model_id: String,
    pub prompt: String,
    pub params: GenerationParams,
}

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Text(String),
    Error(String),
    Done,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireFrame {
    Text { text: String },
    Error { error: String },
}

/// Parse the payload of a single `data:` line.
///
/// Returns `Err` for malformed JSON or an unrecognised object shape.
pub fn parse_stream_data(data: &str) -> Result<StreamFrame, serde_json::Error> {
    if data.trim() == STREAM_DONE_SENTINEL {
        return Ok(StreamFrame::Done);
    }
    Ok(match serde_json::from_str::<WireFrame>(data)? {
        WireFrame::Text { text } => StreamFrame::Text(text),
        WireFrame::Error { error } => StreamFrame::Error(error),
    })
}

// ---------------------------------------------------------------------------
// Video jobs
// ---------------------------------------------------------------------------

/// How a reference is used by the remote model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRole {
    FirstFrame,
    LastFrame,
    Reference,
}

/// A reference as sent to the remote service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireReference {
    pub role: ReferenceRole,
    pub source_type: SourceType,
    pub url: String,
    pub ordinal_position: u32,
}

impl WireReference {
    fn from_item(role: ReferenceRole, item: &ReferenceItem) -> Self {
        Self {
            role,
            source_type: item.source_type,
            url: item.url.clone(),
            ordinal_position: item.ordinal_position,
        }
    }
}

/// Body of `POST /v1/video/jobs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSubmission {
    pub task_type: TaskType,
    pub references: Vec<WireReference>,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub model_id: String,
    pub duration_seconds: u32,
    pub resolution: String,
    pub group_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub watermark: bool,
    pub interleaved: bool,
}

impl From<&JobSpec> for JobSubmission {
    fn from(spec: &JobSpec) -> Self {
        let mut references = Vec::new();
        if let Some(first) = &spec.first_frame {
            references.push(WireReference::from_item(ReferenceRole::FirstFrame, first));
        }
        if let Some(last) = &spec.last_frame {
            references.push(WireReference::from_item(ReferenceRole::LastFrame, last));
        }
        references.extend(
            spec.references
                .items()
                .iter()
                .map(|item| WireReference::from_item(ReferenceRole::Reference, item)),
        );

        Self {
            task_type: spec.task_type,
            references,
            prompt: spec.prompt.clone(),
            negative_prompt: spec.negative_prompt.clone(),
            model_id: spec.model_id.clone(),
            duration_seconds: spec.duration_seconds,
            resolution: spec.resolution.clone(),
            group_count: spec.group_count,
            seed: spec.seed,
            watermark: spec.watermark,
            interleaved: spec.interleaved,
        }
    }
}

/// Response of `POST /v1/video/jobs`: one remote task per attempt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitAck {
    #[serde(alias = "job_ids")]
    pub task_ids: Vec<String>,
    pub status: JobStatus,
}

/// Response of `GET /v1/video/jobs/{task_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub result_urls: Vec<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}
