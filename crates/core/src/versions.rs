//! Version snapshot types and validation.
//!
//! Snapshots are immutable, append-only history entries. Selecting one
//! copies its payload into working state; the snapshot itself never
//! changes.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Maximum length for a snapshot name in characters.
pub const MAX_SNAPSHOT_NAME_LENGTH: usize = 200;

/// Maximum length for a snapshot description in characters.
pub const MAX_SNAPSHOT_DESCRIPTION_LENGTH: usize = 1_000;

/// The saved content of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotPayload {
    /// Generated script text with the model and prompt that produced it.
    Script {
        content: String,
        model_id: String,
        prompt: String,
    },
    /// A raw prompt.
    Prompt { text: String },
}

impl SnapshotPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Script { .. } => "script",
            Self::Prompt { .. } => "prompt",
        }
    }
}

/// An immutable saved version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSnapshot {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub payload: SnapshotPayload,
    pub created_at: Timestamp,
}

/// Validate a snapshot name: must be non-empty and within length limit.
pub fn validate_snapshot_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Snapshot name must not be empty".to_string(),
        ));
    }
    let len = name.chars().count();
    if len > MAX_SNAPSHOT_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Snapshot name exceeds maximum length of {MAX_SNAPSHOT_NAME_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

/// Validate a snapshot description: length check only.
pub fn validate_snapshot_description(description: &str) -> Result<(), CoreError> {
    let len = description.chars().count();
    if len > MAX_SNAPSHOT_DESCRIPTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Snapshot description exceeds maximum length of {MAX_SNAPSHOT_DESCRIPTION_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}
