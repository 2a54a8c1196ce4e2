//! Row type for the `version_snapshots` table.

use sqlx::FromRow;
use studio_core::types::{DbId, Timestamp};
use studio_core::versions::{SnapshotPayload, VersionSnapshot};

/// A raw `version_snapshots` row. The payload column holds JSON.
#[derive(Debug, Clone, FromRow)]
pub struct VersionSnapshotRow {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub kind: String,
    pub payload: String,
    pub created_at: Timestamp,
}

/// Input for inserting a new snapshot.
#[derive(Debug, Clone)]
pub struct CreateVersionSnapshot {
    pub project_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub payload: SnapshotPayload,
}

impl TryFrom<VersionSnapshotRow> for VersionSnapshot {
    type Error = serde_json::Error;

    fn try_from(row: VersionSnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            description: row.description,
            payload: serde_json::from_str(&row.payload)?,
            created_at: row.created_at,
        })
    }
}
