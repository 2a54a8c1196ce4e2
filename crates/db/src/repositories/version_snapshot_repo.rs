//! Repository for the `version_snapshots` table.
//!
//! Insert and read only; rows are never updated or deleted.

use chrono::Utc;
use studio_core::types::DbId;

use crate::models::version_snapshot::{CreateVersionSnapshot, VersionSnapshotRow};
use crate::{DbError, DbPool};

/// Column list for version_snapshots queries.
const COLUMNS: &str = "id, project_id, name, description, kind, payload, created_at";

/// Provides append and read operations for version snapshots.
pub struct VersionSnapshotRepo;

impl VersionSnapshotRepo {
    /// Insert a new snapshot stamped with the current time.
    pub async fn create(
        pool: &DbPool,
        input: &CreateVersionSnapshot,
    ) -> Result<VersionSnapshotRow, DbError> {
        let payload = serde_json::to_string(&input.payload)?;
        let query = format!(
            "INSERT INTO version_snapshots
                (project_id, name, description, kind, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, VersionSnapshotRow>(&query)
            .bind(input.project_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.payload.kind())
            .bind(payload)
            .bind(Utc::now())
            .fetch_one(pool)
            .await?;
        Ok(row)
    }

    /// Find a snapshot by its primary key.
    pub async fn find_by_id(
        pool: &DbPool,
        id: DbId,
    ) -> Result<Option<VersionSnapshotRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM version_snapshots WHERE id = ?1");
        sqlx::query_as::<_, VersionSnapshotRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All snapshots for a project, oldest first.
    pub async fn list_for_project(
        pool: &DbPool,
        project_id: DbId,
    ) -> Result<Vec<VersionSnapshotRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM version_snapshots
             WHERE project_id = ?1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, VersionSnapshotRow>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// The most recently saved snapshot for a project.
    pub async fn latest_for_project(
        pool: &DbPool,
        project_id: DbId,
    ) -> Result<Option<VersionSnapshotRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM version_snapshots
             WHERE project_id = ?1
             ORDER BY id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, VersionSnapshotRow>(&query)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }
}
