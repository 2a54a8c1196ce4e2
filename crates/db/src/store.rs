//! Per-project, append-only version history.

use studio_core::error::CoreError;
use studio_core::types::DbId;
use studio_core::versions::{
    validate_snapshot_description, validate_snapshot_name, SnapshotPayload, VersionSnapshot,
};

use crate::models::version_snapshot::CreateVersionSnapshot;
use crate::repositories::VersionSnapshotRepo;
use crate::{DbError, DbPool};

/// Durable store of immutable [`VersionSnapshot`]s, scoped by project id.
///
/// Only snapshots are stored. Working state (which column is generating,
/// in-flight jobs) never reaches this store, so a reopened store starts
/// every such flag at its idle default.
#[derive(Clone)]
pub struct VersionStore {
    pool: DbPool,
}

impl VersionStore {
    /// Wrap an existing pool. Migrations must already be applied.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`, creating the file and schema if needed.
    pub async fn open(database_url: &str) -> Result<Self, DbError> {
        let pool = crate::create_pool(database_url).await?;
        crate::run_migrations(&pool).await?;
        tracing::info!(database_url, "Version store opened");
        Ok(Self { pool })
    }

    /// Append a new snapshot and return it with its id and timestamp.
    pub async fn save(
        &self,
        project_id: DbId,
        payload: SnapshotPayload,
        name: &str,
        description: Option<&str>,
    ) -> Result<VersionSnapshot, DbError> {
        validate_snapshot_name(name)?;
        if let Some(description) = description {
            validate_snapshot_description(description)?;
        }

        let input = CreateVersionSnapshot {
            project_id,
            name: name.trim().to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            payload,
        };
        let row = VersionSnapshotRepo::create(&self.pool, &input).await?;
        let snapshot = VersionSnapshot::try_from(row)?;

        tracing::info!(
            project_id,
            snapshot_id = snapshot.id,
            kind = snapshot.payload.kind(),
            "Version saved",
        );
        Ok(snapshot)
    }

    /// Every snapshot for `project_id`, in creation order.
    pub async fn list_for_project(&self, project_id: DbId) -> Result<Vec<VersionSnapshot>, DbError> {
        VersionSnapshotRepo::list_for_project(&self.pool, project_id)
            .await?
            .into_iter()
            .map(|row| VersionSnapshot::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Read one snapshot. Copying it into working state is the caller's job.
    pub async fn select(&self, snapshot_id: DbId) -> Result<VersionSnapshot, DbError> {
        let row = VersionSnapshotRepo::find_by_id(&self.pool, snapshot_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "version_snapshot",
                id: snapshot_id,
            })?;
        Ok(VersionSnapshot::try_from(row)?)
    }

    pub async fn latest_for_project(
        &self,
        project_id: DbId,
    ) -> Result<Option<VersionSnapshot>, DbError> {
        VersionSnapshotRepo::latest_for_project(&self.pool, project_id)
            .await?
            .map(VersionSnapshot::try_from)
            .transpose()
            .map_err(DbError::from)
    }

    /// Close the pool, flushing the SQLite file.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
