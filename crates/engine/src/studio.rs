//! Top-level wiring: per-project sessions over shared transports.

use std::sync::Arc;

use studio_core::error::CoreError;
use studio_core::types::DbId;
use studio_core::versions::{SnapshotPayload, VersionSnapshot};
use studio_db::VersionStore;
use studio_remote::{GenerationApi, JobTransport, TextStreamTransport};

use crate::config::StudioConfig;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::jobs::JobOrchestrator;
use crate::store::ProjectStore;
use crate::stream::StreamOrchestrator;

/// Working state of one open project.
///
/// Nothing in here is persisted; a fresh session starts with idle columns
/// and an empty job table.
pub struct ProjectSession {
    project_id: DbId,
    streams: StreamOrchestrator,
    jobs: JobOrchestrator,
}

impl ProjectSession {
    pub fn project_id(&self) -> DbId {
        self.project_id
    }

    pub fn streams(&self) -> &StreamOrchestrator {
        &self.streams
    }

    pub fn jobs(&self) -> &JobOrchestrator {
        &self.jobs
    }

    /// Cancel every stream and stop every poll loop.
    pub fn shutdown(&self) {
        let streams = self.streams.cancel_all();
        let polls = self.jobs.stop_all();
        tracing::debug!(project_id = self.project_id, streams, polls, "Project session closed");
    }
}

/// Shared entry point: transports, event bus, version store and the keyed
/// project sessions.
pub struct Studio {
    config: StudioConfig,
    text: Arc<dyn TextStreamTransport>,
    jobs: Arc<dyn JobTransport>,
    versions: VersionStore,
    events: Arc<EventBus>,
    projects: ProjectStore<ProjectSession>,
}

impl Studio {
    /// Build a studio against the HTTP generation service and the SQLite
    /// version store named in `config`.
    pub async fn connect(config: StudioConfig) -> Result<Self, EngineError> {
        let api = Arc::new(GenerationApi::new(config.api_url.clone()));
        let versions = VersionStore::open(&config.database_url).await?;
        tracing::info!(api_url = %api.api_url(), models = ?config.stream_models, "Studio ready");
        Ok(Self::new(
            config,
            Arc::clone(&api) as Arc<dyn TextStreamTransport>,
            api,
            versions,
        ))
    }

    pub fn new(
        config: StudioConfig,
        text: Arc<dyn TextStreamTransport>,
        jobs: Arc<dyn JobTransport>,
        versions: VersionStore,
    ) -> Self {
        let events = Arc::new(EventBus::new(config.event_channel_capacity));
        Self {
            config,
            text,
            jobs,
            versions,
            events,
            projects: ProjectStore::new(),
        }
    }

    /// The session for `project_id`, created on first access.
    pub fn project(&self, project_id: DbId) -> Arc<ProjectSession> {
        self.projects.get_or_insert_with(project_id, || ProjectSession {
            project_id,
            streams: StreamOrchestrator::new(
                project_id,
                Arc::clone(&self.text),
                Arc::clone(&self.events),
                self.config.stream_models.iter().cloned(),
            ),
            jobs: JobOrchestrator::new(
                project_id,
                Arc::clone(&self.jobs),
                Arc::clone(&self.events),
                self.config.poll_interval,
            ),
        })
    }

    /// Shut down and forget a project's session. Saved versions remain.
    pub fn close_project(&self, project_id: DbId) -> bool {
        match self.projects.remove(project_id) {
            Some(session) => {
                session.shutdown();
                true
            }
            None => false,
        }
    }

    pub fn open_projects(&self) -> Vec<DbId> {
        self.projects.project_ids()
    }

    /// Save the selected column's text as a script version.
    pub async fn save_selected_column(
        &self,
        project_id: DbId,
        prompt: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<VersionSnapshot, EngineError> {
        let column = self
            .project(project_id)
            .streams()
            .selected()
            .ok_or_else(|| CoreError::Internal("No column is selected".to_string()))?;
        if column.is_generating {
            return Err(CoreError::Conflict(format!(
                "Column {} is still generating",
                column.id
            ))
            .into());
        }

        let payload = SnapshotPayload::Script {
            content: column.content,
            model_id: column.model_id,
            prompt: prompt.to_string(),
        };
        Ok(self
            .versions
            .save(project_id, payload, name, description)
            .await?)
    }

    /// Save a raw prompt as a version.
    pub async fn save_prompt(
        &self,
        project_id: DbId,
        text: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<VersionSnapshot, EngineError> {
        let payload = SnapshotPayload::Prompt {
            text: text.to_string(),
        };
        Ok(self
            .versions
            .save(project_id, payload, name, description)
            .await?)
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Stop all work and close the version store.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down studio");
        for session in self.projects.values() {
            session.shutdown();
        }
        self.versions.close().await;
        tracing::info!("Studio shut down complete");
    }
}
