use std::sync::Arc;

use quill_engine::{
    AnalysisEngine, EngineConnection, EngineError, EnginePool, DEFAULT_QUEUE_CAPACITY,
};
use quill_project::{Project, ProjectError, ProjectEvent, ProjectRegistry, RegistryError};
use quill_proto::{
    CompletionItem, Diagnostic, EngineQuery, EngineSignal, FileEntry, HostMessage, QueryReply,
};
use quill_vfs::{BackingStore, StoreError};
use tokio::sync::{broadcast, mpsc};

use crate::bridge::LazyLoadBridge;

/// Tunables for a [`Host`].
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Bound of each connection's request queue.
    pub queue_capacity: usize,
    /// Capacity of the revalidation event channel.
    pub event_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            event_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("no engine connection available")]
    NoConnection,

    #[error("unexpected query reply")]
    UnexpectedReply,

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RegistryError> for HostError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownProject(id) => HostError::UnknownProject(id),
        }
    }
}

/// The boundary facade: everything the editor side of the system calls.
///
/// Every operation carries its project id explicitly; the registry's active
/// pointer exists so queries (which the engine resolves against the active
/// project) can be targeted by switching first.
pub struct Host {
    config: HostConfig,
    registry: Arc<ProjectRegistry>,
    engines: Arc<EnginePool>,
    bridges: std::sync::Mutex<Vec<Arc<LazyLoadBridge>>>,
    events: broadcast::Sender<ProjectEvent>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            registry: Arc::new(ProjectRegistry::new()),
            engines: Arc::new(EnginePool::new()),
            bridges: std::sync::Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn registry(&self) -> &Arc<ProjectRegistry> {
        &self.registry
    }

    pub fn engines(&self) -> &Arc<EnginePool> {
        &self.engines
    }

    /// Subscribes to "re-validate this project's current file" notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    /// Starts a connection to one engine instance and installs the lazy-load
    /// bridge on its inbound signals.
    ///
    /// `signals` is the engine's outbound stream; transporting it is the
    /// embedder's concern.
    pub fn add_connection(
        &self,
        name: impl Into<String>,
        engine: Arc<dyn AnalysisEngine>,
        signals: mpsc::Receiver<EngineSignal>,
    ) -> (EngineConnection, Arc<LazyLoadBridge>) {
        let connection =
            EngineConnection::spawn(name, engine, signals, self.config.queue_capacity);
        let bridge = LazyLoadBridge::install(&connection, self.registry.clone());
        self.engines.add(connection.clone());
        self.bridges
            .lock()
            .expect("host bridges mutex poisoned")
            .push(bridge.clone());
        (connection, bridge)
    }

    /// Registers a project, installing a fresh virtual file tree.
    ///
    /// Idempotent per id: a live project with the same id is returned
    /// unchanged. With no `initial_files`, the backing store's
    /// `read_all_directories` snapshot seeds the tree instead.
    pub async fn register_project(
        &self,
        id: &str,
        current_file: Option<String>,
        initial_files: Vec<FileEntry>,
        extra_lib: &str,
        store: Arc<dyn BackingStore>,
    ) -> Result<Arc<Project>, HostError> {
        if let Some(existing) = self.registry.get(id) {
            return Ok(existing);
        }

        let files = if initial_files.is_empty() {
            store
                .read_all_directories()
                .await?
                .into_iter()
                .map(|f| FileEntry {
                    path: f.identifier,
                    content: Some(f.content),
                })
                .collect()
        } else {
            initial_files
        };

        let project = Arc::new(Project::new(
            id,
            store,
            self.engines.clone(),
            self.events.clone(),
            current_file.clone(),
            extra_lib,
        ));
        project.seed_files(&files);
        let project = self.registry.register(project);

        let message = HostMessage::RegisterProject {
            project_id: id.to_owned(),
            current_file,
            files,
            extra_lib: extra_lib.to_owned(),
        };
        for connection in self.engines.connections() {
            connection.request(message.clone()).await?;
        }
        tracing::debug!(target: "quill.host", project_id = %id, "project registered");
        Ok(project)
    }

    /// Removes the project from the registry, flags it disposed, tells every
    /// connection to drop its file set, and prunes the lazy-load records.
    pub async fn dispose_project(&self, id: &str) -> Result<(), HostError> {
        self.registry
            .dispose(id)
            .ok_or_else(|| HostError::UnknownProject(id.to_owned()))?;
        let message = HostMessage::DisposeProject {
            project_id: id.to_owned(),
        };
        for connection in self.engines.connections() {
            if let Err(err) = connection.notify(message.clone()).await {
                tracing::warn!(
                    target: "quill.host",
                    project_id = %id,
                    connection = %connection.name(),
                    error = %err,
                    "failed to notify connection of disposal"
                );
            }
        }
        let bridges = self
            .bridges
            .lock()
            .expect("host bridges mutex poisoned")
            .clone();
        for bridge in bridges {
            bridge.forget_project(id);
        }
        Ok(())
    }

    /// Points the engine at `id`. A no-op when already active; otherwise the
    /// switch is serialized against pending mutations on every connection, so
    /// an in-flight analysis query never observes a switch mid-query.
    ///
    /// The registry's active pointer commits only after every connection has
    /// acknowledged the switch; a rejected switch leaves it unchanged.
    pub async fn set_active_project(&self, id: &str) -> Result<(), HostError> {
        if self.registry.get(id).is_none() {
            return Err(HostError::UnknownProject(id.to_owned()));
        }
        if self.registry.active_id().as_deref() == Some(id) {
            return Ok(());
        }
        let message = HostMessage::SetActiveProject {
            project_id: id.to_owned(),
        };
        for connection in self.engines.connections() {
            connection.request(message.clone()).await?;
        }
        self.registry.set_active(id)?;
        Ok(())
    }

    fn project(&self, id: &str) -> Result<Arc<Project>, HostError> {
        self.registry
            .get(id)
            .ok_or_else(|| HostError::UnknownProject(id.to_owned()))
    }

    pub async fn write_file(
        &self,
        id: &str,
        path: &str,
        content: impl Into<String>,
    ) -> Result<(), HostError> {
        Ok(self.project(id)?.write_file(path, content).await?)
    }

    pub async fn remove_file(&self, id: &str, path: &str) -> Result<(), HostError> {
        Ok(self.project(id)?.remove_file(path).await?)
    }

    pub async fn mk_dir(&self, id: &str, path: &str, recursive: bool) -> Result<(), HostError> {
        Ok(self.project(id)?.mk_dir(path, recursive).await?)
    }

    pub async fn rm_dir(&self, id: &str, path: &str) -> Result<(), HostError> {
        Ok(self.project(id)?.rm_dir(path).await?)
    }

    pub async fn set_current_file(
        &self,
        id: &str,
        path: Option<String>,
    ) -> Result<(), HostError> {
        Ok(self.project(id)?.set_current_file(path).await?)
    }

    pub async fn mark_extra_compile_file(
        &self,
        id: &str,
        key: &str,
        path: &str,
    ) -> Result<(), HostError> {
        Ok(self.project(id)?.mark_extra_compile_file(key, path).await?)
    }

    pub async fn unmark_extra_compile_file(&self, id: &str, key: &str) -> Result<(), HostError> {
        Ok(self.project(id)?.unmark_extra_compile_file(key).await?)
    }

    fn query_connection(&self) -> Result<EngineConnection, HostError> {
        self.engines
            .connections()
            .into_iter()
            .next()
            .ok_or(HostError::NoConnection)
    }

    /// Diagnostics for `path`, resolved against the active project once the
    /// connection's queue has drained.
    pub async fn diagnostics(&self, path: &str) -> Result<Vec<Diagnostic>, HostError> {
        let reply = self
            .query_connection()?
            .query_when_idle(EngineQuery::Diagnostics {
                path: path.to_owned(),
            })
            .await?;
        match reply {
            QueryReply::Diagnostics(diagnostics) => Ok(diagnostics),
            _ => Err(HostError::UnexpectedReply),
        }
    }

    pub async fn completions(
        &self,
        path: &str,
        offset: usize,
    ) -> Result<Vec<CompletionItem>, HostError> {
        let reply = self
            .query_connection()?
            .query_when_idle(EngineQuery::Completions {
                path: path.to_owned(),
                offset,
            })
            .await?;
        match reply {
            QueryReply::Completions(items) => Ok(items),
            _ => Err(HostError::UnexpectedReply),
        }
    }

    pub async fn quick_info(&self, path: &str, offset: usize) -> Result<Option<String>, HostError> {
        let reply = self
            .query_connection()?
            .query_when_idle(EngineQuery::QuickInfo {
                path: path.to_owned(),
                offset,
            })
            .await?;
        match reply {
            QueryReply::QuickInfo(info) => Ok(info),
            _ => Err(HostError::UnexpectedReply),
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_conservative() {
        let config = HostConfig::default();
        assert!(config.queue_capacity >= 1);
        assert!(config.event_capacity >= 1);
    }

    #[tokio::test]
    async fn queries_without_a_connection_fail_cleanly() {
        let host = Host::default();
        assert_eq!(
            host.diagnostics("/a.ts").await,
            Err(HostError::NoConnection)
        );
    }
}
