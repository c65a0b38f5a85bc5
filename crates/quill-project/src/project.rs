use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use quill_core::{LineMap, Position};
use quill_engine::{EngineError, EnginePool};
use quill_proto::{FileEntry, HostMessage};
use quill_vfs::{canonical, BackingStore, FileRead, FileTree, TreeError};
use tokio::sync::broadcast;

/// Errors from project operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectError {
    /// The project has been disposed; no further mutation is observable.
    #[error("project is disposed")]
    Disposed,

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Notifications emitted after a project mutation has propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    /// The project's current file should be re-validated (diagnostics
    /// refreshed). Emitted only when a current file is set.
    RevalidateCurrentFile { project_id: String, path: String },
}

struct ProjectState {
    tree: FileTree,
    current_file: Option<String>,
    extra_compile: HashMap<String, String>,
    /// Most recently written content per canonical file identifier; used for
    /// coordinate conversion without re-querying the tree.
    contents: HashMap<String, String>,
}

/// One live project: an owned virtual file tree plus project-level state.
///
/// Mutations apply to the tree synchronously within a single cooperative
/// step, then propagate to every live engine connection through that
/// connection's request serializer. The disposal flag is re-checked after
/// every suspension point; a tripped flag aborts the operation early with
/// [`ProjectError::Disposed`] and no further side effects.
pub struct Project {
    id: String,
    extra_lib: String,
    store: Arc<dyn BackingStore>,
    engines: Arc<EnginePool>,
    events: broadcast::Sender<ProjectEvent>,
    state: Mutex<ProjectState>,
    disposed: AtomicBool,
}

impl Project {
    pub fn new(
        id: impl Into<String>,
        store: Arc<dyn BackingStore>,
        engines: Arc<EnginePool>,
        events: broadcast::Sender<ProjectEvent>,
        current_file: Option<String>,
        extra_lib: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            extra_lib: extra_lib.into(),
            store,
            engines,
            events,
            state: Mutex::new(ProjectState {
                tree: FileTree::new(),
                current_file,
                extra_compile: HashMap::new(),
                contents: HashMap::new(),
            }),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn extra_lib(&self) -> &str {
        &self.extra_lib
    }

    pub fn backing_store(&self) -> Arc<dyn BackingStore> {
        self.store.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Flags the project disposed. In-flight operations observe the flag at
    /// their next suspension point and abort.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        tracing::debug!(target: "quill.project", project_id = %self.id, "project disposed");
    }

    fn state(&self) -> MutexGuard<'_, ProjectState> {
        self.state.lock().expect("project state mutex poisoned")
    }

    fn ensure_live(&self) -> Result<(), ProjectError> {
        if self.is_disposed() {
            return Err(ProjectError::Disposed);
        }
        Ok(())
    }

    /// Seeds the tree from registration entries, without propagation and
    /// without version bumps. Entries with no content become not-loaded
    /// placeholders served later by the lazy-load path.
    pub fn seed_files(&self, files: &[FileEntry]) {
        let mut state = self.state();
        for file in files {
            match &file.content {
                Some(content) => {
                    state.tree.write_file(&file.path, content.clone());
                    state.contents.insert(canonical(&file.path), content.clone());
                }
                None => state.tree.insert_placeholder(&file.path),
            }
        }
    }

    pub fn current_file(&self) -> Option<String> {
        self.state().current_file.clone()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state().tree.exists(path)
    }

    pub fn directory_exists(&self, path: &str) -> bool {
        self.state().tree.directory_exists(path)
    }

    pub fn read_file(&self, path: &str) -> FileRead {
        self.state().tree.read_file(path)
    }

    pub fn version(&self, path: &str) -> u64 {
        self.state().tree.version(path)
    }

    pub fn list_files(
        &self,
        dir: &str,
        extensions: &[&str],
        exclude: Option<&[&str]>,
    ) -> Result<Vec<String>, TreeError> {
        self.state().tree.list_files(dir, extensions, exclude)
    }

    pub fn list_subdirectories(&self, dir: &str) -> Result<Vec<String>, TreeError> {
        self.state().tree.list_subdirectories(dir)
    }

    /// Cached content of the most recent write to `path`, if any.
    pub fn cached_content(&self, path: &str) -> Option<String> {
        self.state().contents.get(&canonical(path)).cloned()
    }

    pub fn extra_compile_files(&self) -> HashMap<String, String> {
        self.state().extra_compile.clone()
    }

    /// Converts a byte offset within the cached content of `path` to a
    /// 1-based line/column position.
    pub fn offset_to_position(&self, path: &str, offset: usize) -> Option<Position> {
        let content = self.cached_content(path)?;
        Some(LineMap::new(&content).position(offset))
    }

    /// Converts a 1-based line/column position within the cached content of
    /// `path` back to a byte offset.
    pub fn position_to_offset(&self, path: &str, position: Position) -> Option<usize> {
        let content = self.cached_content(path)?;
        Some(LineMap::new(&content).offset(position))
    }

    /// Sets or overwrites `path`, propagating the new content and version to
    /// every live engine connection.
    pub async fn write_file(
        &self,
        path: &str,
        content: impl Into<String>,
    ) -> Result<(), ProjectError> {
        self.ensure_live()?;
        let content = content.into();
        let version = {
            let mut state = self.state();
            state.contents.insert(canonical(path), content.clone());
            state.tree.write_file(path, content.clone())
        };
        self.propagate(HostMessage::WriteFile {
            project_id: self.id.clone(),
            path: path.to_owned(),
            content,
            version,
        })
        .await?;
        self.emit_revalidate();
        Ok(())
    }

    /// Deletes `path`, failing with [`TreeError::NotFound`] when absent.
    pub async fn remove_file(&self, path: &str) -> Result<(), ProjectError> {
        self.ensure_live()?;
        {
            let mut state = self.state();
            state.tree.remove_file(path)?;
            state.contents.remove(&canonical(path));
        }
        self.propagate(HostMessage::RemoveFile {
            project_id: self.id.clone(),
            path: path.to_owned(),
        })
        .await?;
        self.emit_revalidate();
        Ok(())
    }

    pub async fn mk_dir(&self, path: &str, recursive: bool) -> Result<(), ProjectError> {
        self.ensure_live()?;
        self.state().tree.mk_dir(path, recursive)?;
        self.propagate(HostMessage::MkDir {
            project_id: self.id.clone(),
            path: path.to_owned(),
        })
        .await?;
        self.emit_revalidate();
        Ok(())
    }

    pub async fn rm_dir(&self, path: &str) -> Result<(), ProjectError> {
        self.ensure_live()?;
        self.state().tree.rm_dir(path);
        self.propagate(HostMessage::RmDir {
            project_id: self.id.clone(),
            path: path.to_owned(),
        })
        .await?;
        self.emit_revalidate();
        Ok(())
    }

    /// Updates the analysis entry point. The state changes before propagation
    /// so the revalidation notification carries the new target.
    pub async fn set_current_file(&self, path: Option<String>) -> Result<(), ProjectError> {
        self.ensure_live()?;
        self.state().current_file = path.clone();
        self.propagate(HostMessage::SetCurrentFile {
            project_id: self.id.clone(),
            path,
        })
        .await?;
        self.emit_revalidate();
        Ok(())
    }

    /// Includes an out-of-band file in the active compile set under `key`,
    /// without changing the current file.
    pub async fn mark_extra_compile_file(
        &self,
        key: &str,
        path: &str,
    ) -> Result<(), ProjectError> {
        self.ensure_live()?;
        self.state()
            .extra_compile
            .insert(key.to_owned(), path.to_owned());
        self.propagate(HostMessage::MarkExtraCompileFile {
            project_id: self.id.clone(),
            key: key.to_owned(),
            path: path.to_owned(),
        })
        .await?;
        self.emit_revalidate();
        Ok(())
    }

    pub async fn unmark_extra_compile_file(&self, key: &str) -> Result<(), ProjectError> {
        self.ensure_live()?;
        self.state().extra_compile.remove(key);
        self.propagate(HostMessage::UnmarkExtraCompileFile {
            project_id: self.id.clone(),
            key: key.to_owned(),
        })
        .await?;
        self.emit_revalidate();
        Ok(())
    }

    /// Pushes `message` through every live connection's serializer, in pool
    /// order. An empty pool is a no-op. The disposed flag is re-checked after
    /// every await.
    async fn propagate(&self, message: HostMessage) -> Result<(), ProjectError> {
        for connection in self.engines.connections() {
            if self.is_disposed() {
                tracing::debug!(
                    target: "quill.project",
                    project_id = %self.id,
                    "aborting propagation: project disposed mid-flight"
                );
                return Err(ProjectError::Disposed);
            }
            connection.request(message.clone()).await?;
        }
        self.ensure_live()?;
        Ok(())
    }

    fn emit_revalidate(&self) {
        let Some(path) = self.current_file() else {
            return;
        };
        // No subscribers is fine; validation is best-effort.
        let _ = self.events.send(ProjectEvent::RevalidateCurrentFile {
            project_id: self.id.clone(),
            path,
        });
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
