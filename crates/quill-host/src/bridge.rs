use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quill_engine::EngineConnection;
use quill_project::ProjectRegistry;
use quill_proto::EngineSignal;

/// Progress of one (project, file) lazy load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Requested,
    Loading,
    Delivered,
}

/// Feeds files the engine has never seen from the backing store back into the
/// worker via the ordinary mutation path.
///
/// The bridge registers a `NeedsFile` handler on a connection's dispatcher.
/// Each load runs as its own task so the engine's other progress is never
/// blocked on a slow store. Delivery goes through `Project::write_file`, i.e.
/// through every connection's request serializer, so analysis calls queued
/// behind the delivery observe the freshly loaded content.
///
/// A failed read is logged and leaves the file in its not-loaded state;
/// repeated requests simply re-read and re-push idempotently.
pub struct LazyLoadBridge {
    registry: Arc<ProjectRegistry>,
    loads: Mutex<HashMap<(String, String), LoadState>>,
}

impl LazyLoadBridge {
    /// Creates a bridge and registers its handler on `connection`.
    pub fn install(connection: &EngineConnection, registry: Arc<ProjectRegistry>) -> Arc<Self> {
        let bridge = Arc::new(Self {
            registry,
            loads: Mutex::new(HashMap::new()),
        });
        let handler = bridge.clone();
        connection.on_signal(Arc::new(move |signal| {
            let bridge = handler.clone();
            Box::pin(async move {
                if let EngineSignal::NeedsFile { project_id, path } = signal {
                    tokio::spawn(async move { bridge.load(project_id, path).await });
                }
            })
        }));
        bridge
    }

    /// Current load state for a (project, file) pair, if any.
    pub fn load_state(&self, project_id: &str, path: &str) -> Option<LoadState> {
        let loads = self.loads.lock().expect("bridge loads mutex poisoned");
        loads.get(&(project_id.to_owned(), path.to_owned())).copied()
    }

    fn set_state(&self, project_id: &str, path: &str, state: LoadState) {
        let mut loads = self.loads.lock().expect("bridge loads mutex poisoned");
        loads.insert((project_id.to_owned(), path.to_owned()), state);
    }

    fn clear_state(&self, project_id: &str, path: &str) {
        let mut loads = self.loads.lock().expect("bridge loads mutex poisoned");
        loads.remove(&(project_id.to_owned(), path.to_owned()));
    }

    /// Drops every load record belonging to `project_id`. Called on project
    /// disposal so the map does not accumulate records for dead projects.
    pub fn forget_project(&self, project_id: &str) {
        let mut loads = self.loads.lock().expect("bridge loads mutex poisoned");
        loads.retain(|(id, _), _| id != project_id);
    }

    /// Runs one load end to end. Failures never escape: they are logged and
    /// the file stays not-loaded so a later request can retry.
    pub async fn load(&self, project_id: String, path: String) {
        self.set_state(&project_id, &path, LoadState::Requested);

        let Some(project) = self.registry.get(&project_id) else {
            tracing::debug!(
                target: "quill.bridge",
                project_id = %project_id,
                path = %path,
                "ignoring file request for unknown project"
            );
            self.clear_state(&project_id, &path);
            return;
        };
        if project.is_disposed() {
            self.clear_state(&project_id, &path);
            return;
        }

        self.set_state(&project_id, &path, LoadState::Loading);
        let content = match project.backing_store().read_file(&path).await {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(
                    target: "quill.bridge",
                    project_id = %project_id,
                    path = %path,
                    error = %err,
                    "lazy load failed; file stays not loaded"
                );
                self.clear_state(&project_id, &path);
                return;
            }
        };

        // The project may have been disposed while the store read was in
        // flight; deliver nothing in that case.
        if project.is_disposed() {
            self.clear_state(&project_id, &path);
            return;
        }

        if let Err(err) = project.write_file(&path, content).await {
            tracing::warn!(
                target: "quill.bridge",
                project_id = %project_id,
                path = %path,
                error = %err,
                "failed to deliver lazily loaded file"
            );
            self.clear_state(&project_id, &path);
            return;
        }

        self.set_state(&project_id, &path, LoadState::Delivered);
        tracing::debug!(
            target: "quill.bridge",
            project_id = %project_id,
            path = %path,
            "lazy load delivered"
        );
    }
}
