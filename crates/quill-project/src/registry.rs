use std::sync::{Arc, Mutex, MutexGuard};

use crate::project::Project;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown project: {0}")]
    UnknownProject(String),
}

#[derive(Default)]
struct RegistryInner {
    /// Insertion order is creation order.
    projects: Vec<Arc<Project>>,
    active_id: Option<String>,
}

/// Process-wide set of live projects plus the "active project" pointer.
///
/// The registry is used for discovery (enumerating live projects) only;
/// boundary calls carry their project id explicitly. The active id, when
/// set, always references a live project — disposing the active project
/// clears it.
#[derive(Default)]
pub struct ProjectRegistry {
    inner: Mutex<RegistryInner>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().expect("registry mutex poisoned")
    }

    /// Adds `project` to the live set. Registration is idempotent per id:
    /// when a live project with the same id already exists it is returned
    /// unchanged and `project` is dropped.
    pub fn register(&self, project: Arc<Project>) -> Arc<Project> {
        let mut inner = self.inner();
        if let Some(existing) = inner.projects.iter().find(|p| p.id() == project.id()) {
            return existing.clone();
        }
        inner.projects.push(project.clone());
        project
    }

    pub fn get(&self, id: &str) -> Option<Arc<Project>> {
        let inner = self.inner();
        inner.projects.iter().find(|p| p.id() == id).cloned()
    }

    /// Live projects in creation order.
    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.inner().projects.clone()
    }

    pub fn active_id(&self) -> Option<String> {
        self.inner().active_id.clone()
    }

    /// Points the engine at `id`. Returns `false` when `id` is already
    /// active (the switch is a no-op) and errors for unknown projects.
    pub fn set_active(&self, id: &str) -> Result<bool, RegistryError> {
        let mut inner = self.inner();
        if !inner.projects.iter().any(|p| p.id() == id) {
            return Err(RegistryError::UnknownProject(id.to_owned()));
        }
        if inner.active_id.as_deref() == Some(id) {
            return Ok(false);
        }
        inner.active_id = Some(id.to_owned());
        Ok(true)
    }

    /// Removes `id` from the live set and flags the project disposed.
    ///
    /// Returns the removed project so the caller can notify connections.
    pub fn dispose(&self, id: &str) -> Option<Arc<Project>> {
        let mut inner = self.inner();
        let idx = inner.projects.iter().position(|p| p.id() == id)?;
        let project = inner.projects.remove(idx);
        if inner.active_id.as_deref() == Some(id) {
            inner.active_id = None;
        }
        project.dispose();
        Some(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quill_engine::EnginePool;
    use quill_vfs::MemoryStore;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    fn project(id: &str) -> Arc<Project> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Project::new(
            id,
            Arc::new(MemoryStore::new()),
            Arc::new(EnginePool::new()),
            events,
            None,
            "",
        ))
    }

    #[test]
    fn register_is_idempotent_per_id() {
        let registry = ProjectRegistry::new();
        let first = registry.register(project("p1"));
        let second = registry.register(project("p1"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.projects().len(), 1);
    }

    #[test]
    fn projects_enumerate_in_creation_order() {
        let registry = ProjectRegistry::new();
        registry.register(project("p2"));
        registry.register(project("p1"));
        registry.register(project("p3"));
        let ids: Vec<_> = registry.projects().iter().map(|p| p.id().to_owned()).collect();
        assert_eq!(ids, ["p2", "p1", "p3"]);
    }

    #[test]
    fn active_id_always_references_a_live_project() {
        let registry = ProjectRegistry::new();
        registry.register(project("p1"));

        assert_eq!(
            registry.set_active("nope"),
            Err(RegistryError::UnknownProject("nope".to_owned()))
        );
        assert_eq!(registry.set_active("p1"), Ok(true));
        assert_eq!(registry.set_active("p1"), Ok(false));
        assert_eq!(registry.active_id().as_deref(), Some("p1"));

        let disposed = registry.dispose("p1").unwrap();
        assert!(disposed.is_disposed());
        assert_eq!(registry.active_id(), None);
        assert!(registry.get("p1").is_none());
    }

    #[test]
    fn disposed_ids_can_be_registered_fresh() {
        let registry = ProjectRegistry::new();
        registry.register(project("p1"));
        registry.dispose("p1").unwrap();
        let fresh = registry.register(project("p1"));
        assert!(!fresh.is_disposed());
    }
}
