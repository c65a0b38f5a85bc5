use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Failures from the backing store.
///
/// These are propagated unwrapped from the external read capability; callers
/// on the lazy-load path treat them as retryable and leave the affected file
/// in its not-loaded state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("file not found in backing store: {0}")]
    NotFound(String),

    #[error("backing store read failed: {message}")]
    Io { message: String },
}

/// One file from the backing store's initial snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFile {
    pub identifier: String,
    pub content: String,
}

/// The external source of truth for a project's files.
///
/// The trait is intentionally small so it can be implemented for different
/// backends (a real filesystem, a remote store, an editor workspace). Reads
/// may happen concurrently; implementations tolerate that without extra
/// locking from this crate.
pub trait BackingStore: Send + Sync {
    /// Reads one file by identifier.
    fn read_file(&self, identifier: &str) -> BoxFuture<Result<String, StoreError>>;

    /// Reads the full snapshot used when a project is first registered.
    fn read_all_directories(&self) -> BoxFuture<Result<Vec<StoreFile>, StoreError>>;
}

/// In-memory [`BackingStore`] for tests and embedders that already hold the
/// project's files.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identifier: impl Into<String>, content: impl Into<String>) {
        let mut files = self.files.lock().expect("memory store mutex poisoned");
        files.insert(identifier.into(), content.into());
    }

    pub fn remove(&self, identifier: &str) {
        let mut files = self.files.lock().expect("memory store mutex poisoned");
        files.remove(identifier);
    }
}

impl BackingStore for MemoryStore {
    fn read_file(&self, identifier: &str) -> BoxFuture<Result<String, StoreError>> {
        let result = {
            let files = self.files.lock().expect("memory store mutex poisoned");
            files
                .get(identifier)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(identifier.to_owned()))
        };
        Box::pin(async move { result })
    }

    fn read_all_directories(&self) -> BoxFuture<Result<Vec<StoreFile>, StoreError>> {
        let mut snapshot: Vec<StoreFile> = {
            let files = self.files.lock().expect("memory store mutex poisoned");
            files
                .iter()
                .map(|(identifier, content)| StoreFile {
                    identifier: identifier.clone(),
                    content: content.clone(),
                })
                .collect()
        };
        snapshot.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Box::pin(async move { Ok(snapshot) })
    }
}
