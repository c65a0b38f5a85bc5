use std::collections::HashMap;

use crate::path::{self, canonical};

/// Structural errors from [`FileTree`] operations.
///
/// These indicate caller bugs rather than transient conditions and fail fast;
/// no operation leaves the tree partially mutated when it errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("parent directory not found: {0}")]
    ParentMissing(String),
}

/// Result of reading a file from the tree.
///
/// `NotLoaded` means the file is known to exist but its content has not been
/// transferred yet; it is the trigger for the lazy-load path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRead {
    NotFound,
    NotLoaded,
    Loaded(String),
}

impl FileRead {
    pub fn found(&self) -> bool {
        !matches!(self, FileRead::NotFound)
    }

    pub fn loaded(&self) -> Option<&str> {
        match self {
            FileRead::Loaded(content) => Some(content),
            _ => None,
        }
    }
}

/// One directory node: file entries (content or the not-loaded sentinel) and
/// child directories, keyed by leaf segment.
#[derive(Debug, Default, Clone)]
struct Directory {
    files: HashMap<String, Option<String>>,
    folders: HashMap<String, Directory>,
}

/// In-memory hierarchical store of one project's files and directories.
///
/// Paths may be bare POSIX-style relative paths or `file://` URIs; both are
/// normalized and resolved against the project root. The per-file version
/// table increments only when an *existing* entry is overwritten — the first
/// write leaves a file at version 0, and consumers treat version 0 as "first
/// seen" for cache invalidation.
#[derive(Debug, Default, Clone)]
pub struct FileTree {
    root: Directory,
    versions: HashMap<String, u64>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn dir(&self, dir: &str) -> Option<&Directory> {
        if path::is_root(dir) {
            return Some(&self.root);
        }
        let mut node = &self.root;
        for segment in path::segments(dir) {
            node = node.folders.get(segment)?;
        }
        Some(node)
    }

    fn dir_mut(&mut self, dir: &str) -> Option<&mut Directory> {
        if path::is_root(dir) {
            return Some(&mut self.root);
        }
        let mut node = &mut self.root;
        for segment in path::segments(dir) {
            node = node.folders.get_mut(segment)?;
        }
        Some(node)
    }

    fn dir_mut_creating(&mut self, dir: &str) -> &mut Directory {
        let mut node = &mut self.root;
        if path::is_root(dir) {
            return node;
        }
        for segment in path::segments(dir) {
            node = node.folders.entry(segment.to_owned()).or_default();
        }
        node
    }

    /// Whether `path` names a registered file (loaded or not).
    pub fn exists(&self, p: &str) -> bool {
        self.dir(path::dirname(p))
            .is_some_and(|d| d.files.contains_key(path::basename(p)))
    }

    /// Whether `path` names a directory. The root always exists.
    pub fn directory_exists(&self, p: &str) -> bool {
        self.dir(p).is_some()
    }

    /// Creates the directory at `p`.
    ///
    /// With `recursive` set, all missing intermediate directories are created;
    /// otherwise a missing intermediate fails with [`TreeError::ParentMissing`].
    /// Creating a directory that already exists is a no-op.
    pub fn mk_dir(&mut self, p: &str, recursive: bool) -> Result<(), TreeError> {
        if path::is_root(p) {
            return Ok(());
        }
        if recursive {
            self.dir_mut_creating(p);
            return Ok(());
        }
        let parent = self
            .dir_mut(path::dirname(p))
            .ok_or_else(|| TreeError::ParentMissing(p.to_owned()))?;
        parent
            .folders
            .entry(path::basename(p).to_owned())
            .or_default();
        Ok(())
    }

    /// Removes the directory at `p` and everything beneath it.
    ///
    /// Absent directories are a no-op. Version records under the removed
    /// subtree are dropped so a re-created file starts over at version 0.
    pub fn rm_dir(&mut self, p: &str) {
        if path::is_root(p) {
            return;
        }
        let Some(parent) = self.dir_mut(path::dirname(p)) else {
            return;
        };
        if parent.folders.remove(path::basename(p)).is_some() {
            let prefix = format!("{}/", canonical(p));
            self.versions.retain(|key, _| !key.starts_with(&prefix));
        }
    }

    /// Sets or overwrites the file at `p`, creating missing parent
    /// directories, and returns the resulting version.
    ///
    /// Overwriting an existing entry (including a not-loaded placeholder)
    /// increments the version; first-time creation stays at version 0.
    pub fn write_file(&mut self, p: &str, content: impl Into<String>) -> u64 {
        let name = path::basename(p).to_owned();
        let dir = self.dir_mut_creating(path::dirname(p));
        let existed = dir.files.insert(name, Some(content.into())).is_some();
        let key = canonical(p);
        if existed {
            let version = self.versions.entry(key).or_insert(0);
            *version += 1;
            *version
        } else {
            self.versions.get(&key).copied().unwrap_or(0)
        }
    }

    /// Records the file at `p` as existing but not loaded, creating missing
    /// parent directories. Already-present entries (loaded or not) are left
    /// untouched; versions never change.
    pub fn insert_placeholder(&mut self, p: &str) {
        let name = path::basename(p).to_owned();
        let dir = self.dir_mut_creating(path::dirname(p));
        dir.files.entry(name).or_insert(None);
    }

    /// Deletes the file at `p` and its version record.
    pub fn remove_file(&mut self, p: &str) -> Result<(), TreeError> {
        let dir = self
            .dir_mut(path::dirname(p))
            .ok_or_else(|| TreeError::NotFound(p.to_owned()))?;
        dir.files
            .remove(path::basename(p))
            .ok_or_else(|| TreeError::NotFound(p.to_owned()))?;
        self.versions.remove(&canonical(p));
        Ok(())
    }

    /// Three-way read: missing, known-but-not-loaded, or loaded content.
    pub fn read_file(&self, p: &str) -> FileRead {
        let Some(dir) = self.dir(path::dirname(p)) else {
            return FileRead::NotFound;
        };
        match dir.files.get(path::basename(p)) {
            None => FileRead::NotFound,
            Some(None) => FileRead::NotLoaded,
            Some(Some(content)) => FileRead::Loaded(content.clone()),
        }
    }

    /// Non-recursive listing of the file names in `dir`, filtered by
    /// extension membership (empty `extensions` means no filter) and an
    /// optional exclusion set of file names.
    pub fn list_files(
        &self,
        dir: &str,
        extensions: &[&str],
        exclude: Option<&[&str]>,
    ) -> Result<Vec<String>, TreeError> {
        let node = self
            .dir(dir)
            .ok_or_else(|| TreeError::NotFound(dir.to_owned()))?;
        let mut names: Vec<String> = node
            .files
            .keys()
            .filter(|name| {
                let name = name.as_str();
                let matches_extension = extensions.is_empty()
                    || path::extension(name).is_some_and(|ext| extensions.contains(&ext));
                matches_extension && !exclude.is_some_and(|ex| ex.contains(&name))
            })
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    /// Names of the immediate subdirectories of `dir`.
    pub fn list_subdirectories(&self, dir: &str) -> Result<Vec<String>, TreeError> {
        let node = self
            .dir(dir)
            .ok_or_else(|| TreeError::NotFound(dir.to_owned()))?;
        let mut names: Vec<String> = node.folders.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Current version of the file at `p`; 0 if never overwritten.
    pub fn version(&self, p: &str) -> u64 {
        self.versions.get(&canonical(p)).copied().unwrap_or(0)
    }
}
