//! Boundary message set for the host ⇄ engine-connection protocol.
//!
//! Every message kind is a closed, tagged variant with a strongly-typed
//! payload; there are no ad hoc field-sniffed JSON shapes. Unknown kinds
//! decode to an explicit `Unknown` variant so a newer peer never breaks an
//! older one.

use serde::{Deserialize, Serialize};

// Hard limits enforced on untrusted payloads before they are applied. These
// are intentionally conservative: a small input must not be able to trigger
// an outsized allocation inside the worker.

/// Maximum UTF-8 byte length of an individual file's contents.
pub const MAX_FILE_TEXT_BYTES: usize = 8 * 1024 * 1024; // 8 MiB

/// Maximum number of files allowed in a single `RegisterProject` message.
pub const MAX_FILES_PER_MESSAGE: usize = 100_000;

/// Maximum UTF-8 byte length for small identifier strings (paths, ids, keys).
pub const MAX_SMALL_STRING_BYTES: usize = 16 * 1024; // 16 KiB

/// One file pushed across the boundary.
///
/// `content: None` registers the file as "known to exist but not loaded";
/// the engine requests its content on demand via [`EngineSignal::NeedsFile`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub content: Option<String>,
}

/// Host → engine mutation/switch messages.
///
/// Per engine connection these execute strictly in submission order; analysis
/// queries wait for the connection's queue to drain before running.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    RegisterProject {
        project_id: String,
        current_file: Option<String>,
        files: Vec<FileEntry>,
        extra_lib: String,
    },
    DisposeProject {
        project_id: String,
    },
    SetActiveProject {
        project_id: String,
    },
    WriteFile {
        project_id: String,
        path: String,
        content: String,
        /// Version after the write; 0 means "first seen".
        version: u64,
    },
    RemoveFile {
        project_id: String,
        path: String,
    },
    MkDir {
        project_id: String,
        path: String,
    },
    RmDir {
        project_id: String,
        path: String,
    },
    SetCurrentFile {
        project_id: String,
        path: Option<String>,
    },
    /// Includes an out-of-band file in the active compile set without
    /// changing the project's current file.
    MarkExtraCompileFile {
        project_id: String,
        key: String,
        path: String,
    },
    UnmarkExtraCompileFile {
        project_id: String,
        key: String,
    },
    #[serde(other)]
    Unknown,
}

/// Rejection for a message that violates the size limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OversizedMessage {
    pub what: &'static str,
    pub len: usize,
    pub max: usize,
}

impl std::fmt::Display for OversizedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} too large: {} > {}", self.what, self.len, self.max)
    }
}

impl std::error::Error for OversizedMessage {}

fn check(what: &'static str, len: usize, max: usize) -> Result<(), OversizedMessage> {
    if len > max {
        return Err(OversizedMessage { what, len, max });
    }
    Ok(())
}

fn check_small(what: &'static str, value: &str) -> Result<(), OversizedMessage> {
    check(what, value.len(), MAX_SMALL_STRING_BYTES)
}

impl HostMessage {
    pub fn project_id(&self) -> Option<&str> {
        match self {
            HostMessage::RegisterProject { project_id, .. }
            | HostMessage::DisposeProject { project_id }
            | HostMessage::SetActiveProject { project_id }
            | HostMessage::WriteFile { project_id, .. }
            | HostMessage::RemoveFile { project_id, .. }
            | HostMessage::MkDir { project_id, .. }
            | HostMessage::RmDir { project_id, .. }
            | HostMessage::SetCurrentFile { project_id, .. }
            | HostMessage::MarkExtraCompileFile { project_id, .. }
            | HostMessage::UnmarkExtraCompileFile { project_id, .. } => Some(project_id),
            HostMessage::Unknown => None,
        }
    }

    /// Checks the message against the size limits.
    pub fn validate(&self) -> Result<(), OversizedMessage> {
        if let Some(project_id) = self.project_id() {
            check_small("project id", project_id)?;
        }
        match self {
            HostMessage::RegisterProject { files, extra_lib, .. } => {
                check("file list", files.len(), MAX_FILES_PER_MESSAGE)?;
                check("extra lib", extra_lib.len(), MAX_FILE_TEXT_BYTES)?;
                for file in files {
                    check_small("path", &file.path)?;
                    if let Some(content) = &file.content {
                        check("file text", content.len(), MAX_FILE_TEXT_BYTES)?;
                    }
                }
            }
            HostMessage::WriteFile { path, content, .. } => {
                check_small("path", path)?;
                check("file text", content.len(), MAX_FILE_TEXT_BYTES)?;
            }
            HostMessage::RemoveFile { path, .. }
            | HostMessage::MkDir { path, .. }
            | HostMessage::RmDir { path, .. } => check_small("path", path)?,
            HostMessage::SetCurrentFile { path, .. } => {
                if let Some(path) = path {
                    check_small("path", path)?;
                }
            }
            HostMessage::MarkExtraCompileFile { key, path, .. } => {
                check_small("key", key)?;
                check_small("path", path)?;
            }
            HostMessage::UnmarkExtraCompileFile { key, .. } => check_small("key", key)?,
            HostMessage::DisposeProject { .. }
            | HostMessage::SetActiveProject { .. }
            | HostMessage::Unknown => {}
        }
        Ok(())
    }
}

/// Engine → host signals.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineSignal {
    /// The engine holds an "exists, not loaded" entry for `path` and needs
    /// its content before it can make progress on it.
    NeedsFile { project_id: String, path: String },
    #[serde(other)]
    Unknown,
}

/// Analysis queries forwarded to the engine.
///
/// Queries carry the path only; the engine resolves them against whichever
/// project is currently active, so callers switch with `SetActiveProject`
/// first when targeting a non-default project.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineQuery {
    Diagnostics { path: String },
    Completions { path: String, offset: usize },
    QuickInfo { path: String, offset: usize },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Suggestion,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub start: usize,
    pub length: usize,
    pub message: String,
    pub severity: DiagnosticSeverity,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub detail: Option<String>,
}

/// Replies to [`EngineQuery`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum QueryReply {
    Diagnostics(Vec<Diagnostic>),
    Completions(Vec<CompletionItem>),
    QuickInfo(Option<String>),
    #[serde(other)]
    Unknown,
}
