use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoomError>;

/// Errors surfaced by the session workflow.
///
/// Everything here is recoverable at the session level except
/// [`LoomError::StateCorrupt`] and [`LoomError::Config`], which are fatal at
/// startup and require explicit operator recovery.
#[derive(Debug, Error)]
pub enum LoomError {
    #[error("working tree has uncommitted changes; commit or stash them first")]
    DirtyTree,

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("context too large: {size} bytes (limit {limit})")]
    ContextTooLarge { size: usize, limit: usize },

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("could not parse backend response: {0}")]
    ResponseParse(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("merge conflict in: {}", paths.join(", "))]
    MergeConflict { paths: Vec<String> },

    #[error("no pending change; submit a prompt first")]
    NoPendingChange,

    #[error("a pending change is awaiting review; commit or rollback first")]
    ChangePending,

    #[error("no active branch; create one with new-branch")]
    NoActiveBranch,

    #[error("a branch is already active: {0}")]
    SessionActive(String),

    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("session state unreadable at {}: {detail}", path.display())]
    StateCorrupt { path: PathBuf, detail: String },

    #[error("invalid configuration field '{field}': {detail}")]
    Config { field: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("version control error: {0}")]
    Vcs(String),
}
