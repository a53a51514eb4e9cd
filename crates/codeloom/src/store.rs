use crate::error::{LoomError, Result};
use crate::session::Session;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable storage for the session, as pretty JSON written atomically
/// (temp file + rename) so a crash never leaves a half-written state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        SessionStore { path }
    }

    /// The conventional location under a repository's git dir.
    pub fn in_git_dir(git_dir: &Path) -> Self {
        SessionStore::new(git_dir.join("codeloom").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session, or a fresh one on first run. A file that
    /// exists but cannot be read or parsed is a fatal error; it is never
    /// auto-repaired.
    pub fn load_or_create(&self) -> Result<Session> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no persisted session, starting fresh");
            return Ok(Session::new());
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| LoomError::StateCorrupt {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&data).map_err(|e| LoomError::StateCorrupt {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }

    /// Overwrite the persisted session atomically.
    pub fn save(&self, session: &Session) -> Result<()> {
        let dir = self
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&tmp, session)?;
        tmp.persist(&self.path).map_err(|e| LoomError::Io(e.error))?;
        Ok(())
    }

    /// Explicit recovery: delete the persisted session. Returns whether a
    /// file existed.
    pub fn delete(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
