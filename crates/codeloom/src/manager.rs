use crate::backend::{CompletionBackend, GenerationRequest};
use crate::config::Config;
use crate::context::ContextEntry;
use crate::error::{LoomError, Result};
use crate::ledger::{ChangeRecord, LedgerRow};
use crate::session::{now_iso8601, PendingChange, Session, SessionState};
use crate::store::SessionStore;
use crate::vcs::{MergeOutcome, VersionControl};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The orchestrating state machine.
///
/// Owns the session aggregate and sequences every workflow transition:
/// it validates the current state, delegates to the version-control and
/// generation capabilities, and persists the full session after each
/// successful transition — so a crash between transitions leaves the
/// on-disk session consistent with the last completed one. Errors leave
/// both the session and the repository in their pre-operation state.
pub struct SessionManager<V: VersionControl, B: CompletionBackend> {
    repo_root: PathBuf,
    store: SessionStore,
    config: Config,
    vcs: V,
    backend: B,
    session: Session,
}

impl<V: VersionControl, B: CompletionBackend> SessionManager<V, B> {
    /// Restore the persisted session (or start fresh) and run structural
    /// detection against the current repository contents.
    pub fn new(
        repo_root: PathBuf,
        store: SessionStore,
        config: Config,
        vcs: V,
        backend: B,
    ) -> Result<Self> {
        let mut session = store.load_or_create()?;
        session
            .context
            .refresh_structural(&repo_root, &config.structural_patterns);
        Ok(SessionManager {
            repo_root,
            store,
            config,
            vcs,
            backend,
            session,
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn active_branch(&self) -> Option<&str> {
        self.session.active_branch.as_deref()
    }

    // ── Workflow transitions ─────────────────────────────────────────────

    /// idle → branched: create and switch to a new branch on a clean tree.
    pub fn create_branch(&mut self, name: &str) -> Result<()> {
        match self.session.state() {
            SessionState::Idle => {}
            SessionState::Branched | SessionState::Reviewing => {
                let branch = self
                    .session
                    .active_branch
                    .clone()
                    .ok_or(LoomError::NoActiveBranch)?;
                return Err(LoomError::SessionActive(branch));
            }
        }
        if !self.vcs.is_clean()? {
            return Err(LoomError::DirtyTree);
        }
        self.vcs.create_branch(name)?;
        debug!(branch = name, "created and switched branch");
        self.session.active_branch = Some(name.to_string());
        self.persist()
    }

    /// branched → reviewing: snapshot the context, call the backend, and
    /// stage the proposal as the pending change.
    ///
    /// The session stays `branched` for the whole backend round trip, so a
    /// failure or interrupt mid-generation leaves nothing to clean up.
    pub fn submit_prompt(&mut self, prompt: &str) -> Result<PendingChange> {
        let branch = match self.session.state() {
            SessionState::Idle => return Err(LoomError::NoActiveBranch),
            SessionState::Reviewing => return Err(LoomError::ChangePending),
            SessionState::Branched => self
                .session
                .active_branch
                .clone()
                .ok_or(LoomError::NoActiveBranch)?,
        };

        self.session
            .context
            .refresh_structural(&self.repo_root, &self.config.structural_patterns);
        let snapshot = self.session.context.snapshot(&self.repo_root)?;
        debug!(files = snapshot.len(), "submitting prompt to backend");

        let proposed = self.backend.generate(&GenerationRequest {
            prompt: prompt.to_string(),
            context: snapshot,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_request_bytes: self.config.max_request_bytes,
        })?;

        let files: Vec<String> = proposed.files.keys().cloned().collect();
        let record_id = self.session.ledger.record(&branch, prompt, &files);
        let pending = PendingChange {
            record_id,
            prompt: prompt.to_string(),
            files: proposed.files,
            notes: proposed.notes,
            created_at: now_iso8601(),
        };
        self.session.pending_change = Some(pending.clone());
        self.persist()?;
        Ok(pending)
    }

    /// Surface the pending change for inspection. No transition.
    pub fn review(&self) -> Result<&PendingChange> {
        self.session
            .pending_change
            .as_ref()
            .ok_or(LoomError::NoPendingChange)
    }

    /// reviewing → branched: apply the staged files atomically, commit,
    /// and attach the commit id to the ledger record. On failure the
    /// pending change is retained for another attempt.
    pub fn commit(&mut self, message: &str) -> Result<String> {
        let pending = self
            .session
            .pending_change
            .as_ref()
            .ok_or(LoomError::NoPendingChange)?;
        let commit_id = self.vcs.apply_and_commit(&pending.files, message)?;
        let record_id = pending.record_id.clone();
        self.session.ledger.attach_commit(&record_id, &commit_id)?;
        self.session.pending_change = None;
        debug!(commit = %commit_id, record = %record_id, "committed pending change");
        self.persist()?;
        Ok(commit_id)
    }

    /// reviewing → branched: discard the pending change without touching
    /// the working tree. Its ledger record stays, uncommitted, so prompt
    /// history remains complete for audit.
    pub fn rollback(&mut self) -> Result<()> {
        if self.session.pending_change.is_none() {
            return Err(LoomError::NoPendingChange);
        }
        self.session.pending_change = None;
        self.persist()
    }

    /// branched → branched: merge the active branch into the base branch.
    /// Stays on the original branch either way; a conflict aborts cleanly
    /// with both tips unchanged.
    pub fn merge(&mut self) -> Result<MergeOutcome> {
        let branch = match self.session.state() {
            SessionState::Idle => return Err(LoomError::NoActiveBranch),
            SessionState::Reviewing => return Err(LoomError::ChangePending),
            SessionState::Branched => self
                .session
                .active_branch
                .clone()
                .ok_or(LoomError::NoActiveBranch)?,
        };
        if !self.vcs.is_clean()? {
            return Err(LoomError::DirtyTree);
        }
        let base = self.vcs.default_branch()?;
        if base == branch {
            return Err(LoomError::Vcs(format!(
                "active branch '{branch}' is the base branch"
            )));
        }
        let outcome = self.vcs.merge(&branch, &base)?;
        debug!(from = %branch, into = %base, ?outcome, "merged");
        self.persist()?;
        Ok(outcome)
    }

    /// Undo the last commit on the active branch. The ledger is untouched:
    /// the record keeps its commit id as a trace of what was undone.
    pub fn uncommit(&mut self) -> Result<()> {
        match self.session.state() {
            SessionState::Idle => return Err(LoomError::NoActiveBranch),
            SessionState::Reviewing => return Err(LoomError::ChangePending),
            SessionState::Branched => {}
        }
        self.vcs.rollback_last()
    }

    // ── Context operations (allowed in every state) ──────────────────────

    pub fn add_context(&mut self, path: &str) -> Result<()> {
        self.session.context.add(&self.repo_root, path)?;
        self.persist()
    }

    pub fn rm_context(&mut self, path: &str) -> Result<()> {
        self.session.context.remove(path)?;
        self.persist()
    }

    pub fn clear_context(&mut self) -> Result<()> {
        self.session.context.clear();
        self.persist()
    }

    pub fn show_context(&mut self) -> Vec<ContextEntry> {
        self.session
            .context
            .refresh_structural(&self.repo_root, &self.config.structural_patterns);
        self.session.context.list().to_vec()
    }

    // ── Ledger queries ───────────────────────────────────────────────────

    /// History for `branch`, defaulting to the active branch.
    pub fn history(&self, branch: Option<&str>) -> Result<&[ChangeRecord]> {
        let branch = match branch {
            Some(b) => b,
            None => self.active_branch().ok_or(LoomError::NoActiveBranch)?,
        };
        Ok(self.session.ledger.history(branch))
    }

    /// Exportable documentation rows for `branch`, defaulting to the
    /// active branch.
    pub fn export_history(&self, branch: Option<&str>) -> Result<Vec<LedgerRow>> {
        let branch = match branch {
            Some(b) => b,
            None => self.active_branch().ok_or(LoomError::NoActiveBranch)?,
        };
        Ok(self.session.ledger.export(branch))
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.session)
    }
}
