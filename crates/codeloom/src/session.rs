use crate::context::ContextStore;
use crate::ledger::ChangeLedger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) fn now_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// A proposed but not-yet-committed set of file edits awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChange {
    /// The ledger record created when this change was staged.
    pub record_id: String,

    pub prompt: String,

    /// Path → full replacement content.
    pub files: BTreeMap<String, String>,

    /// Model explanation preceding the first file section, if any.
    pub notes: Option<String>,

    pub created_at: String,
}

/// Workflow state, derived from session contents rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No active branch.
    Idle,
    /// Active branch set, no pending change.
    Branched,
    /// A pending change awaits the operator's commit-or-rollback decision.
    Reviewing,
}

/// The root aggregate: one session per repository, persisted after every
/// successful transition and restored at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub active_branch: Option<String>,
    pub context: ContextStore,
    pub pending_change: Option<PendingChange>,
    pub ledger: ChangeLedger,
    pub created_at: String,
}

impl Session {
    pub fn new() -> Self {
        Session {
            active_branch: None,
            context: ContextStore::default(),
            pending_change: None,
            ledger: ChangeLedger::default(),
            created_at: now_iso8601(),
        }
    }

    /// A pending change implies an active branch, so `Reviewing` wins.
    pub fn state(&self) -> SessionState {
        if self.pending_change.is_some() {
            SessionState::Reviewing
        } else if self.active_branch.is_some() {
            SessionState::Branched
        } else {
            SessionState::Idle
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso8601_format() {
        let ts = now_iso8601();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
        assert_eq!(ts.len(), 20);
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.context.is_empty());
    }

    #[test]
    fn test_state_derivation() {
        let mut session = Session::new();
        session.active_branch = Some("feat/x".to_string());
        assert_eq!(session.state(), SessionState::Branched);

        session.pending_change = Some(PendingChange {
            record_id: "chg-001".to_string(),
            prompt: "p".to_string(),
            files: BTreeMap::new(),
            notes: None,
            created_at: now_iso8601(),
        });
        assert_eq!(session.state(), SessionState::Reviewing);

        session.pending_change = None;
        assert_eq!(session.state(), SessionState::Branched);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut session = Session::new();
        session.active_branch = Some("feat/x".to_string());
        session.ledger.record("feat/x", "p", &["a.py".to_string()]);
        session.pending_change = Some(PendingChange {
            record_id: "chg-001".to_string(),
            prompt: "p".to_string(),
            files: BTreeMap::from([("a.py".to_string(), "new\n".to_string())]),
            notes: Some("explanation".to_string()),
            created_at: now_iso8601(),
        });

        let json = serde_json::to_string_pretty(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state(), SessionState::Reviewing);
        assert_eq!(back.active_branch.as_deref(), Some("feat/x"));
        assert_eq!(back.pending_change.unwrap().files["a.py"], "new\n");
        assert_eq!(back.ledger.history("feat/x").len(), 1);
    }
}
