//! Session engine for prompt-driven code changes on isolated git branches.
//!
//! The pieces: a [`ContextStore`] tracking which files are in scope, a
//! [`ChangeLedger`] recording every prompt per branch, a [`CompletionBackend`]
//! capability for text generation, a [`VersionControl`] capability for the
//! repository, and a [`SessionManager`] that sequences them through the
//! idle → branched → reviewing workflow and persists the session via a
//! [`SessionStore`] after every successful transition.
//!
//! Production capability implementations live in the `codeloom-git` and
//! `codeloom-ollama` crates; this crate is pure logic plus its own state
//! persistence.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod session;
pub mod store;
pub mod vcs;

pub use backend::{CompletionBackend, GenerationRequest, ProposedChange};
pub use config::Config;
pub use context::{ContextEntry, ContextStore};
pub use error::{LoomError, Result};
pub use ledger::{ChangeLedger, ChangeRecord, LedgerRow};
pub use manager::SessionManager;
pub use session::{PendingChange, Session, SessionState};
pub use store::SessionStore;
pub use vcs::{MergeOutcome, VersionControl};
