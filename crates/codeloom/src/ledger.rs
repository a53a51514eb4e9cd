use crate::error::{LoomError, Result};
use crate::session::now_iso8601;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable audit entry linking a prompt to the files it touched and,
/// once committed, a commit identifier. A record with no commit id is a
/// rolled-back or abandoned attempt, retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: String,
    pub timestamp: String,
    pub prompt: String,
    pub files_touched: Vec<String>,
    pub commit_id: Option<String>,
}

/// One exportable row per change, for an external renderer.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerRow {
    pub timestamp: String,
    pub prompt: String,
    pub files_touched: Vec<String>,
    pub commit_id: Option<String>,
}

/// Append-only record of changes, one ordered sequence per branch.
///
/// The only in-place mutation is attaching a commit id to a record, and
/// attaching twice is an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeLedger {
    branches: BTreeMap<String, Vec<ChangeRecord>>,

    #[serde(default)]
    next_record: u64,
}

impl ChangeLedger {
    /// Append a new record for `branch` and return its id.
    pub fn record(&mut self, branch: &str, prompt: &str, files: &[String]) -> String {
        self.next_record += 1;
        let id = format!("chg-{:03}", self.next_record);
        let mut files_touched = files.to_vec();
        files_touched.sort();
        files_touched.dedup();
        self.branches
            .entry(branch.to_string())
            .or_default()
            .push(ChangeRecord {
                id: id.clone(),
                timestamp: now_iso8601(),
                prompt: prompt.to_string(),
                files_touched,
                commit_id: None,
            });
        id
    }

    /// Fill in the commit id of a record after a successful commit.
    pub fn attach_commit(&mut self, record_id: &str, commit_id: &str) -> Result<()> {
        let record = self
            .branches
            .values_mut()
            .flatten()
            .find(|r| r.id == record_id)
            .ok_or_else(|| LoomError::NotFound(format!("record: {record_id}")))?;
        if record.commit_id.is_some() {
            return Err(LoomError::NotFound(format!(
                "record {record_id} already has a commit attached"
            )));
        }
        record.commit_id = Some(commit_id.to_string());
        Ok(())
    }

    /// Ordered records for a branch; empty if the branch has no history.
    pub fn history(&self, branch: &str) -> &[ChangeRecord] {
        self.branches.get(branch).map_or(&[], Vec::as_slice)
    }

    /// Table rows for a branch, for the documentation renderer.
    pub fn export(&self, branch: &str) -> Vec<LedgerRow> {
        self.history(branch)
            .iter()
            .map(|r| LedgerRow {
                timestamp: r.timestamp.clone(),
                prompt: r.prompt.clone(),
                files_touched: r.files_touched.clone(),
                commit_id: r.commit_id.clone(),
            })
            .collect()
    }
}
