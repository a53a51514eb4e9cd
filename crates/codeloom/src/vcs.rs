use crate::error::Result;
use std::collections::BTreeMap;

/// How a merge landed on the base branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The base ref was fast-forwarded to the given commit.
    FastForward(String),
    /// A two-parent merge commit was created.
    Merged(String),
    /// The base branch already contained every commit from the source.
    UpToDate,
}

/// Capability interface over the version-control engine.
///
/// The session manager only sequences calls to an implementation and
/// interprets its errors; the operations themselves are assumed atomic with
/// respect to process crash. Production implementation lives in
/// `codeloom-git`; tests use a deterministic fake.
pub trait VersionControl {
    /// Create a branch from the current HEAD and switch to it.
    fn create_branch(&mut self, name: &str) -> Result<()>;

    /// Name of the currently checked-out branch.
    fn current_branch(&self) -> Result<String>;

    /// Whether tracked files carry no staged or unstaged modifications.
    /// Untracked files do not count.
    fn is_clean(&self) -> Result<bool>;

    /// Write every file, stage exactly those paths, and commit. All or
    /// nothing: a failure part-way must leave the working tree as it was
    /// and create no commit.
    fn apply_and_commit(&mut self, files: &BTreeMap<String, String>, message: &str)
    -> Result<String>;

    /// Hard-reset the current branch to its parent commit.
    fn rollback_last(&mut self) -> Result<()>;

    /// Merge `branch` into `into` without touching the working tree.
    /// Conflicts abort cleanly, leaving both tips unchanged.
    fn merge(&mut self, branch: &str, into: &str) -> Result<MergeOutcome>;

    /// The repository's base branch (first existing of the conventional
    /// default-branch names).
    fn default_branch(&self) -> Result<String>;
}
