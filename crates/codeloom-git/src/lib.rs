//! git2-backed implementation of codeloom's [`VersionControl`] capability.
//!
//! All mutations go through libgit2 directly; nothing shells out. Merges are
//! performed at the ref level with an in-memory index, so the working tree is
//! never touched and a conflicted merge aborts with both branch tips exactly
//! where they were.

use codeloom::error::{LoomError, Result};
use codeloom::vcs::{MergeOutcome, VersionControl};
use git2::build::CheckoutBuilder;
use git2::{BranchType, Repository, ResetType, StatusOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_BRANCH_NAMES: &[&str] = &["main", "master", "trunk", "develop"];

/// A git repository driven through the session workflow.
pub struct GitWorkflow {
    repo: Repository,
    workdir: PathBuf,
}

impl GitWorkflow {
    /// Open the repository containing `path` (walks up like `git` does).
    /// Bare repositories are rejected: the workflow writes files.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).map_err(vcs_err)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| LoomError::Vcs("bare repository has no working tree".to_string()))?
            .to_path_buf();
        Ok(GitWorkflow { repo, workdir })
    }

    /// The repository's `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// The repository's working-tree root.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn head_commit(&self) -> Result<git2::Commit<'_>> {
        self.repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(vcs_err)
    }

    fn branch_tip(&self, name: &str) -> Result<git2::Commit<'_>> {
        self.repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| LoomError::NotFound(format!("branch '{name}'")))?
            .get()
            .peel_to_commit()
            .map_err(vcs_err)
    }

    /// Restore paths written by a partially-failed apply: put back the prior
    /// content, or remove files that did not exist before.
    fn restore(&self, saved: &[(PathBuf, Option<String>)]) {
        for (full, prior) in saved {
            let result = match prior {
                Some(content) => std::fs::write(full, content),
                None => std::fs::remove_file(full),
            };
            if let Err(e) = result {
                debug!(path = %full.display(), error = %e, "failed to restore file");
            }
        }
    }
}

impl VersionControl for GitWorkflow {
    fn create_branch(&mut self, name: &str) -> Result<()> {
        if self.repo.find_branch(name, BranchType::Local).is_ok() {
            return Err(LoomError::BranchExists(name.to_string()));
        }
        let head = self.head_commit()?;
        self.repo.branch(name, &head, false).map_err(vcs_err)?;
        self.repo
            .set_head(&format!("refs/heads/{name}"))
            .map_err(vcs_err)?;
        // The new branch points at the same commit, so checkout is a no-op
        // for file content; it only updates HEAD metadata.
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().safe()))
            .map_err(vcs_err)?;
        debug!(branch = name, "created branch from HEAD");
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().map_err(vcs_err)?;
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| LoomError::Vcs("HEAD is not on a branch".to_string()))
    }

    fn is_clean(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts)).map_err(vcs_err)?;
        Ok(statuses.is_empty())
    }

    fn apply_and_commit(
        &mut self,
        files: &BTreeMap<String, String>,
        message: &str,
    ) -> Result<String> {
        if files.is_empty() {
            return Err(LoomError::Commit("no files to apply".to_string()));
        }

        // Write files, remembering prior content so a failure part-way can
        // put the working tree back exactly as it was.
        let mut saved: Vec<(PathBuf, Option<String>)> = Vec::new();
        for (rel, content) in files {
            let full = self.workdir.join(rel);
            let prior = std::fs::read_to_string(&full).ok();
            let written = full
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|()| std::fs::write(&full, content));
            if let Err(e) = written {
                self.restore(&saved);
                return Err(LoomError::Commit(format!(
                    "failed to write {rel}: {e}"
                )));
            }
            saved.push((full, prior));
        }

        let commit = (|| -> Result<String> {
            let mut index = self.repo.index().map_err(vcs_err)?;
            for rel in files.keys() {
                index.add_path(Path::new(rel)).map_err(vcs_err)?;
            }
            index.write().map_err(vcs_err)?;
            let tree_id = index.write_tree().map_err(vcs_err)?;

            let head = self.head_commit()?;
            if tree_id == head.tree_id() {
                return Err(LoomError::Commit("nothing to commit".to_string()));
            }

            let tree = self.repo.find_tree(tree_id).map_err(vcs_err)?;
            let sig = self.repo.signature().map_err(vcs_err)?;
            let oid = self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head])
                .map_err(vcs_err)?;
            Ok(oid.to_string())
        })();

        match commit {
            Ok(oid) => {
                debug!(commit = %oid, files = files.len(), "applied and committed");
                Ok(oid)
            }
            Err(e) => {
                self.restore(&saved);
                // Put the index back to HEAD so staged paths do not linger.
                if let Ok(mut index) = self.repo.index()
                    && let Ok(head) = self.head_commit()
                    && let Ok(tree) = head.tree()
                {
                    let _ = index.read_tree(&tree);
                    let _ = index.write();
                }
                Err(e)
            }
        }
    }

    fn rollback_last(&mut self) -> Result<()> {
        let head = self.head_commit()?;
        if head.parent_count() == 0 {
            return Err(LoomError::Vcs(
                "cannot roll back the root commit".to_string(),
            ));
        }
        let parent = head.parent(0).map_err(vcs_err)?;
        debug!(from = %head.id(), to = %parent.id(), "rolling back last commit");
        self.repo
            .reset(parent.as_object(), ResetType::Hard, None)
            .map_err(vcs_err)
    }

    fn merge(&mut self, branch: &str, into: &str) -> Result<MergeOutcome> {
        let source = self.branch_tip(branch)?;
        let target = self.branch_tip(into)?;

        let base = self
            .repo
            .merge_base(source.id(), target.id())
            .map_err(vcs_err)?;

        if base == source.id() {
            return Ok(MergeOutcome::UpToDate);
        }
        if base == target.id() {
            // Target has not moved since the branch point; advance the ref.
            let mut reference = self
                .repo
                .find_reference(&format!("refs/heads/{into}"))
                .map_err(vcs_err)?;
            reference
                .set_target(
                    source.id(),
                    &format!("merge {branch}: fast-forward"),
                )
                .map_err(vcs_err)?;
            debug!(from = branch, into, commit = %source.id(), "fast-forwarded");
            return Ok(MergeOutcome::FastForward(source.id().to_string()));
        }

        let mut index = self
            .repo
            .merge_commits(&target, &source, None)
            .map_err(vcs_err)?;
        if index.has_conflicts() {
            let mut paths: Vec<String> = index
                .conflicts()
                .map_err(vcs_err)?
                .filter_map(|c| c.ok())
                .filter_map(|c| {
                    c.our
                        .or(c.their)
                        .or(c.ancestor)
                        .map(|e| String::from_utf8_lossy(&e.path).into_owned())
                })
                .collect();
            paths.sort();
            paths.dedup();
            return Err(LoomError::MergeConflict { paths });
        }

        let tree_id = index.write_tree_to(&self.repo).map_err(vcs_err)?;
        let tree = self.repo.find_tree(tree_id).map_err(vcs_err)?;
        let sig = self.repo.signature().map_err(vcs_err)?;
        let oid = self
            .repo
            .commit(
                Some(&format!("refs/heads/{into}")),
                &sig,
                &sig,
                &format!("Merge branch '{branch}' into '{into}'"),
                &tree,
                &[&target, &source],
            )
            .map_err(vcs_err)?;
        debug!(from = branch, into, commit = %oid, "created merge commit");
        Ok(MergeOutcome::Merged(oid.to_string()))
    }

    fn default_branch(&self) -> Result<String> {
        for name in DEFAULT_BRANCH_NAMES {
            if self.repo.find_branch(name, BranchType::Local).is_ok() {
                return Ok(name.to_string());
            }
        }
        Err(LoomError::Vcs(format!(
            "no base branch found (looked for {})",
            DEFAULT_BRANCH_NAMES.join(", ")
        )))
    }
}

fn vcs_err(e: git2::Error) -> LoomError {
    LoomError::Vcs(e.message().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_temp_repo() -> (tempfile::TempDir, GitWorkflow) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        drop(repo);

        let wf = GitWorkflow::open(dir.path()).unwrap();
        (dir, wf)
    }

    fn create_commit(repo: &Repository, message: &str, file_name: &str, content: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        let file_path = repo.workdir().unwrap().join(file_name);
        std::fs::write(&file_path, content).unwrap();
        index.add_path(Path::new(file_name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = repo.signature().unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    fn checkout(repo: &Repository, name: &str) {
        repo.set_head(&format!("refs/heads/{name}")).unwrap();
        repo.checkout_head(Some(CheckoutBuilder::new().force()))
            .unwrap();
    }

    // ── branches ───────────────────────────────────────────────────────

    #[test]
    fn test_create_branch_and_switch() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "hello");

        wf.create_branch("feat/x").unwrap();
        assert_eq!(wf.current_branch().unwrap(), "feat/x");
    }

    #[test]
    fn test_create_branch_collision() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "hello");
        wf.create_branch("feat/x").unwrap();

        let err = wf.create_branch("feat/x").unwrap_err();
        match err {
            LoomError::BranchExists(name) => assert_eq!(name, "feat/x"),
            other => panic!("expected BranchExists, got {other:?}"),
        }
        assert_eq!(wf.current_branch().unwrap(), "feat/x");
    }

    #[test]
    fn test_default_branch_after_init() {
        let (_dir, wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "hello");
        let name = wf.default_branch().unwrap();
        assert!(name == "main" || name == "master");
    }

    // ── cleanliness ────────────────────────────────────────────────────

    #[test]
    fn test_clean_after_commit() {
        let (_dir, wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "hello");
        assert!(wf.is_clean().unwrap());
    }

    #[test]
    fn test_modified_tracked_file_is_dirty() {
        let (dir, wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "hello");
        std::fs::write(dir.path().join("file.txt"), "edited").unwrap();
        assert!(!wf.is_clean().unwrap());
    }

    #[test]
    fn test_untracked_file_does_not_dirty() {
        let (dir, wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "hello");
        std::fs::write(dir.path().join("scratch.txt"), "notes").unwrap();
        assert!(wf.is_clean().unwrap());
    }

    // ── apply_and_commit ───────────────────────────────────────────────

    #[test]
    fn test_apply_and_commit_writes_stages_commits() {
        let (dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "v1\n");

        let files = BTreeMap::from([
            ("file.txt".to_string(), "v2\n".to_string()),
            ("sub/new.txt".to_string(), "fresh\n".to_string()),
        ]);
        let oid = wf.apply_and_commit(&files, "apply change").unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("file.txt")).unwrap(),
            "v2\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/new.txt")).unwrap(),
            "fresh\n"
        );
        assert!(wf.is_clean().unwrap());

        let head = wf.head_commit().unwrap();
        assert_eq!(head.id().to_string(), oid);
        assert_eq!(head.message(), Some("apply change"));
        assert_eq!(head.parent_count(), 1);
    }

    #[test]
    fn test_apply_identical_content_nothing_to_commit() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "same\n");
        let before = wf.head_commit().unwrap().id();

        let files = BTreeMap::from([("file.txt".to_string(), "same\n".to_string())]);
        let err = wf.apply_and_commit(&files, "no-op").unwrap_err();
        assert!(matches!(err, LoomError::Commit(_)));
        assert_eq!(wf.head_commit().unwrap().id(), before);
        assert!(wf.is_clean().unwrap());
    }

    #[test]
    fn test_apply_empty_set_rejected() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "x\n");
        let err = wf.apply_and_commit(&BTreeMap::new(), "msg").unwrap_err();
        assert!(matches!(err, LoomError::Commit(_)));
    }

    #[test]
    fn test_failed_apply_restores_working_tree() {
        let (dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "a.txt", "original\n");
        let before = wf.head_commit().unwrap().id();

        // "blocked" is a directory, so writing a file at that path fails
        // after a.txt has already been rewritten.
        std::fs::create_dir(dir.path().join("blocked")).unwrap();
        let files = BTreeMap::from([
            ("a.txt".to_string(), "overwritten\n".to_string()),
            ("blocked".to_string(), "cannot land\n".to_string()),
        ]);

        let err = wf.apply_and_commit(&files, "partial").unwrap_err();
        assert!(matches!(err, LoomError::Commit(_)));

        // a.txt was put back and no commit was created.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "original\n"
        );
        assert_eq!(wf.head_commit().unwrap().id(), before);
        assert!(wf.is_clean().unwrap());
    }

    // ── rollback ───────────────────────────────────────────────────────

    #[test]
    fn test_rollback_last_resets_to_parent() {
        let (dir, mut wf) = init_temp_repo();
        let first = create_commit(&wf.repo, "first", "file.txt", "v1\n");
        create_commit(&wf.repo, "second", "file.txt", "v2\n");

        wf.rollback_last().unwrap();
        assert_eq!(wf.head_commit().unwrap().id(), first);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("file.txt")).unwrap(),
            "v1\n"
        );
    }

    #[test]
    fn test_rollback_root_commit_rejected() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "only", "file.txt", "v1\n");
        let err = wf.rollback_last().unwrap_err();
        assert!(matches!(err, LoomError::Vcs(_)));
    }

    // ── merge ──────────────────────────────────────────────────────────

    #[test]
    fn test_merge_fast_forward() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "v1\n");
        let base = wf.default_branch().unwrap();

        wf.create_branch("feat/x").unwrap();
        let tip = create_commit(&wf.repo, "on branch", "file.txt", "v2\n");

        let outcome = wf.merge("feat/x", &base).unwrap();
        assert_eq!(outcome, MergeOutcome::FastForward(tip.to_string()));
        assert_eq!(wf.branch_tip(&base).unwrap().id(), tip);
        // Still on the feature branch.
        assert_eq!(wf.current_branch().unwrap(), "feat/x");
    }

    #[test]
    fn test_merge_up_to_date() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "v1\n");
        let base = wf.default_branch().unwrap();
        wf.create_branch("feat/x").unwrap();

        // No commits on the branch; base already contains its tip.
        let outcome = wf.merge("feat/x", &base).unwrap();
        assert_eq!(outcome, MergeOutcome::UpToDate);
    }

    #[test]
    fn test_merge_diverged_creates_merge_commit() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "shared.txt", "base\n");
        let base = wf.default_branch().unwrap();

        wf.create_branch("feat/x").unwrap();
        create_commit(&wf.repo, "branch work", "branch.txt", "b\n");

        checkout(&wf.repo, &base);
        create_commit(&wf.repo, "base work", "base.txt", "m\n");
        checkout(&wf.repo, "feat/x");

        let outcome = wf.merge("feat/x", &base).unwrap();
        let MergeOutcome::Merged(oid) = outcome else {
            panic!("expected Merged, got {outcome:?}");
        };

        let merge = wf
            .repo
            .find_commit(git2::Oid::from_str(&oid).unwrap())
            .unwrap();
        assert_eq!(merge.parent_count(), 2);
        assert_eq!(wf.branch_tip(&base).unwrap().id(), merge.id());
        assert_eq!(wf.current_branch().unwrap(), "feat/x");
    }

    #[test]
    fn test_merge_conflict_aborts_with_paths() {
        let (dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "shared.txt", "base\n");
        let base = wf.default_branch().unwrap();

        wf.create_branch("feat/x").unwrap();
        let branch_tip = create_commit(&wf.repo, "branch edit", "shared.txt", "branch version\n");

        checkout(&wf.repo, &base);
        let base_tip = create_commit(&wf.repo, "base edit", "shared.txt", "base version\n");
        checkout(&wf.repo, "feat/x");

        let err = wf.merge("feat/x", &base).unwrap_err();
        match err {
            LoomError::MergeConflict { paths } => assert_eq!(paths, vec!["shared.txt"]),
            other => panic!("expected MergeConflict, got {other:?}"),
        }

        // Both tips and the working tree are untouched.
        assert_eq!(wf.branch_tip(&base).unwrap().id(), base_tip);
        assert_eq!(wf.branch_tip("feat/x").unwrap().id(), branch_tip);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("shared.txt")).unwrap(),
            "branch version\n"
        );
        assert!(wf.is_clean().unwrap());
    }

    #[test]
    fn test_merge_unknown_branch() {
        let (_dir, mut wf) = init_temp_repo();
        create_commit(&wf.repo, "initial", "file.txt", "x\n");
        let base = wf.default_branch().unwrap();
        let err = wf.merge("ghost", &base).unwrap_err();
        assert!(matches!(err, LoomError::NotFound(_)));
    }
}
