use anyhow::{Context, Result};
use codeloom::{Config, SessionManager, SessionStore};
use codeloom_git::GitWorkflow;
use codeloom_ollama::OllamaBackend;
use std::path::Path;

pub type Manager = SessionManager<GitWorkflow, OllamaBackend>;

/// Open the repository containing `repo` and assemble the session manager
/// with its on-disk config and state, both under `<git-dir>/codeloom/`.
pub fn open(repo: &Path, host: &str) -> Result<Manager> {
    let vcs = GitWorkflow::open(repo)
        .with_context(|| format!("failed to open a git repository at {}", repo.display()))?;
    let git_dir = vcs.git_dir().to_path_buf();
    let repo_root = vcs.workdir().to_path_buf();

    let config = Config::load(&git_dir.join("codeloom").join("config.json"))
        .context("failed to load configuration")?;
    let store = SessionStore::in_git_dir(&git_dir);
    let backend = OllamaBackend::new(host);

    let manager = SessionManager::new(repo_root, store, config, vcs, backend)
        .context("failed to restore the session")?;
    Ok(manager)
}

/// Delete the persisted session state. Deliberately avoids loading the
/// session, so it works even when the session file is corrupt.
pub fn reset(repo: &Path, force: bool) -> Result<()> {
    if !force {
        anyhow::bail!("reset deletes all session state; pass --force to confirm");
    }
    let vcs = GitWorkflow::open(repo)
        .with_context(|| format!("failed to open a git repository at {}", repo.display()))?;
    let store = SessionStore::in_git_dir(vcs.git_dir());
    if store.delete().context("failed to delete session state")? {
        println!("Deleted session state at {}", store.path().display());
    } else {
        println!("No session state to delete");
    }
    Ok(())
}
