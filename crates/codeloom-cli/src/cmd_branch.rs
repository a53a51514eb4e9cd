use crate::workspace::Manager;
use anyhow::Result;
use codeloom::MergeOutcome;

pub fn new_branch(manager: &mut Manager, name: &str) -> Result<()> {
    manager.create_branch(name)?;
    println!("Switched to new branch '{name}'");
    Ok(())
}

pub fn merge(manager: &mut Manager) -> Result<()> {
    match manager.merge()? {
        MergeOutcome::FastForward(commit) => println!("Fast-forwarded base branch to {commit}"),
        MergeOutcome::Merged(commit) => println!("Created merge commit {commit}"),
        MergeOutcome::UpToDate => println!("Base branch already up to date"),
    }
    Ok(())
}

pub fn uncommit(manager: &mut Manager) -> Result<()> {
    manager.uncommit()?;
    println!("Removed the last commit from the active branch");
    Ok(())
}
