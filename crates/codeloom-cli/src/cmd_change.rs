use crate::workspace::Manager;
use anyhow::Result;
use similar::TextDiff;

pub fn prompt(manager: &mut Manager, text: &str) -> Result<()> {
    let pending = manager.submit_prompt(text)?;
    if let Some(notes) = &pending.notes {
        println!("{notes}\n");
    }
    println!(
        "Staged {} file(s) for review ({}):",
        pending.files.len(),
        pending.record_id
    );
    for path in pending.files.keys() {
        println!("  {path}");
    }
    println!("\nRun 'loom review' to inspect, then 'loom commit <message>' or 'loom rollback'.");
    Ok(())
}

pub fn review(manager: &Manager) -> Result<()> {
    let pending = manager.review()?;
    println!("Pending change {} ({}):", pending.record_id, pending.created_at);
    println!("Prompt: {}\n", pending.prompt);
    if let Some(notes) = &pending.notes {
        println!("{notes}\n");
    }
    for (path, proposed) in &pending.files {
        let current = std::fs::read_to_string(manager.repo_root().join(path)).unwrap_or_default();
        let diff = TextDiff::from_lines(&current, proposed);
        let unified = diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{path}"), &format!("b/{path}"))
            .to_string();
        if unified.is_empty() {
            println!("{path}: no changes");
        } else {
            println!("{unified}");
        }
    }
    Ok(())
}

pub fn commit(manager: &mut Manager, message: &str) -> Result<()> {
    let commit_id = manager.commit(message)?;
    println!("Committed {commit_id}");
    Ok(())
}

pub fn rollback(manager: &mut Manager) -> Result<()> {
    manager.rollback()?;
    println!("Discarded the pending change; the working tree was not touched");
    Ok(())
}
