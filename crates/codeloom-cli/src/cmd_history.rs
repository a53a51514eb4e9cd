use crate::workspace::Manager;
use anyhow::Result;

pub fn run(manager: &Manager, branch: Option<&str>, json: bool) -> Result<()> {
    let rows = manager.export_history(branch)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("(no changes recorded)");
        return Ok(());
    }
    for row in rows {
        let commit = row.commit_id.as_deref().unwrap_or("(uncommitted)");
        println!(
            "{} | {} | {} | {}",
            row.timestamp,
            row.prompt,
            row.files_touched.join(", "),
            commit
        );
    }
    Ok(())
}
