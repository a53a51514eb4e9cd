use crate::workspace::Manager;
use anyhow::Result;

pub fn add(manager: &mut Manager, path: &str) -> Result<()> {
    manager.add_context(path)?;
    println!("Added {path} to context");
    Ok(())
}

pub fn remove(manager: &mut Manager, path: &str) -> Result<()> {
    manager.rm_context(path)?;
    println!("Removed {path} from context");
    Ok(())
}

pub fn clear(manager: &mut Manager) -> Result<()> {
    manager.clear_context()?;
    println!("Context cleared");
    Ok(())
}

pub fn show(manager: &mut Manager, json: bool) -> Result<()> {
    let entries = manager.show_context();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for entry in entries {
        if entry.structural {
            println!("{} (structural)", entry.path);
        } else {
            println!("{}", entry.path);
        }
    }
    Ok(())
}
