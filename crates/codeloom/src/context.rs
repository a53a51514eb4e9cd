use crate::error::{LoomError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// A file path in scope for generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Repository-relative path, forward slashes.
    pub path: String,

    /// Auto-detected manifest file, as opposed to operator-added.
    pub structural: bool,
}

/// The set of file paths whose content is included in a generation request.
///
/// Insertion order is preserved for display. Structural entries are detected
/// by filename pattern and refreshed automatically; an explicit operator
/// removal tombstones the path so refresh never re-adds it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextStore {
    entries: Vec<ContextEntry>,

    #[serde(default)]
    tombstones: BTreeSet<String>,
}

impl ContextStore {
    /// Add an operator entry. No-op if the path is already in context;
    /// error if it does not exist under the repository root.
    pub fn add(&mut self, repo_root: &Path, path: &str) -> Result<()> {
        let rel = normalize(path);
        if !repo_root.join(&rel).is_file() {
            return Err(LoomError::NotFound(rel));
        }
        // Adding an explicitly removed path lifts the tombstone.
        self.tombstones.remove(&rel);
        if self.entries.iter().any(|e| e.path == rel) {
            return Ok(());
        }
        self.entries.push(ContextEntry {
            path: rel,
            structural: false,
        });
        Ok(())
    }

    /// Remove an entry. Removing a structural entry tombstones it so
    /// automatic refresh never brings it back.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let rel = normalize(path);
        let Some(idx) = self.entries.iter().position(|e| e.path == rel) else {
            return Err(LoomError::NotFound(format!("not in context: {rel}")));
        };
        let entry = self.entries.remove(idx);
        if entry.structural {
            self.tombstones.insert(entry.path);
        }
        Ok(())
    }

    /// Empty the context. Current structural entries are tombstoned, since
    /// clearing is an explicit removal.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            if entry.structural {
                self.tombstones.insert(entry.path);
            }
        }
    }

    pub fn list(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scan the repository root for structural manifest files and add any
    /// that are neither present nor tombstoned.
    pub fn refresh_structural(&mut self, repo_root: &Path, patterns: &[String]) {
        let mut found = Vec::new();
        scan(repo_root, repo_root, patterns, &mut found);
        found.sort();
        for rel in found {
            if self.tombstones.contains(&rel) || self.entries.iter().any(|e| e.path == rel) {
                continue;
            }
            debug!(path = %rel, "detected structural file");
            self.entries.push(ContextEntry {
                path: rel,
                structural: true,
            });
        }
    }

    /// Read the current on-disk content of every entry. Not cached: the
    /// snapshot always reflects the latest edits. A file that has vanished
    /// or cannot be read fails the whole snapshot, naming the path.
    pub fn snapshot(&self, repo_root: &Path) -> Result<Vec<(String, String)>> {
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let full = repo_root.join(&entry.path);
            let content = std::fs::read_to_string(&full).map_err(|e| LoomError::Unreadable {
                path: full.clone(),
                source: e,
            })?;
            out.push((entry.path.clone(), content));
        }
        Ok(out)
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}

fn scan(dir: &Path, root: &Path, patterns: &[String], found: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if path.is_dir() {
            if name == ".git" {
                continue;
            }
            scan(&path, root, patterns, found);
        } else if patterns.iter().any(|p| name.to_string_lossy() == *p)
            && let Ok(rel) = path.strip_prefix(root)
        {
            found.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
}
