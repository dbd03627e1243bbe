use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Durable `mailbox name → fingerprint` map: one flat JSON object on disk.
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable file is an empty map, never fatal: worst case
    /// the next poll pass re-seeds and the warm-up cycle stays quiet.
    pub fn load(&self) -> HashMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        target: "state",
                        error = %err,
                        path = %self.path.display(),
                        "could not read seen-state file; starting empty"
                    );
                }
                return HashMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(
                    target: "state",
                    error = %err,
                    path = %self.path.display(),
                    "seen-state file is corrupt; starting empty"
                );
                HashMap::new()
            }
        }
    }

    /// Atomic from a reader's perspective: writes a sibling temp file and
    /// renames it over the target, so a crash mid-save leaves the previous
    /// file intact.
    pub fn save(&self, seen: &HashMap<String, String>) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut file = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        serde_json::to_writer_pretty(&mut file, seen).context("failed to encode seen state")?;
        file.flush()?;
        file.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("seen.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("seen.json"));

        let mut seen = HashMap::new();
        seen.insert("a@x.com".to_string(), "ab".repeat(32));
        seen.insert("b@x.com".to_string(), "cd".repeat(32));
        store.save(&seen).unwrap();

        assert_eq!(store.load(), seen);
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::new(dir.path().join("seen.json"));

        let mut seen = HashMap::new();
        seen.insert("a@x.com".to_string(), "11".repeat(32));
        store.save(&seen).unwrap();

        seen.insert("a@x.com".to_string(), "22".repeat(32));
        store.save(&seen).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.get("a@x.com"), Some(&"22".repeat(32)));
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "{not json").unwrap();
        let store = SeenStore::new(path);
        assert!(store.load().is_empty());
    }
}
