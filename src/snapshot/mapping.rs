//! Persisted `backend_id → label` mapping.
//!
//! The file is YAML, human-readable, and rewritten in full on every mutation
//! (write to a sibling temp file, then rename). Concurrent writers are not
//! detected; snapshot commands must be serialised per environment.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub type Mapping = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current mapping; a missing or empty file is an empty mapping.
    pub fn load(&self) -> Result<Mapping> {
        if !self.path.exists() {
            return Ok(Mapping::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }
        Ok(serde_yaml::from_str::<Option<Mapping>>(&content)?.unwrap_or_default())
    }

    /// Replace the file with `mapping`.
    pub fn save(&self, mapping: &Mapping) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_yaml::to_string(mapping)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = mapping.len(), "saved snapshot mapping");
        Ok(())
    }

    /// Load, mutate, rewrite.
    pub fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut Mapping) -> T,
    {
        let mut mapping = self.load()?;
        let out = mutate(&mut mapping);
        self.save(&mapping)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path().join("run/snapshot_mappings.txt"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_update_creates_parent_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path().join("run/snapshot_mappings.txt"));
        store
            .update(|m| {
                m.insert("odoo_main_snapshot_2024-01-01T10:00:00".into(), "main".into());
            })
            .unwrap();

        let reloaded = MappingStore::new(store.path()).load().unwrap();
        assert_eq!(
            reloaded.get("odoo_main_snapshot_2024-01-01T10:00:00").map(String::as_str),
            Some("main")
        );
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_reads_plain_yaml_written_by_hand() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.txt");
        fs::write(&path, "vol@2024-01-01T10:00:00: release-1\n").unwrap();
        let mapping = MappingStore::new(&path).load().unwrap();
        assert_eq!(mapping["vol@2024-01-01T10:00:00"], "release-1");
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.txt");
        fs::write(&path, "- just\n- a list\n").unwrap();
        assert!(MappingStore::new(&path).load().is_err());
    }
}
