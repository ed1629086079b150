//! Label-aware snapshot operations on top of one backend.
//!
//! A label is a "latest" slot: saving under a label replaces whatever was
//! saved under it before. The mapping file only adds names to backend
//! objects; the backend listing is always the source of truth, and mapping
//! entries whose object is gone are dropped on the next mutation.

use super::mapping::{Mapping, MappingStore};
use super::{SnapshotBackend, SnapshotError, SnapshotResult};
use crate::prompt::Prompt;
use crate::vcs::BranchSource;
use chrono::NaiveDateTime;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Width of the name column in selection menus.
const NAME_COLUMN: usize = 33;

/// A live backend object as seen by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub backend_id: String,
    pub label: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl SnapshotEntry {
    /// Label if there is one, raw backend id otherwise.
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.backend_id)
    }

    /// `name                              [2024-03-01 09:15:00]`
    pub fn menu_line(&self) -> String {
        let date = self
            .created_at
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".into());
        format!("{:<width$} [{}]", self.name(), date, width = NAME_COLUMN)
    }
}

pub struct SnapshotManager<'a> {
    backend: &'a dyn SnapshotBackend,
    mappings: MappingStore,
    branch: &'a dyn BranchSource,
}

impl<'a> SnapshotManager<'a> {
    pub fn new(
        backend: &'a dyn SnapshotBackend,
        mappings: MappingStore,
        branch: &'a dyn BranchSource,
    ) -> Self {
        Self {
            backend,
            mappings,
            branch,
        }
    }

    pub fn preflight(&self) -> SnapshotResult<()> {
        self.backend.preflight()
    }

    fn load_mapping(&self) -> SnapshotResult<Mapping> {
        self.mappings.load().map_err(SnapshotError::Mapping)
    }

    /// Rewrite the mapping after `mutate`, dropping entries not in `live`.
    fn commit_mapping<F>(&self, live: &BTreeSet<String>, mutate: F) -> SnapshotResult<()>
    where
        F: FnOnce(&mut Mapping),
    {
        self.mappings
            .update(|mapping| {
                mapping.retain(|id, _| live.contains(id));
                mutate(mapping);
            })
            .map_err(SnapshotError::Mapping)
    }

    fn live_ids(&self) -> SnapshotResult<BTreeSet<String>> {
        Ok(self.backend.list_snapshots()?.into_iter().collect())
    }

    /// Snapshot the live database under `label` (default: current branch).
    ///
    /// Any snapshot previously saved under the same label is deleted first.
    pub fn save(&self, label: Option<&str>) -> SnapshotResult<String> {
        let label = match label {
            Some(l) if !l.trim().is_empty() => l.trim().to_string(),
            _ => self
                .branch
                .current_branch()
                .map_err(SnapshotError::Backend)?,
        };

        let mapping = self.load_mapping()?;
        let mut live = self.live_ids()?;
        for (old_id, _) in mapping.iter().filter(|(_, l)| **l == label) {
            if live.remove(old_id) {
                info!(snapshot = %old_id, label = %label, "replacing snapshot with the same label");
                self.backend.delete(old_id)?;
            }
        }

        let id = self.backend.create(&label)?;
        self.commit_mapping(&live, |m| {
            m.retain(|_, l| *l != label);
            m.insert(id.clone(), label.clone());
        })?;
        info!(snapshot = %id, label = %label, "snapshot saved");
        Ok(id)
    }

    /// Live snapshots, newest first. Mapping entries without a live object
    /// are left out but not removed.
    pub fn list(&self) -> SnapshotResult<Vec<SnapshotEntry>> {
        let mapping = self.load_mapping()?;
        let mut entries: Vec<SnapshotEntry> = self
            .backend
            .list_snapshots()?
            .into_iter()
            .map(|id| SnapshotEntry {
                label: mapping.get(&id).cloned(),
                created_at: self.backend.created_at(&id),
                backend_id: id,
            })
            .collect();
        entries.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| a.backend_id.cmp(&b.backend_id))
        });
        Ok(entries)
    }

    /// Backend id for a live id or a label naming exactly one live snapshot.
    pub fn resolve(&self, label_or_id: &str) -> SnapshotResult<String> {
        let live = self.live_ids()?;
        if live.contains(label_or_id) {
            return Ok(label_or_id.to_string());
        }
        let mapping = self.load_mapping()?;
        let matches: Vec<&String> = mapping
            .iter()
            .filter(|(id, label)| *label == label_or_id && live.contains(*id))
            .map(|(id, _)| id)
            .collect();
        match matches.as_slice() {
            [id] => Ok((*id).clone()),
            [] => Err(SnapshotError::SnapshotNotFound(label_or_id.to_string())),
            many => Err(SnapshotError::SnapshotNotFound(format!(
                "{} is ambiguous ({} snapshots carry that label)",
                label_or_id,
                many.len()
            ))),
        }
    }

    /// Resolve `target`, or let the operator pick when none is given.
    pub fn resolve_or_choose(
        &self,
        target: Option<&str>,
        prompt: &dyn Prompt,
        question: &str,
    ) -> SnapshotResult<String> {
        if let Some(target) = target {
            return self.resolve(target);
        }
        if !prompt.is_attended() {
            return Err(SnapshotError::SnapshotNotFound(
                "no snapshot given and no operator to choose one".into(),
            ));
        }
        let entries = self.list()?;
        if entries.is_empty() {
            return Err(SnapshotError::SnapshotNotFound("no snapshots exist".into()));
        }
        let lines: Vec<String> = entries.iter().map(SnapshotEntry::menu_line).collect();
        prompt
            .choose(question, &lines)
            .and_then(|idx| entries.get(idx))
            .map(|e| e.backend_id.clone())
            .ok_or_else(|| SnapshotError::SnapshotNotFound("no snapshot selected".into()))
    }

    pub fn restore(&self, label_or_id: &str) -> SnapshotResult<String> {
        let id = self.resolve(label_or_id)?;
        self.backend.restore(&id)?;
        info!(snapshot = %id, "snapshot restored");
        Ok(id)
    }

    pub fn remove(&self, label_or_id: &str) -> SnapshotResult<String> {
        let id = self.resolve(label_or_id)?;
        let mut live = self.live_ids()?;
        self.backend.delete(&id)?;
        live.remove(&id);
        self.commit_mapping(&live, |_| {})?;
        info!(snapshot = %id, "snapshot removed");
        Ok(id)
    }

    /// Delete every live snapshot and empty the mapping.
    ///
    /// On a failed delete the mapping still forgets what was already deleted.
    pub fn remove_all(&self) -> SnapshotResult<Vec<String>> {
        let mut live = self.live_ids()?;
        let mut removed = Vec::new();
        for id in live.clone() {
            if let Err(e) = self.backend.delete(&id) {
                warn!(snapshot = %id, error = %e, "failed to remove snapshot");
                self.commit_mapping(&live, |_| {})?;
                return Err(e);
            }
            live.remove(&id);
            removed.push(id);
        }
        self.commit_mapping(&live, |_| {})?;
        Ok(removed)
    }
}
