//! Snapshot manager behaviour over an in-memory backend, plus the plain-copy
//! backend end to end against a recorded `psql`/`createdb`/`dropdb` session.

use chrono::NaiveDateTime;
use stackctl::command_args::CommandLine;
use stackctl::commands::postgres::PgConnection;
use stackctl::error::Result;
use stackctl::process_runner::{ProcessOutput, ProcessRunner};
use stackctl::prompt::{NonInteractive, Prompt};
use stackctl::snapshot::plain::ADMIN_DATABASE;
use stackctl::snapshot::{
    BackendKind, MappingStore, PlainCopyBackend, SnapshotBackend, SnapshotError, SnapshotManager,
    SnapshotResult, parse_timestamp,
};
use stackctl::sql::PsqlGateway;
use stackctl::vcs::FixedBranch;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use tempfile::TempDir;

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Default)]
struct MemoryBackend {
    objects: RefCell<BTreeSet<String>>,
    clock: Cell<u32>,
    restored: RefCell<Vec<String>>,
    fail_delete: RefCell<BTreeSet<String>>,
}

impl MemoryBackend {
    fn live(&self) -> BTreeSet<String> {
        self.objects.borrow().clone()
    }

    /// Simulate deletion outside of stackctl.
    fn vanish(&self, id: &str) {
        self.objects.borrow_mut().remove(id);
    }

    fn add_unlabeled(&self, id: &str) {
        self.objects.borrow_mut().insert(id.to_string());
    }
}

impl SnapshotBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::BtrfsVolume
    }

    fn preflight(&self) -> SnapshotResult<()> {
        Ok(())
    }

    fn list_snapshots(&self) -> SnapshotResult<Vec<String>> {
        Ok(self.objects.borrow().iter().cloned().collect())
    }

    fn create(&self, _source_label: &str) -> SnapshotResult<String> {
        let tick = self.clock.get() + 1;
        self.clock.set(tick);
        let id = format!("vol@2024-03-01T10:{:02}:00", tick);
        self.objects.borrow_mut().insert(id.clone());
        Ok(id)
    }

    fn restore(&self, backend_id: &str) -> SnapshotResult<()> {
        if !self.objects.borrow().contains(backend_id) {
            return Err(SnapshotError::BackendUnavailable(backend_id.to_string()));
        }
        self.restored.borrow_mut().push(backend_id.to_string());
        Ok(())
    }

    fn delete(&self, backend_id: &str) -> SnapshotResult<()> {
        if self.fail_delete.borrow().contains(backend_id) {
            return Err(SnapshotError::Backend(stackctl::StackError::process(
                "device busy",
            )));
        }
        self.objects.borrow_mut().remove(backend_id);
        Ok(())
    }

    fn created_at(&self, backend_id: &str) -> Option<NaiveDateTime> {
        parse_timestamp(backend_id.split_once('@')?.1)
    }
}

struct Picker {
    pick: Option<usize>,
    shown: RefCell<Vec<String>>,
}

impl Prompt for Picker {
    fn confirm(&self, _question: &str) -> bool {
        true
    }

    fn choose(&self, _question: &str, options: &[String]) -> Option<usize> {
        *self.shown.borrow_mut() = options.to_vec();
        self.pick
    }

    fn is_attended(&self) -> bool {
        true
    }
}

fn mapping_store(dir: &TempDir) -> MappingStore {
    MappingStore::new(dir.path().join("run/snapshot_mappings.txt"))
}

fn labels_in_store(store: &MappingStore, label: &str) -> usize {
    store
        .load()
        .unwrap()
        .values()
        .filter(|l| l.as_str() == label)
        .count()
}

// =============================================================================
// Save and labels
// =============================================================================

#[test]
fn test_save_twice_keeps_one_entry_per_label() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let first = manager.save(Some("x")).unwrap();
    let second = manager.save(Some("x")).unwrap();

    assert_ne!(first, second);
    assert_eq!(labels_in_store(&mapping_store(&dir), "x"), 1);
    assert!(!backend.live().contains(&first));
    assert!(backend.live().contains(&second));
}

#[test]
fn test_save_without_label_uses_branch() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("feature-x".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let id = manager.save(None).unwrap();

    let mapping = mapping_store(&dir).load().unwrap();
    assert_eq!(mapping.get(&id).map(String::as_str), Some("feature-x"));
}

#[test]
fn test_save_keeps_other_labels() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let a = manager.save(Some("a")).unwrap();
    manager.save(Some("b")).unwrap();

    assert!(backend.live().contains(&a));
    assert_eq!(mapping_store(&dir).load().unwrap().len(), 2);
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn test_externally_deleted_snapshot_disappears_from_list() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let gone = manager.save(Some("old")).unwrap();
    manager.save(Some("new")).unwrap();
    backend.vanish(&gone);

    let names: Vec<String> = manager
        .list()
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(names, vec!["new"]);
    // listing does not rewrite the mapping
    assert!(mapping_store(&dir).load().unwrap().contains_key(&gone));
}

#[test]
fn test_stale_entries_are_pruned_on_next_mutation() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let gone = manager.save(Some("old")).unwrap();
    backend.vanish(&gone);
    manager.save(Some("new")).unwrap();

    assert!(!mapping_store(&dir).load().unwrap().contains_key(&gone));
}

#[test]
fn test_list_is_newest_first_and_shows_unlabeled_ids() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    backend.add_unlabeled("vol@2024-03-01T09:00:00");
    manager.save(Some("first")).unwrap();
    manager.save(Some("second")).unwrap();

    let entries = manager.list().unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["second", "first", "vol@2024-03-01T09:00:00"]);
    assert!(entries[2].label.is_none());
}

// =============================================================================
// Resolution, restore and removal
// =============================================================================

#[test]
fn test_restore_by_label_and_by_id() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let id = manager.save(Some("release")).unwrap();
    assert_eq!(manager.restore("release").unwrap(), id);
    assert_eq!(manager.restore(&id).unwrap(), id);
    assert_eq!(*backend.restored.borrow(), vec![id.clone(), id]);
}

#[test]
fn test_unknown_label_is_not_found() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let err = manager.restore("nope").unwrap_err();
    assert!(matches!(err, SnapshotError::SnapshotNotFound(_)));
    assert!(err.to_string().contains("nope"));
    assert!(err.is_recoverable());
}

#[test]
fn test_label_of_vanished_snapshot_is_not_found() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let id = manager.save(Some("release")).unwrap();
    backend.vanish(&id);

    assert!(matches!(
        manager.restore("release"),
        Err(SnapshotError::SnapshotNotFound(_))
    ));
}

#[test]
fn test_ambiguous_label_is_not_found() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    backend.add_unlabeled("vol@2024-01-01T10:00:00");
    backend.add_unlabeled("vol@2024-01-02T10:00:00");
    let store = mapping_store(&dir);
    store
        .update(|m| {
            m.insert("vol@2024-01-01T10:00:00".into(), "dup".into());
            m.insert("vol@2024-01-02T10:00:00".into(), "dup".into());
        })
        .unwrap();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, store, &branch);

    let err = manager.resolve("dup").unwrap_err();
    assert!(err.to_string().contains("ambiguous"));
}

#[test]
fn test_remove_deletes_object_and_entry() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let id = manager.save(Some("tmp")).unwrap();
    manager.remove("tmp").unwrap();

    assert!(backend.live().is_empty());
    assert!(!mapping_store(&dir).load().unwrap().contains_key(&id));
}

#[test]
fn test_remove_all_empties_backend_and_mapping() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    manager.save(Some("a")).unwrap();
    manager.save(Some("b")).unwrap();
    backend.add_unlabeled("vol@2024-01-01T10:00:00");

    let removed = manager.remove_all().unwrap();

    assert_eq!(removed.len(), 3);
    assert!(backend.live().is_empty());
    assert!(mapping_store(&dir).load().unwrap().is_empty());
}

#[test]
fn test_remove_all_failure_forgets_only_deleted() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let a = manager.save(Some("a")).unwrap();
    let b = manager.save(Some("b")).unwrap();
    backend.fail_delete.borrow_mut().insert(b.clone());

    assert!(manager.remove_all().is_err());

    let mapping = mapping_store(&dir).load().unwrap();
    assert!(!mapping.contains_key(&a));
    assert!(mapping.contains_key(&b));
}

// =============================================================================
// Interactive selection
// =============================================================================

#[test]
fn test_choose_presents_newest_first() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    manager.save(Some("older")).unwrap();
    let newest = manager.save(Some("newer")).unwrap();
    let picker = Picker {
        pick: Some(0),
        shown: RefCell::new(Vec::new()),
    };

    let chosen = manager
        .resolve_or_choose(None, &picker, "Restore which snapshot?")
        .unwrap();

    assert_eq!(chosen, newest);
    let shown = picker.shown.borrow();
    assert!(shown[0].starts_with("newer "));
    assert!(shown[0].ends_with("[2024-03-01 10:02:00]"));
    assert!(shown[1].starts_with("older "));
}

#[test]
fn test_choose_without_operator_fails() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);
    manager.save(Some("only")).unwrap();

    let err = manager
        .resolve_or_choose(None, &NonInteractive { default: true }, "Restore?")
        .unwrap_err();
    assert!(matches!(err, SnapshotError::SnapshotNotFound(_)));
}

#[test]
fn test_aborted_choice_fails() {
    let dir = TempDir::new().unwrap();
    let backend = MemoryBackend::default();
    let branch = FixedBranch("main".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);
    manager.save(Some("only")).unwrap();
    let picker = Picker {
        pick: None,
        shown: RefCell::new(Vec::new()),
    };

    assert!(manager.resolve_or_choose(None, &picker, "Remove?").is_err());
}

// =============================================================================
// Plain-copy backend end to end
// =============================================================================

/// Records every command; answers `pg_database` listings from a live set
/// that `createdb`/`dropdb` keep up to date.
struct RecordedPostgres {
    databases: RefCell<BTreeSet<String>>,
    seen: RefCell<Vec<CommandLine>>,
}

impl RecordedPostgres {
    fn with_databases(names: &[&str]) -> Self {
        Self {
            databases: RefCell::new(names.iter().map(|n| n.to_string()).collect()),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl ProcessRunner for RecordedPostgres {
    fn run(&self, command: &CommandLine) -> Result<ProcessOutput> {
        self.seen.borrow_mut().push(command.clone());
        let target = command.args.last().cloned().unwrap_or_default();
        match command.program.as_str() {
            "createdb" => {
                self.databases.borrow_mut().insert(target);
            }
            "dropdb" => {
                self.databases.borrow_mut().remove(&target);
            }
            "psql" if command.args.iter().any(|a| a.contains("FROM pg_database")) => {
                let listing: Vec<String> = self.databases.borrow().iter().cloned().collect();
                return Ok(ProcessOutput::ok(listing.join("\n")));
            }
            _ => {}
        }
        Ok(ProcessOutput::ok(""))
    }
}

#[test]
fn test_plain_copy_branch_snapshot_and_restore() {
    let dir = TempDir::new().unwrap();
    let runner = RecordedPostgres::with_databases(&["odoo", "postgres", "template1"]);
    let connection = PgConnection::default();
    let backend = PlainCopyBackend::new(
        &runner,
        PsqlGateway::new(&runner, connection.clone(), ADMIN_DATABASE),
        connection,
        "odoo".into(),
    );
    let branch = FixedBranch("feature-x".into());
    let manager = SnapshotManager::new(&backend, mapping_store(&dir), &branch);

    let id = manager.save(None).unwrap();

    assert!(id.starts_with("odoo_feature-x_snapshot_"));
    assert!(backend.created_at(&id).is_some());
    assert_eq!(
        mapping_store(&dir).load().unwrap().get(&id).map(String::as_str),
        Some("feature-x")
    );

    runner.seen.borrow_mut().clear();
    manager.restore(&id).unwrap();

    let seen = runner.seen.borrow();
    let terminate_live = seen
        .iter()
        .position(|c| {
            c.program == "psql"
                && c.args
                    .iter()
                    .any(|a| a.contains("pg_terminate_backend") && a.contains("'odoo'"))
        })
        .expect("connections to the live database are terminated");
    let drop_live = seen
        .iter()
        .position(|c| c.program == "dropdb" && c.args.last().map(String::as_str) == Some("odoo"))
        .expect("live database is dropped");
    let clone = seen
        .iter()
        .position(|c| {
            c.program == "createdb"
                && c.args.windows(2).any(|w| w[0] == "-T" && w[1] == id)
                && c.args.last().map(String::as_str) == Some("odoo")
        })
        .expect("live database is cloned from the snapshot");
    assert!(terminate_live < drop_live);
    assert!(drop_live < clone);
    assert!(runner.databases.borrow().contains("odoo"));
}
