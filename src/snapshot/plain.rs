//! Logical-database snapshots as template clones.
//!
//! A snapshot of database `odoo` taken on branch `main` is the database
//! `odoo_main_snapshot_2024-03-01T09:15:00`. Creating and restoring only needs
//! the sessions on the databases involved terminated; the service keeps running.

use super::{
    BackendKind, SnapshotBackend, SnapshotError, SnapshotResult, TIMESTAMP_FORMAT,
    parse_timestamp,
};
use crate::commands::postgres::{CreateDbArgs, DropDbArgs, PgConnection};
use crate::error::StackError;
use crate::process_runner::{ProcessRunner, missing_binaries, run_args};
use crate::sql::{PsqlGateway, SqlGateway, terminate_connections};
use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

/// Database the backend connects to for catalog queries and terminations.
pub const ADMIN_DATABASE: &str = "template1";

/// PostgreSQL identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

const SNAPSHOT_MARKER: &str = "_snapshot_";

pub struct PlainCopyBackend<'a> {
    runner: &'a dyn ProcessRunner,
    admin: PsqlGateway<'a>,
    connection: PgConnection,
    dbname: String,
}

impl<'a> PlainCopyBackend<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        admin: PsqlGateway<'a>,
        connection: PgConnection,
        dbname: String,
    ) -> Self {
        Self {
            runner,
            admin,
            connection,
            dbname,
        }
    }

    /// Backend id for a snapshot of the live database taken at `at`.
    pub fn snapshot_name(&self, label: &str, at: NaiveDateTime) -> String {
        format!(
            "{}_{}{}{}",
            self.dbname,
            label,
            SNAPSHOT_MARKER,
            at.format(TIMESTAMP_FORMAT)
        )
    }

    fn is_own_snapshot(&self, datname: &str) -> bool {
        datname
            .strip_prefix(&self.dbname)
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|rest| rest.contains(SNAPSHOT_MARKER))
    }

    /// Snapshots of this database among `datnames`.
    ///
    /// `odoo_test_main_snapshot_…` belongs to `odoo_test` while that database
    /// exists, not to `odoo` with label `test_main`.
    fn own_snapshots(&self, datnames: &[String]) -> Vec<String> {
        let siblings: Vec<String> = datnames
            .iter()
            .filter(|d| *d != &self.dbname && !d.contains(SNAPSHOT_MARKER))
            .filter(|d| {
                d.strip_prefix(&self.dbname)
                    .is_some_and(|rest| rest.starts_with('_'))
            })
            .map(|d| format!("{}_", d))
            .collect();

        datnames
            .iter()
            .filter(|name| self.is_own_snapshot(name))
            .filter(|name| !siblings.iter().any(|prefix| name.starts_with(prefix.as_str())))
            .cloned()
            .collect()
    }

    fn create_at(&self, source_label: &str, at: NaiveDateTime) -> SnapshotResult<String> {
        let id = self.snapshot_name(source_label, at);
        if id.len() > MAX_IDENTIFIER_LEN {
            return Err(SnapshotError::Backend(StackError::config(format!(
                "snapshot name '{}' is longer than {} bytes, use a shorter name",
                id, MAX_IDENTIFIER_LEN
            ))));
        }
        if self.list_snapshots()?.contains(&id) {
            return Err(SnapshotError::Backend(StackError::config(format!(
                "snapshot database '{}' already exists",
                id
            ))));
        }

        info!(db = %self.dbname, snapshot = %id, "cloning database");
        // A template database must have no other sessions.
        self.terminate(&self.dbname)?;
        if let Err(e) = self.createdb(&self.dbname, &id) {
            // Only a clone this call left behind is dropped.
            match self.list_snapshots() {
                Ok(live) if live.contains(&id) => {
                    if let Err(cleanup) = self.dropdb(&id) {
                        warn!(snapshot = %id, error = %cleanup, "could not remove partial clone");
                    }
                }
                Ok(_) => {}
                Err(list) => {
                    warn!(snapshot = %id, error = %list, "could not check for a partial clone");
                }
            }
            return Err(e);
        }
        Ok(id)
    }

    fn createdb(&self, template: &str, dbname: &str) -> SnapshotResult<()> {
        let args = CreateDbArgs {
            connection: self.connection.clone(),
            template: template.to_string(),
            dbname: dbname.to_string(),
        };
        run_args(self.runner, &args)
            .and_then(|o| o.ensure_success(&format!("createdb {} from {}", dbname, template)))
            .map_err(SnapshotError::Backend)
    }

    fn dropdb(&self, dbname: &str) -> SnapshotResult<()> {
        let args = DropDbArgs {
            connection: self.connection.clone(),
            dbname: dbname.to_string(),
        };
        run_args(self.runner, &args)
            .and_then(|o| o.ensure_success(&format!("dropdb {}", dbname)))
            .map_err(SnapshotError::Backend)
    }

    fn terminate(&self, dbname: &str) -> SnapshotResult<()> {
        terminate_connections(&self.admin, dbname).map_err(SnapshotError::Backend)
    }
}

impl SnapshotBackend for PlainCopyBackend<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::PlainCopy
    }

    fn preflight(&self) -> SnapshotResult<()> {
        let missing = missing_binaries(&["psql", "createdb", "dropdb"]);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SnapshotError::EnvironmentUnready {
                backend: self.kind(),
                missing,
            })
        }
    }

    fn list_snapshots(&self) -> SnapshotResult<Vec<String>> {
        let rows = self
            .admin
            .query("SELECT datname FROM pg_database ORDER BY datname;")
            .map_err(SnapshotError::Backend)?;
        let datnames: Vec<String> = rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect();
        Ok(self.own_snapshots(&datnames))
    }

    fn create(&self, source_label: &str) -> SnapshotResult<String> {
        self.create_at(source_label, Local::now().naive_local())
    }

    fn restore(&self, backend_id: &str) -> SnapshotResult<()> {
        if !self.list_snapshots()?.iter().any(|s| s == backend_id) {
            return Err(SnapshotError::BackendUnavailable(format!(
                "snapshot database '{}' no longer exists",
                backend_id
            )));
        }

        info!(db = %self.dbname, snapshot = backend_id, "restoring database from snapshot");
        self.terminate(&self.dbname)?;
        self.terminate(backend_id)?;
        self.dropdb(&self.dbname)?;
        self.createdb(backend_id, &self.dbname)
    }

    fn delete(&self, backend_id: &str) -> SnapshotResult<()> {
        info!(snapshot = backend_id, "dropping snapshot database");
        self.terminate(backend_id)?;
        self.dropdb(backend_id)
    }

    fn created_at(&self, backend_id: &str) -> Option<NaiveDateTime> {
        let (_, ts) = backend_id.rsplit_once(SNAPSHOT_MARKER)?;
        parse_timestamp(ts)
    }
}
