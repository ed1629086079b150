//! Type-safe arguments for the PostgreSQL client tools.
//!
//! - `PsqlArgs` for `psql` (single statement, machine-readable output)
//! - `CreateDbArgs` for `createdb -T <template>`
//! - `DropDbArgs` for `dropdb`
//!
//! The password is never put on the command line; it travels in `PGPASSWORD`.

use crate::command_args::CommandArgs;
use serde::{Deserialize, Serialize};

/// Field separator used for `psql` row output (ASCII unit separator).
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Connection parameters shared by all client tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
}

impl Default for PgConnection {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "odoo".into(),
            password: None,
        }
    }
}

impl PgConnection {
    fn cli_args(&self) -> Vec<String> {
        vec![
            "-h".into(),
            self.host.clone(),
            "-p".into(),
            self.port.to_string(),
            "-U".into(),
            self.user.clone(),
        ]
    }

    fn env_vars(&self) -> Vec<(String, String)> {
        self.password
            .iter()
            .map(|p| ("PGPASSWORD".to_string(), p.clone()))
            .collect()
    }
}

/// `psql` running exactly one statement with unaligned, tuples-only output.
#[derive(Debug, Clone)]
pub struct PsqlArgs {
    pub connection: PgConnection,
    pub dbname: String,
    pub sql: String,
}

impl CommandArgs for PsqlArgs {
    fn program(&self) -> String {
        "psql".into()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["-X".to_string(), "-A".into(), "-t".into()];
        args.push("-F".into());
        args.push(FIELD_SEPARATOR.to_string());
        args.extend(["-v".to_string(), "ON_ERROR_STOP=1".into()]);
        args.extend(self.connection.cli_args());
        args.extend(["-d".to_string(), self.dbname.clone()]);
        args.extend(["-c".to_string(), self.sql.clone()]);
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.connection.env_vars()
    }

    fn secret_env_keys(&self) -> &'static [&'static str] {
        &["PGPASSWORD"]
    }
}

/// `createdb -T <template> <dbname>`
#[derive(Debug, Clone)]
pub struct CreateDbArgs {
    pub connection: PgConnection,
    pub template: String,
    pub dbname: String,
}

impl CommandArgs for CreateDbArgs {
    fn program(&self) -> String {
        "createdb".into()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = self.connection.cli_args();
        args.extend(["-T".to_string(), self.template.clone(), self.dbname.clone()]);
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.connection.env_vars()
    }

    fn secret_env_keys(&self) -> &'static [&'static str] {
        &["PGPASSWORD"]
    }
}

/// `dropdb --if-exists <dbname>`
#[derive(Debug, Clone)]
pub struct DropDbArgs {
    pub connection: PgConnection,
    pub dbname: String,
}

impl CommandArgs for DropDbArgs {
    fn program(&self) -> String {
        "dropdb".into()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = self.connection.cli_args();
        args.push("--if-exists".into());
        args.push(self.dbname.clone());
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.connection.env_vars()
    }

    fn secret_env_keys(&self) -> &'static [&'static str] {
        &["PGPASSWORD"]
    }
}
