//! SQL channel to the managed database.
//!
//! [`SqlGateway`] is the narrow interface the module state store and the
//! plain-copy snapshot backend use. [`PsqlGateway`] implements it by running
//! one `psql` process per statement through the [`ProcessRunner`], which keeps
//! every database access visible in the command log.

use crate::command_args::CommandLine;
use crate::commands::postgres::{FIELD_SEPARATOR, PgConnection, PsqlArgs};
use crate::error::{Result, StackError};
use crate::process_runner::ProcessRunner;
use tracing::debug;

/// One result row, columns as text.
pub type Row = Vec<String>;

pub trait SqlGateway {
    /// Run a statement that returns no rows of interest.
    fn execute(&self, sql: &str) -> Result<()>;

    /// Run a query and return its rows.
    fn query(&self, sql: &str) -> Result<Vec<Row>>;
}

/// Quote a string as a SQL literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `psql`-backed gateway bound to one database.
pub struct PsqlGateway<'a> {
    runner: &'a dyn ProcessRunner,
    connection: PgConnection,
    dbname: String,
}

impl<'a> PsqlGateway<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, connection: PgConnection, dbname: impl Into<String>) -> Self {
        Self {
            runner,
            connection,
            dbname: dbname.into(),
        }
    }

    /// Same server, different database (e.g. `template1` for catalog queries).
    pub fn with_database(&self, dbname: impl Into<String>) -> PsqlGateway<'a> {
        PsqlGateway {
            runner: self.runner,
            connection: self.connection.clone(),
            dbname: dbname.into(),
        }
    }

    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    fn run(&self, sql: &str) -> Result<String> {
        debug!(db = %self.dbname, sql, "sql");
        let args = PsqlArgs {
            connection: self.connection.clone(),
            dbname: self.dbname.clone(),
            sql: sql.to_string(),
        };
        let output = self.runner.run(&CommandLine::from_args(&args))?;
        if !output.success {
            return Err(StackError::sql(format!(
                "{} (database {})",
                output.stderr.trim(),
                self.dbname
            )));
        }
        Ok(output.stdout)
    }
}

impl SqlGateway for PsqlGateway<'_> {
    fn execute(&self, sql: &str) -> Result<()> {
        self.run(sql).map(|_| ())
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        Ok(parse_rows(&self.run(sql)?))
    }
}

/// Split unaligned `psql` output into rows.
pub fn parse_rows(output: &str) -> Vec<Row> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split(FIELD_SEPARATOR).map(str::to_string).collect())
        .collect()
}

/// Forcibly end every other session connected to `dbname`.
///
/// Run through a gateway bound to a different database (the admin database),
/// otherwise the gateway's own session is the only one spared.
pub fn terminate_connections(gateway: &dyn SqlGateway, dbname: &str) -> Result<()> {
    gateway.execute(&format!(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = {} AND pid <> pg_backend_pid();",
        quote_literal(dbname)
    ))
}
