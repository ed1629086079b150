//! Type-safe external command contracts.
//!
//! Every external program stackctl drives (the application's batch entry
//! point, `psql`, `createdb`, the volume tool, `docker compose`, `git`) is
//! described by a struct implementing [`CommandArgs`]. The struct definition
//! is the contract: flag spelling lives in exactly one place and is covered by
//! unit tests next to it.

/// Trait for typed command arguments.
///
/// # Contract
///
/// - `program()`: executable name or absolute path. Resolved via `PATH` when relative.
/// - `to_cli_args()`: arguments exactly as the program expects them.
/// - `get_env_vars()`: extra environment for the child (e.g. `PGPASSWORD`).
///
/// # Example
///
/// ```
/// use stackctl::command_args::CommandArgs;
/// use stackctl::commands::postgres::DropDbArgs;
///
/// let args = DropDbArgs {
///     connection: Default::default(),
///     dbname: "odoo_snapshot".into(),
/// };
/// assert_eq!(args.program(), "dropdb");
/// assert!(args.to_cli_args().ends_with(&["odoo_snapshot".to_string()]));
/// ```
pub trait CommandArgs {
    /// Executable to run.
    fn program(&self) -> String;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Environment variables the child requires.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Environment variable names whose values must never be logged.
    fn secret_env_keys(&self) -> &'static [&'static str] {
        &[]
    }
}

/// A fully rendered command, detached from the typed struct it came from.
///
/// This is what the [`ProcessRunner`](crate::process_runner::ProcessRunner)
/// executes and what test fakes record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub secret_env: Vec<String>,
}

impl CommandLine {
    pub fn from_args<T: CommandArgs + ?Sized>(args: &T) -> Self {
        Self {
            program: args.program(),
            args: args.to_cli_args(),
            env: args.get_env_vars(),
            secret_env: args
                .secret_env_keys()
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
        }
    }

    /// `program arg1 arg2 ...` for log lines and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Environment keys with secret values masked.
    pub fn loggable_env(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(k, v)| {
                if self.secret_env.iter().any(|s| s == k) {
                    format!("{}=***", k)
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect()
    }
}
