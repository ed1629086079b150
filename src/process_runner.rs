//! External command execution
//!
//! This module provides the ONLY sanctioned way to run external programs.
//! Everything that leaves the process goes through a [`ProcessRunner`]:
//!
//! - Process group isolation with parent-death signal
//! - PID registration for cleanup on interrupt
//! - Typed arguments via [`CommandArgs`]
//!
//! Commands block until the child exits. There is deliberately no timeout:
//! a batch install or volume restore killed halfway leaves the database in a
//! state that is worse than a slow run.

use crate::command_args::{CommandArgs, CommandLine};
use crate::error::{Result, StackError};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Output from an external command.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the command exited with code 0.
    pub success: bool,
}

impl ProcessOutput {
    /// A successful output carrying `stdout`. Used by fakes and dry paths.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// A failed output carrying `stderr`.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
        }
    }

    /// Return an error if the command did not succeed.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(StackError::process(format!(
                "{} failed (exit code {}): {}",
                context,
                self.exit_code.unwrap_or(-1),
                self.stderr.trim()
            )))
        }
    }
}

/// Runs rendered command lines.
///
/// `Err` means the command could not be run at all (binary missing, spawn
/// failure). A command that ran and exited non-zero is `Ok` with
/// `success == false`; callers decide whether that is fatal.
pub trait ProcessRunner {
    fn run(&self, command: &CommandLine) -> Result<ProcessOutput>;
}

/// Convenience for running a typed argument struct.
pub fn run_args<R: ProcessRunner + ?Sized, T: CommandArgs + ?Sized>(
    runner: &R,
    args: &T,
) -> Result<ProcessOutput> {
    runner.run(&CommandLine::from_args(args))
}

/// Runs commands on the host with output captured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<ProcessOutput> {
        info!(
            command = %command.display(),
            env = ?command.loggable_env(),
            "running external command"
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| {
            StackError::process(format!("failed to spawn {}: {}", command.program, e))
        })?;
        let pid = child.id();
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        let waited = child.wait_with_output();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }
        let output = waited.map_err(|e| {
            StackError::process(format!("failed waiting for {}: {}", command.program, e))
        })?;

        let result = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        if result.success {
            debug!(program = %command.program, "command succeeded");
        } else {
            warn!(
                program = %command.program,
                code = result.exit_code.unwrap_or(-1),
                "command failed"
            );
        }
        Ok(result)
    }
}

/// Whether `name` resolves to an executable on `PATH` (or is an existing path).
pub fn binary_exists(name: &str) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let is_exec = |p: &std::path::Path| {
        p.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    };

    if name.contains('/') {
        return is_exec(std::path::Path::new(name));
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_exec(&dir.join(name))))
        .unwrap_or(false)
}

/// Names from `required` that are not available on this host.
pub fn missing_binaries(required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|b| !binary_exists(b))
        .map(|b| (*b).to_string())
        .collect()
}
