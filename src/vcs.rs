//! Source-control lookups.

use crate::commands::git::CurrentBranchArgs;
use crate::error::{Result, StackError};
use crate::process_runner::{ProcessRunner, run_args};
use std::path::PathBuf;

/// Where default snapshot labels come from.
pub trait BranchSource {
    fn current_branch(&self) -> Result<String>;
}

/// Active git branch of a working tree.
pub struct GitBranch<'a> {
    runner: &'a dyn ProcessRunner,
    repo_dir: PathBuf,
}

impl<'a> GitBranch<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, repo_dir: PathBuf) -> Self {
        Self { runner, repo_dir }
    }
}

impl BranchSource for GitBranch<'_> {
    fn current_branch(&self) -> Result<String> {
        let args = CurrentBranchArgs {
            repo_dir: self.repo_dir.clone(),
        };
        let output = run_args(self.runner, &args)?;
        output.ensure_success("git rev-parse")?;
        parse_branch(&output.stdout)
    }
}

/// A detached head has no usable name.
fn parse_branch(stdout: &str) -> Result<String> {
    match stdout.trim() {
        "" => Err(StackError::process("git printed no branch name")),
        "HEAD" => Err(StackError::process(
            "detached HEAD, pass a snapshot name explicitly",
        )),
        branch => Ok(branch.to_string()),
    }
}

/// Fixed branch name, for tests and callers that already know it.
pub struct FixedBranch(pub String);

impl BranchSource for FixedBranch {
    fn current_branch(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
