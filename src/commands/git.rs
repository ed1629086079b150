//! `git rev-parse --abbrev-ref HEAD` for the active branch name.

use crate::command_args::CommandArgs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CurrentBranchArgs {
    pub repo_dir: PathBuf,
}

impl CommandArgs for CurrentBranchArgs {
    fn program(&self) -> String {
        "git".into()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-C".into(),
            self.repo_dir.display().to_string(),
            "rev-parse".into(),
            "--abbrev-ref".into(),
            "HEAD".into(),
        ]
    }
}
