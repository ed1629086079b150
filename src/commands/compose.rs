//! Type-safe arguments for `docker compose` service lifecycle.

use crate::command_args::CommandArgs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    /// `stop -t 1 <service>`
    Stop,
    /// `up -d <service>`
    Up,
}

#[derive(Debug, Clone)]
pub struct ComposeArgs {
    pub project_dir: PathBuf,
    pub action: ComposeAction,
    pub service: String,
}

impl CommandArgs for ComposeArgs {
    fn program(&self) -> String {
        "docker".into()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "--project-directory".into(),
            self.project_dir.display().to_string(),
        ];
        match self.action {
            ComposeAction::Stop => args.extend(["stop".to_string(), "-t".into(), "1".into()]),
            ComposeAction::Up => args.extend(["up".to_string(), "-d".into()]),
        }
        args.push(self.service.clone());
        args
    }
}
