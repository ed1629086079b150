//! Start and stop the database service around volume-level operations.

use crate::commands::compose::{ComposeAction, ComposeArgs};
use crate::error::Result;
use crate::process_runner::{ProcessRunner, run_args};
use std::path::PathBuf;
use tracing::info;

pub trait ServiceControl {
    fn stop(&self, service: &str) -> Result<()>;
    fn start(&self, service: &str) -> Result<()>;
}

/// `docker compose` backed service control.
pub struct ComposeControl<'a> {
    runner: &'a dyn ProcessRunner,
    project_dir: PathBuf,
}

impl<'a> ComposeControl<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, project_dir: PathBuf) -> Self {
        Self {
            runner,
            project_dir,
        }
    }

    fn compose(&self, action: ComposeAction, service: &str) -> Result<()> {
        let args = ComposeArgs {
            project_dir: self.project_dir.clone(),
            action,
            service: service.to_string(),
        };
        run_args(self.runner, &args)?.ensure_success(&format!("docker compose {:?} {}", action, service))
    }
}

impl ServiceControl for ComposeControl<'_> {
    fn stop(&self, service: &str) -> Result<()> {
        info!(service, "stopping service");
        self.compose(ComposeAction::Stop, service)
    }

    fn start(&self, service: &str) -> Result<()> {
        info!(service, "starting service");
        self.compose(ComposeAction::Up, service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_args::CommandLine;
    use crate::process_runner::ProcessOutput;
    use std::cell::RefCell;

    struct Recorder {
        fail: bool,
        seen: RefCell<Vec<CommandLine>>,
    }

    impl ProcessRunner for Recorder {
        fn run(&self, command: &CommandLine) -> Result<ProcessOutput> {
            self.seen.borrow_mut().push(command.clone());
            if self.fail {
                Ok(ProcessOutput::failed(1, "no such service"))
            } else {
                Ok(ProcessOutput::ok(""))
            }
        }
    }

    #[test]
    fn test_stop_then_start() {
        let runner = Recorder {
            fail: false,
            seen: RefCell::new(Vec::new()),
        };
        let control = ComposeControl::new(&runner, PathBuf::from("/srv/stack"));
        control.stop("postgres").unwrap();
        control.start("postgres").unwrap();

        let seen = runner.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].args.contains(&"stop".to_string()));
        assert!(seen[1].args.contains(&"up".to_string()));
    }

    #[test]
    fn test_failure_names_service() {
        let runner = Recorder {
            fail: true,
            seen: RefCell::new(Vec::new()),
        };
        let control = ComposeControl::new(&runner, PathBuf::from("."));
        let err = control.stop("postgres").unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }
}
