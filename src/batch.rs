//! Batch operations against the application.
//!
//! A batch is one external-process invocation covering many units. The
//! reconciler only cares whether it exited successfully; the captured output
//! is kept for diagnostics.

use crate::command_args::CommandLine;
use crate::commands::app::{AppBatchArgs, AppInvocation, BatchAction};
use crate::error::Result;
use crate::process_runner::{ProcessOutput, ProcessRunner};
use std::path::PathBuf;
use tracing::info;

/// Kind of batch to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchCommand {
    Install {
        units: Vec<String>,
    },
    Upgrade {
        units: Vec<String>,
        run_tests: bool,
    },
    ImportTranslation {
        unit: String,
        locale: String,
        file: PathBuf,
    },
}

impl BatchCommand {
    /// Units this batch touches.
    pub fn units(&self) -> Vec<String> {
        match self {
            Self::Install { units } | Self::Upgrade { units, .. } => units.clone(),
            Self::ImportTranslation { unit, .. } => vec![unit.clone()],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::Upgrade { .. } => "upgrade",
            Self::ImportTranslation { .. } => "translation import",
        }
    }
}

/// Runs batches synchronously; blocks until the external process exits.
pub trait BatchInvoker {
    fn run(&self, batch: &BatchCommand) -> Result<ProcessOutput>;
}

/// Invokes the application's own batch entry point.
pub struct AppBatchInvoker<'a> {
    runner: &'a dyn ProcessRunner,
    app: AppInvocation,
    dbname: String,
}

impl<'a> AppBatchInvoker<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, app: AppInvocation, dbname: impl Into<String>) -> Self {
        Self {
            runner,
            app,
            dbname: dbname.into(),
        }
    }

    fn args_for(&self, batch: &BatchCommand) -> AppBatchArgs {
        let action = match batch {
            BatchCommand::Install { units } => BatchAction::Install {
                units: units.clone(),
            },
            BatchCommand::Upgrade { units, run_tests } => BatchAction::Upgrade {
                units: units.clone(),
                run_tests: *run_tests,
            },
            BatchCommand::ImportTranslation { locale, file, .. } => {
                BatchAction::ImportTranslation {
                    locale: locale.clone(),
                    file: file.clone(),
                }
            }
        };
        AppBatchArgs {
            app: self.app.clone(),
            dbname: self.dbname.clone(),
            action,
        }
    }
}

impl BatchInvoker for AppBatchInvoker<'_> {
    fn run(&self, batch: &BatchCommand) -> Result<ProcessOutput> {
        info!(kind = batch.label(), units = %batch.units().join(","), "starting batch");
        self.runner
            .run(&CommandLine::from_args(&self.args_for(batch)))
    }
}
