//! stackctl library
//!
//! Keeps a web application's installed units in the requested state and
//! takes point-in-time snapshots of its database.

pub mod batch;
pub mod cli;
pub mod command_args;
pub mod commands;
pub mod config_file;
pub mod error;
pub mod manifest;
pub mod module_state;
pub mod process_guard;
pub mod process_runner;
pub mod prompt;
pub mod reconciler;
pub mod service_control;
pub mod snapshot;
pub mod sql;
pub mod vcs;

// Re-export main types for convenience
pub use batch::{AppBatchInvoker, BatchCommand, BatchInvoker};
pub use command_args::{CommandArgs, CommandLine};
pub use config_file::StackConfig;
pub use error::StackError;
pub use manifest::{AddonsManifests, ManifestSource};
pub use module_state::{DanglingUnit, ModuleState, ModuleStates, SqlModuleStore};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use process_runner::{ProcessOutput, ProcessRunner, SystemRunner};
pub use prompt::{NonInteractive, Prompt, TerminalPrompt};
pub use reconciler::{
    ReconcileError, Reconciler, TranslationImportFailed, UpdateMode, UpdateOptions, UpdateRequest,
    UpdateResult,
};
pub use snapshot::{
    BackendKind, MappingStore, SnapshotBackend, SnapshotEntry, SnapshotError, SnapshotManager,
};
pub use sql::{PsqlGateway, SqlGateway};
