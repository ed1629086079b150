//! stackctl - main entry point

use anyhow::{Context, bail};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use stackctl::cli::{Cli, Commands, ModuleCommands, SnapshotCommands, UpdateArgs};
use stackctl::process_runner::missing_binaries;
use stackctl::snapshot::{MappingStore, SnapshotManager, select_backend};
use stackctl::vcs::GitBranch;
use stackctl::{
    AddonsManifests, AppBatchInvoker, ModuleStates, NonInteractive, ProcessGuard, ProcessRunner,
    Prompt, PsqlGateway, ReconcileError, Reconciler, SnapshotError, SqlModuleStore, StackConfig,
    SystemRunner, TerminalPrompt, UpdateMode, UpdateOptions, UpdateRequest, process_guard,
};

/// Exit code when the unit catalog could not be refreshed.
const EXIT_CATALOG_REFRESH: u8 = 82;
/// Exit code for conditions the operator can fix and retry.
const EXIT_RECOVERABLE: u8 = 2;

/// Initialize the logger; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    // Children are terminated if we receive SIGINT/SIGTERM/SIGHUP
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let _guard = ProcessGuard::new();

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Map a failure to the process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<ReconcileError>() {
        return match e {
            ReconcileError::CatalogRefreshFailed { .. } => EXIT_CATALOG_REFRESH,
            e if e.is_recoverable() => EXIT_RECOVERABLE,
            _ => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<SnapshotError>() {
        if e.is_recoverable() {
            return EXIT_RECOVERABLE;
        }
    }
    1
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = StackConfig::resolve(cli.config.as_deref())
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    let non_interactive = cli.non_interactive || config.non_interactive;
    info!(db = %config.database.name, non_interactive, "stackctl starting");

    let runner = SystemRunner;
    let prompt: Box<dyn Prompt> = if non_interactive {
        Box::new(NonInteractive { default: true })
    } else {
        Box::new(TerminalPrompt)
    };

    match cli.command {
        Commands::Module { action } => {
            run_module(&config, &runner, prompt.as_ref(), non_interactive, action)
        }
        Commands::Snapshot { action } => {
            run_snapshot(&config, &runner, prompt.as_ref(), non_interactive, action)
        }
    }
}

fn run_module(
    config: &StackConfig,
    runner: &dyn ProcessRunner,
    prompt: &dyn Prompt,
    non_interactive: bool,
    action: ModuleCommands,
) -> anyhow::Result<()> {
    let missing = missing_binaries(&["psql"]);
    if !missing.is_empty() {
        bail!("required tools not found on PATH: {}", missing.join(", "));
    }

    let store = SqlModuleStore::new(PsqlGateway::new(
        runner,
        config.database.connection.clone(),
        config.database.name.clone(),
    ));
    let manifests = AddonsManifests::new(config.application.addons_paths.clone())
        .with_project_manifest(config.application.project_manifest.clone());
    let invoker = AppBatchInvoker::new(
        runner,
        config.application.invocation(),
        config.database.name.clone(),
    );
    let reconciler = Reconciler::new(&store, &manifests, &invoker, prompt)
        .with_catalog_refresh_unit(config.application.catalog_refresh_unit.clone())
        .with_base_locale(config.application.base_locale.clone());

    match action {
        ModuleCommands::Update(args) => run_update(&reconciler, non_interactive, args),
        ModuleCommands::UpdateI18n { units } => {
            let result = reconciler.update_translations(&units)?;
            for line in &result.summary {
                println!("{}", line);
            }
            for failure in &result.translation_failures {
                eprintln!("⚠ {}", failure);
            }
            println!("✓ Translations imported for {} unit(s)", result.succeeded.len());
            Ok(())
        }
        ModuleCommands::ShowInstallState { suppress_error } => {
            let dangling = reconciler.check_install_state(true)?;
            if dangling.is_empty() {
                println!("✓ No dangling units");
                return Ok(());
            }
            for unit in &dangling {
                println!("{}", unit);
            }
            if !suppress_error {
                return Err(ReconcileError::DanglingState(dangling).into());
            }
            Ok(())
        }
        ModuleCommands::AbortUpgrade => {
            store.abort_upgrade().context("failed to abort upgrade")?;
            println!("✓ Interrupted upgrade aborted");
            Ok(())
        }
        ModuleCommands::Progress => {
            for (state, count) in store.state_counts().context("failed to count units")? {
                println!("{:<15} {}", state, count);
            }
            Ok(())
        }
        ModuleCommands::RemoveOld => {
            let retired = reconciler.retire_orphaned_units(non_interactive)?;
            if retired.is_empty() {
                println!("✓ Nothing to remove");
            }
            for unit in retired {
                println!("Set {} to uninstalled", unit);
            }
            Ok(())
        }
    }
}

fn run_update(
    reconciler: &Reconciler<'_>,
    non_interactive: bool,
    args: UpdateArgs,
) -> anyhow::Result<()> {
    let options = UpdateOptions {
        run_tests: args.tests,
        overwrite_translations: args.i18n,
        non_interactive,
        allow_dangling: args.allow_dangling || args.dangling,
        repair_dangling: args.repair_dangling,
    };
    let mode = if args.install_only {
        UpdateMode::Install
    } else {
        UpdateMode::Upgrade
    };
    let targets = reconciler.expand_targets(&args.units, args.installed, args.dangling)?;
    let request = UpdateRequest::new(targets, mode, options)?;
    let result = reconciler.update(&request)?;

    for line in &result.summary {
        println!("{}", line);
    }
    for failure in &result.translation_failures {
        eprintln!("⚠ {}", failure);
    }
    if !result.dangling.is_empty() {
        eprintln!("⚠ Units left in a transitional state:");
        for unit in &result.dangling {
            eprintln!("  {}", unit);
        }
    }
    println!("✓ {} unit(s) up to date", result.succeeded.len());
    Ok(())
}

fn run_snapshot(
    config: &StackConfig,
    runner: &dyn ProcessRunner,
    prompt: &dyn Prompt,
    non_interactive: bool,
    action: SnapshotCommands,
) -> anyhow::Result<()> {
    let backend = select_backend(config, runner);
    backend.preflight()?;
    let branch = GitBranch::new(runner, PathBuf::from("."));
    let manager = SnapshotManager::new(
        backend.as_ref(),
        MappingStore::new(config.snapshot.mapping_file.clone()),
        &branch,
    );

    match action {
        SnapshotCommands::List => {
            let entries = manager.list()?;
            if entries.is_empty() {
                println!("No snapshots");
            }
            for entry in entries {
                println!("{}", entry.menu_line());
            }
        }
        SnapshotCommands::Save { name } => {
            let id = manager.save(name.as_deref())?;
            println!("✓ Saved snapshot {}", id);
        }
        SnapshotCommands::Restore { name, clear } => {
            let id = manager.resolve_or_choose(name.as_deref(), prompt, "Restore which snapshot?")?;
            manager.restore(&id)?;
            println!("✓ Restored {}", id);
            if clear {
                let removed = manager.remove_all()?;
                println!("✓ Removed {} snapshot(s)", removed.len());
            }
        }
        SnapshotCommands::Remove { name } => {
            let id = manager.resolve_or_choose(name.as_deref(), prompt, "Remove which snapshot?")?;
            manager.remove(&id)?;
            println!("✓ Removed {}", id);
        }
        SnapshotCommands::Clear => {
            let count = manager.list()?.len();
            if count == 0 {
                println!("No snapshots");
                return Ok(());
            }
            if !non_interactive && !prompt.confirm(&format!("Remove all {} snapshot(s)?", count)) {
                println!("Aborted");
                return Ok(());
            }
            let removed = manager.remove_all()?;
            println!("✓ Removed {} snapshot(s)", removed.len());
        }
    }
    Ok(())
}
