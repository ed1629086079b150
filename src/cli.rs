use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// stackctl - keep application units and database snapshots in order
#[derive(Parser)]
#[command(name = "stackctl")]
#[command(about = "Reconcile installed application units and manage database snapshots")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ./stackctl.json if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Never prompt; take the default answer for every question.
    #[arg(long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install, upgrade and inspect application units
    Module {
        #[command(subcommand)]
        action: ModuleCommands,
    },
    /// Save, list and restore database snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommands,
    },
}

#[derive(Subcommand)]
pub enum ModuleCommands {
    /// Install missing units and upgrade the given set
    Update(UpdateArgs),
    /// Re-import translations with overwrite, without install or upgrade batches
    UpdateI18n {
        /// Units whose translations are imported, comma or space separated
        units: Vec<String>,
    },
    /// List units left in a transitional state
    ShowInstallState {
        /// Report dangling units without failing
        #[arg(long)]
        suppress_error: bool,
    },
    /// Roll back an interrupted upgrade (to upgrade → installed, to install → uninstalled)
    AbortUpgrade,
    /// Count units per installation state
    Progress,
    /// Uninstall units whose sources are gone from every addons path
    RemoveOld,
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Units to update, comma or space separated (default: the project's
    /// update list plus uninstalled dependencies of installed units)
    pub units: Vec<String>,

    /// Only install; fail if a unit is already installed
    #[arg(long)]
    pub install_only: bool,

    /// Add every installed unit to the targets
    #[arg(long)]
    pub installed: bool,

    /// Add every dangling unit to the targets (implies --allow-dangling)
    #[arg(long)]
    pub dangling: bool,

    /// Proceed even if units are left in a transitional state
    #[arg(long)]
    pub allow_dangling: bool,

    /// Abort interrupted upgrades before proceeding
    #[arg(long)]
    pub repair_dangling: bool,

    /// Run unit tests during the upgrade
    #[arg(long)]
    pub tests: bool,

    /// Re-import translations with overwrite afterwards
    #[arg(long)]
    pub i18n: bool,
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// List live snapshots, newest first
    List,
    /// Snapshot the database (name defaults to the current git branch)
    Save {
        /// Label for the snapshot; replaces an older snapshot with the same label
        name: Option<String>,
    },
    /// Replace the live database with a snapshot
    Restore {
        /// Label or backend id; asks when omitted
        name: Option<String>,
        /// Remove every snapshot after restoring
        #[arg(long)]
        clear: bool,
    },
    /// Delete one snapshot
    Remove {
        /// Label or backend id; asks when omitted
        name: Option<String>,
    },
    /// Delete every snapshot
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_update_flags() {
        let cli = Cli::try_parse_from([
            "stackctl",
            "--non-interactive",
            "module",
            "update",
            "sale,stock",
            "crm",
            "--repair-dangling",
            "--i18n",
        ])
        .unwrap();
        assert!(cli.non_interactive);
        match cli.command {
            Commands::Module {
                action: ModuleCommands::Update(args),
            } => {
                assert_eq!(args.units, vec!["sale,stock", "crm"]);
                assert!(args.repair_dangling);
                assert!(args.i18n);
                assert!(!args.install_only);
            }
            _ => panic!("expected module update"),
        }
    }

    #[test]
    fn test_snapshot_restore_clear() {
        let cli =
            Cli::try_parse_from(["stackctl", "snapshot", "restore", "main", "--clear"]).unwrap();
        match cli.command {
            Commands::Snapshot {
                action: SnapshotCommands::Restore { name, clear },
            } => {
                assert_eq!(name.as_deref(), Some("main"));
                assert!(clear);
            }
            _ => panic!("expected snapshot restore"),
        }
    }

    #[test]
    fn test_update_i18n_units() {
        let cli = Cli::try_parse_from(["stackctl", "module", "update-i18n", "sale,stock"]).unwrap();
        match cli.command {
            Commands::Module {
                action: ModuleCommands::UpdateI18n { units },
            } => assert_eq!(units, vec!["sale,stock"]),
            _ => panic!("expected module update-i18n"),
        }

        let cli = Cli::try_parse_from(["stackctl", "module", "update-i18n"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Module {
                action: ModuleCommands::UpdateI18n { units }
            } if units.is_empty()
        ));
    }
}
