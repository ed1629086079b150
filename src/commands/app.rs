//! Type-safe arguments for the application's batch entry point.
//!
//! The application exposes one executable that, given a database and a unit
//! list, performs an install or upgrade and exits (`--stop-after-init`).
//! Translation imports use the same executable with `--i18n-import`.
//!
//! # Field to Flag Mapping
//!
//! | Action              | Flags |
//! |---------------------|-------|
//! | `Install`           | `-i a,b --stop-after-init` |
//! | `Upgrade`           | `-u a,b --stop-after-init [--test-enable]` |
//! | `ImportTranslation` | `-l de_DE --i18n-import=<file> --i18n-overwrite --stop-after-init` |

use crate::command_args::CommandArgs;
use std::path::PathBuf;

/// How to reach the application executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInvocation {
    pub executable: PathBuf,
    pub config_path: PathBuf,
    /// When set, the command is wrapped in `sudo -H -u <user>`.
    pub run_as: Option<String>,
}

/// What a single batch invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAction {
    Install { units: Vec<String> },
    Upgrade { units: Vec<String>, run_tests: bool },
    ImportTranslation { locale: String, file: PathBuf },
}

/// Type-safe arguments for one application batch run.
#[derive(Debug, Clone)]
pub struct AppBatchArgs {
    pub app: AppInvocation,
    pub dbname: String,
    pub action: BatchAction,
}

impl CommandArgs for AppBatchArgs {
    fn program(&self) -> String {
        match &self.app.run_as {
            Some(_) => "sudo".into(),
            None => self.app.executable.display().to_string(),
        }
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(user) = &self.app.run_as {
            args.extend(["-H".to_string(), "-u".to_string(), user.clone()]);
            args.push(self.app.executable.display().to_string());
        }
        args.extend([
            "-c".to_string(),
            self.app.config_path.display().to_string(),
            "-d".to_string(),
            self.dbname.clone(),
        ]);

        match &self.action {
            BatchAction::Install { units } => {
                args.push("-i".into());
                args.push(units.join(","));
            }
            BatchAction::Upgrade { units, .. } => {
                args.push("-u".into());
                args.push(units.join(","));
            }
            BatchAction::ImportTranslation { locale, file } => {
                args.push("-l".into());
                args.push(locale.clone());
                args.push(format!("--i18n-import={}", file.display()));
                args.push("--i18n-overwrite".into());
            }
        }

        args.push("--stop-after-init".into());
        // Tests never run on install, only on upgrade.
        if let BatchAction::Upgrade { run_tests: true, .. } = self.action {
            args.push("--test-enable".into());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(run_as: Option<&str>) -> AppInvocation {
        AppInvocation {
            executable: PathBuf::from("/srv/app/odoo-bin"),
            config_path: PathBuf::from("/etc/app.conf"),
            run_as: run_as.map(String::from),
        }
    }

    #[test]
    fn test_install_args() {
        let args = AppBatchArgs {
            app: invocation(None),
            dbname: "prod".into(),
            action: BatchAction::Install {
                units: vec!["sale".into(), "stock".into()],
            },
        };
        assert_eq!(args.program(), "/srv/app/odoo-bin");
        assert_eq!(
            args.to_cli_args(),
            vec!["-c", "/etc/app.conf", "-d", "prod", "-i", "sale,stock", "--stop-after-init"]
        );
    }

    #[test]
    fn test_upgrade_with_tests_under_sudo() {
        let args = AppBatchArgs {
            app: invocation(Some("odoo")),
            dbname: "prod".into(),
            action: BatchAction::Upgrade {
                units: vec!["sale".into()],
                run_tests: true,
            },
        };
        assert_eq!(args.program(), "sudo");
        let cli = args.to_cli_args();
        assert_eq!(&cli[..4], &["-H", "-u", "odoo", "/srv/app/odoo-bin"]);
        assert!(cli.contains(&"-u".to_string()));
        assert_eq!(cli.last().map(String::as_str), Some("--test-enable"));
    }

    #[test]
    fn test_translation_import_args() {
        let args = AppBatchArgs {
            app: invocation(None),
            dbname: "prod".into(),
            action: BatchAction::ImportTranslation {
                locale: "de_DE".into(),
                file: PathBuf::from("/addons/sale/i18n/de.po"),
            },
        };
        let cli = args.to_cli_args();
        assert!(cli.contains(&"--i18n-import=/addons/sale/i18n/de.po".to_string()));
        assert!(cli.contains(&"--i18n-overwrite".to_string()));
        assert!(!cli.contains(&"--test-enable".to_string()));
    }
}
