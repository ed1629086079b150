//! Configuration file handling.
//!
//! `StackConfig` is loaded from JSON (`stackctl.json` unless `--config` is
//! given). Every section has defaults, so a partial file is valid. A few fields
//! can be overridden from the environment for automation:
//!
//! | Variable                    | Field                |
//! |-----------------------------|----------------------|
//! | `STACKCTL_DBNAME`           | `database.name`      |
//! | `STACKCTL_SNAPSHOT_BACKEND` | `snapshot.backend`   |
//! | `STACKCTL_NON_INTERACTIVE`  | `non_interactive`    |
//! | `PGPASSWORD`                | `database.password`  |

use crate::commands::app::AppInvocation;
use crate::commands::postgres::PgConnection;
use crate::error::{Result, StackError};
use crate::snapshot::BackendKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stackctl.json";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub database: DatabaseConfig,
    pub application: ApplicationConfig,
    pub snapshot: SnapshotConfig,
    /// Never prompt; take the non-interactive default for every decision.
    pub non_interactive: bool,
}

/// Managed database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Logical database the application runs on.
    pub name: String,
    #[serde(flatten)]
    pub connection: PgConnection,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "odoo".into(),
            connection: PgConnection::default(),
        }
    }
}

/// The managed web application and its unit sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Batch entry point of the application.
    pub executable: PathBuf,
    /// Application server config file passed with `-c`.
    pub config_path: PathBuf,
    /// Run batch commands as this user via `sudo -H -u`.
    pub run_as: Option<String>,
    /// Directories searched for unit manifests, first match wins.
    pub addons_paths: Vec<PathBuf>,
    /// Locale that is never re-imported from translation files.
    pub base_locale: String,
    /// Unit whose upgrade re-synchronises the catalog with the addons paths.
    pub catalog_refresh_unit: String,
    /// Project manifest whose `install` list is updated when no units are named.
    pub project_manifest: Option<PathBuf>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("/opt/odoo/server/odoo-bin"),
            config_path: PathBuf::from("/etc/odoo/config_openerp"),
            run_as: None,
            addons_paths: vec![PathBuf::from("/opt/odoo/addons")],
            base_locale: "en_US".into(),
            catalog_refresh_unit: "update_module_list".into(),
            project_manifest: None,
        }
    }
}

impl ApplicationConfig {
    pub fn invocation(&self) -> AppInvocation {
        AppInvocation {
            executable: self.executable.clone(),
            config_path: self.config_path.clone(),
            run_as: self.run_as.clone(),
        }
    }
}

/// Snapshot storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Active backend for the whole process lifetime.
    pub backend: BackendKind,
    /// label mapping file (YAML, backend_id -> label)
    pub mapping_file: PathBuf,
    /// Data volume holding the database cluster (btrfs-volume only).
    pub volume_name: String,
    /// Compose service writing to the volume (btrfs-volume only).
    pub db_service: String,
    /// Directory containing the compose project.
    pub compose_dir: PathBuf,
    /// Command prefix reaching the volume snapshot tool.
    pub volume_tool: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::PlainCopy,
            mapping_file: PathBuf::from("run/snapshot_mappings.txt"),
            volume_name: "odoo_ODOO_POSTGRES_VOLUME".into(),
            db_service: "postgres".into(),
            compose_dir: PathBuf::from("."),
            volume_tool: vec!["buttervolume".into()],
        }
    }
}

impl StackConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            StackError::config(format!("failed to read {:?}: {}", path.as_ref(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` if given, else from [`DEFAULT_CONFIG_FILE`] when it
    /// exists, else defaults. Environment overrides are applied last.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_FILE)?
            }
            None => {
                debug!("no configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("STACKCTL_DBNAME") {
            self.database.name = name;
        }
        if let Some(kind) = lookup("STACKCTL_SNAPSHOT_BACKEND") {
            self.snapshot.backend = BackendKind::from_str(kind.trim()).map_err(|_| {
                StackError::config(format!(
                    "unknown snapshot backend '{}', expected btrfs-volume or plain-copy",
                    kind
                ))
            })?;
        }
        if let Some(flag) = lookup("STACKCTL_NON_INTERACTIVE") {
            self.non_interactive = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(password) = lookup("PGPASSWORD") {
            self.database.connection.password = Some(password);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let name = self.database.name.trim();
        if name.is_empty() {
            return Err(StackError::config("database name must not be empty"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StackError::config(format!(
                "database name '{}' may only contain letters, digits, '_' and '-'",
                name
            )));
        }
        if self.application.addons_paths.is_empty() {
            return Err(StackError::config("at least one addons path is required"));
        }
        if self.application.catalog_refresh_unit.trim().is_empty() {
            return Err(StackError::config("catalog refresh unit must be set"));
        }
        if self.snapshot.backend == BackendKind::BtrfsVolume {
            if self.snapshot.volume_tool.is_empty() {
                return Err(StackError::config(
                    "btrfs-volume backend requires a volume tool command",
                ));
            }
            if self.snapshot.volume_name.trim().is_empty() {
                return Err(StackError::config("btrfs-volume backend requires a volume name"));
            }
        }
        Ok(())
    }
}
