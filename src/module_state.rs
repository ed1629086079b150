//! Module State Store
//!
//! Reads and updates the application's installation-state table
//! (`ir_module_module`). Nothing is cached between calls: batch processes and
//! the application itself change this table concurrently, so every method is
//! a fresh round trip.
//!
//! # States
//!
//! ```text
//! uninstalled ──install──▶ to install ──commit──▶ installed
//!                                                  │   ▲
//!                                          upgrade ▼   │ commit
//!                                               to upgrade
//! ```
//!
//! `to install`, `to upgrade` and `uninstallable` left behind by an
//! interrupted run are *dangling*. `not present` is never stored; it is how
//! the reconciler names a unit the catalog does not know.

use crate::error::{Result, StackError};
use crate::sql::{SqlGateway, quote_literal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// Installation state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum ModuleState {
    #[strum(to_string = "not present", serialize = "not_present")]
    NotPresent,
    #[strum(to_string = "uninstalled")]
    Uninstalled,
    #[strum(to_string = "to install", serialize = "to_install")]
    ToInstall,
    #[strum(to_string = "installed")]
    Installed,
    #[strum(to_string = "to upgrade", serialize = "to_upgrade")]
    ToUpgrade,
    #[strum(to_string = "to remove", serialize = "to_remove")]
    ToRemove,
    #[strum(to_string = "uninstallable")]
    Uninstallable,
}

impl ModuleState {
    /// Transitional or broken states left behind by an incomplete operation.
    pub const DANGLING: [ModuleState; 3] = [Self::ToInstall, Self::ToUpgrade, Self::Uninstallable];

    pub fn is_dangling(self) -> bool {
        Self::DANGLING.contains(&self)
    }

    /// Value as stored in the state table.
    pub fn as_db_str(self) -> String {
        self.to_string()
    }
}

/// A unit stuck in a dangling state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DanglingUnit {
    pub name: String,
    pub state: ModuleState,
}

impl std::fmt::Display for DanglingUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.state)
    }
}

/// Access to the installation-state table.
pub trait ModuleStates {
    /// State of `name`, or `None` if the catalog does not list it.
    fn lookup(&self, name: &str) -> Result<Option<ModuleState>>;

    /// All catalogued units and their states.
    fn all_states(&self) -> Result<BTreeMap<String, ModuleState>>;

    /// Units in a dangling state, ordered by name.
    fn list_dangling(&self) -> Result<Vec<DanglingUnit>>;

    /// Direct override, reserved for explicit abort/repair operations.
    fn set_state(&self, name: &str, state: ModuleState) -> Result<()>;

    /// Roll back an interrupted batch: `to upgrade → installed`,
    /// `to install → uninstalled`.
    fn abort_upgrade(&self) -> Result<()>;

    /// Units flagged `auto_install` that are currently `uninstalled`, by name.
    fn auto_install_candidates(&self) -> Result<Vec<String>>;

    /// Units that are installed, transitional or flagged `auto_install`.
    fn units_in_use(&self) -> Result<Vec<String>>;

    /// `uninstalled` units that an installed or transitional unit depends on.
    fn uninstalled_dependencies(&self) -> Result<Vec<String>>;

    /// Set `name` to `uninstalled` and clear its `auto_install` flag.
    fn retire(&self, name: &str) -> Result<()>;

    /// Number of units per state.
    fn state_counts(&self) -> Result<Vec<(String, u64)>>;

    /// Locale codes active in the application.
    fn active_locales(&self) -> Result<Vec<String>>;

    /// State of `name`; fails with `NotFound` if the catalog does not list it.
    fn get_state(&self, name: &str) -> Result<ModuleState> {
        self.lookup(name)?
            .ok_or_else(|| StackError::NotFound(name.to_string()))
    }

    fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.lookup(name)? == Some(ModuleState::Installed))
    }
}

/// State store backed by the application's own tables.
pub struct SqlModuleStore<G: SqlGateway> {
    gateway: G,
}

impl<G: SqlGateway> SqlModuleStore<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    fn names(&self, sql: &str) -> Result<Vec<String>> {
        Ok(self
            .gateway
            .query(sql)?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }
}

fn parse_state(raw: &str) -> Result<ModuleState> {
    ModuleState::from_str(raw.trim())
        .map_err(|_| StackError::sql(format!("unknown module state '{}'", raw)))
}

fn dangling_sql_list() -> String {
    ModuleState::DANGLING
        .iter()
        .map(|s| quote_literal(&s.as_db_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl<G: SqlGateway> ModuleStates for SqlModuleStore<G> {
    fn lookup(&self, name: &str) -> Result<Option<ModuleState>> {
        let rows = self.gateway.query(&format!(
            "SELECT state FROM ir_module_module WHERE name = {};",
            quote_literal(name)
        ))?;
        rows.first()
            .and_then(|row| row.first())
            .map(|raw| parse_state(raw))
            .transpose()
    }

    fn all_states(&self) -> Result<BTreeMap<String, ModuleState>> {
        self.gateway
            .query("SELECT name, state FROM ir_module_module;")?
            .into_iter()
            .filter(|row| row.len() >= 2)
            .map(|row| Ok((row[0].clone(), parse_state(&row[1])?)))
            .collect()
    }

    fn list_dangling(&self) -> Result<Vec<DanglingUnit>> {
        let rows = self.gateway.query(&format!(
            "SELECT name, state FROM ir_module_module WHERE state IN ({}) ORDER BY name;",
            dangling_sql_list()
        ))?;
        let mut dangling = rows
            .into_iter()
            .filter(|row| row.len() >= 2)
            .map(|row| {
                Ok(DanglingUnit {
                    state: parse_state(&row[1])?,
                    name: row[0].clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        // Database collation may differ from byte order.
        dangling.sort();
        dangling.dedup_by(|a, b| a.name == b.name);
        Ok(dangling)
    }

    fn set_state(&self, name: &str, state: ModuleState) -> Result<()> {
        if state == ModuleState::NotPresent {
            return Err(StackError::sql(format!(
                "'{}' is not a storable state for {}",
                state, name
            )));
        }
        self.gateway.execute(&format!(
            "UPDATE ir_module_module SET state = {} WHERE name = {};",
            quote_literal(&state.as_db_str()),
            quote_literal(name)
        ))
    }

    fn abort_upgrade(&self) -> Result<()> {
        self.gateway.execute(
            "UPDATE ir_module_module SET state = 'installed' WHERE state = 'to upgrade'; \
             UPDATE ir_module_module SET state = 'uninstalled' WHERE state = 'to install';",
        )
    }

    fn auto_install_candidates(&self) -> Result<Vec<String>> {
        self.names(
            "SELECT name FROM ir_module_module \
             WHERE auto_install = true AND state = 'uninstalled' ORDER BY name;",
        )
    }

    fn units_in_use(&self) -> Result<Vec<String>> {
        self.names(
            "SELECT name FROM ir_module_module \
             WHERE state IN ('installed', 'to install', 'to upgrade') OR auto_install = true \
             ORDER BY name;",
        )
    }

    fn uninstalled_dependencies(&self) -> Result<Vec<String>> {
        self.names(
            "SELECT DISTINCT dep.name FROM ir_module_module_dependency d \
             JOIN ir_module_module m ON m.id = d.module_id \
             JOIN ir_module_module dep ON dep.name = d.name \
             WHERE dep.state = 'uninstalled' \
             AND m.state IN ('installed', 'to install', 'to upgrade') \
             ORDER BY dep.name;",
        )
    }

    fn retire(&self, name: &str) -> Result<()> {
        self.gateway.execute(&format!(
            "UPDATE ir_module_module SET auto_install = false, state = 'uninstalled' WHERE name = {};",
            quote_literal(name)
        ))
    }

    fn state_counts(&self) -> Result<Vec<(String, u64)>> {
        self.gateway
            .query("SELECT state, count(*) FROM ir_module_module GROUP BY state ORDER BY state;")?
            .into_iter()
            .filter(|row| row.len() >= 2)
            .map(|row| {
                let count = row[1]
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| StackError::sql(format!("bad count '{}': {}", row[1], e)))?;
                Ok((row[0].clone(), count))
            })
            .collect()
    }

    fn active_locales(&self) -> Result<Vec<String>> {
        self.names("SELECT code FROM res_lang WHERE active = true ORDER BY code;")
    }
}
