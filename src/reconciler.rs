//! Desired-state reconciler for unit installation.
//!
//! Drives the installation-state table toward an [`UpdateRequest`] through
//! batch operations, in strictly this order:
//!
//! ```text
//! 1. catalog refresh gate   unknown targets → refresh catalog, else abort
//! 2. dangling check         demote uninstallable, repair or refuse the rest
//! 3. install pass           one batch for all targets not yet installed
//! 4. upgrade pass           one batch over the whole target set
//! 5. auto-install sweep     multi-unit runs only, single pass
//! 6. translation pass       optional, failures are per item
//! ```
//!
//! Each step commits through the application before the next one reads state.
//! Runs against the same database must be serialised by the caller; the state
//! table has no optimistic-concurrency protection.
//!
//! The sweep does not recurse: installing swept units may make further units
//! eligible, and those are only picked up by the next run.

use crate::batch::{BatchCommand, BatchInvoker};
use crate::error::StackError;
use crate::manifest::ManifestSource;
use crate::module_state::{DanglingUnit, ModuleState, ModuleStates};
use crate::prompt::Prompt;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sentinel the application understands as "every unit"; never a valid target.
pub const ALL_SENTINEL: &str = "all";

/// Failures surfaced by a reconciliation run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The catalog could not be refreshed, or a unit is still unknown after a refresh.
    #[error("catalog refresh failed for {units:?}: {reason}")]
    CatalogRefreshFailed { units: Vec<String>, reason: String },

    /// Units were left in transitional states by an earlier run.
    #[error("dangling units block the run: {}", format_dangling(.0))]
    DanglingState(Vec<DanglingUnit>),

    /// Units did not reach `installed` after their install batch.
    #[error("install verification failed for {units:?}: {reason}")]
    InstallVerificationFailed { units: Vec<String>, reason: String },

    /// The upgrade batch exited unsuccessfully.
    #[error("upgrade batch failed for {units:?}: {reason}")]
    UpdateBatchFailed { units: Vec<String>, reason: String },

    /// The request violates its own invariants.
    #[error("invalid update request: {0}")]
    InvalidRequest(String),

    /// A lower-level read or write failed. `units` is empty for table-wide queries.
    #[error("state store failure during {step}{}: {source}", for_units(.units))]
    Store {
        step: &'static str,
        units: Vec<String>,
        #[source]
        source: StackError,
    },
}

impl ReconcileError {
    /// Recoverable conditions the caller can act on without investigating a crash.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DanglingState(_))
    }
}

fn format_dangling(units: &[DanglingUnit]) -> String {
    units
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn for_units(units: &[String]) -> String {
    if units.is_empty() {
        String::new()
    } else {
        format!(" for {}", units.join(", "))
    }
}

fn store_err(step: &'static str) -> impl FnOnce(StackError) -> ReconcileError {
    move |source| ReconcileError::Store {
        step,
        units: Vec::new(),
        source,
    }
}

fn unit_store_err(step: &'static str, unit: &str) -> impl FnOnce(StackError) -> ReconcileError {
    let units = vec![unit.to_string()];
    move |source| ReconcileError::Store {
        step,
        units,
        source,
    }
}

/// What the run should do with the targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Install targets only; every target must not be installed yet.
    Install,
    /// Install whatever is missing, then upgrade the whole set.
    #[default]
    Upgrade,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Pass `--test-enable` to the upgrade batch.
    pub run_tests: bool,
    /// Re-import translation files with overwrite after the run.
    pub overwrite_translations: bool,
    /// Never ask; take the unattended default for every decision.
    pub non_interactive: bool,
    /// Proceed even if dangling units remain.
    pub allow_dangling: bool,
    /// Abort interrupted upgrades (`to upgrade → installed`,
    /// `to install → uninstalled`) before proceeding.
    pub repair_dangling: bool,
}

/// A validated reconciliation request.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    targets: Vec<String>,
    pub mode: UpdateMode,
    pub options: UpdateOptions,
}

impl UpdateRequest {
    /// Build a request from caller-given names.
    ///
    /// Each name may itself be a comma or whitespace separated list. Names
    /// are de-duplicated keeping first occurrence order. Empty target sets and
    /// the `all` sentinel are rejected.
    pub fn new<I, S>(targets: I, mode: UpdateMode, options: UpdateOptions) -> Result<Self, ReconcileError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets = normalize_targets(targets);
        if targets.iter().any(|t| t == ALL_SENTINEL) {
            return Err(ReconcileError::InvalidRequest(
                "updating 'all' is not allowed, name the units".into(),
            ));
        }
        if targets.is_empty() {
            return Err(ReconcileError::InvalidRequest("no units to update".into()));
        }
        Ok(Self {
            targets,
            mode,
            options,
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_single_unit(&self) -> bool {
        self.targets.len() == 1
    }
}

/// Split, trim and de-duplicate target names, preserving first occurrence.
pub fn normalize_targets<I, S>(targets: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for raw in targets {
        for name in raw
            .as_ref()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
        {
            if seen.insert(name.to_string()) {
                out.push(name.to_string());
            }
        }
    }
    out
}

/// A translation import that failed; the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationImportFailed {
    pub unit: String,
    pub locale: String,
    pub reason: String,
}

impl std::fmt::Display for TranslationImportFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "translation import failed for {} [{}]: {}",
            self.unit, self.locale, self.reason
        )
    }
}

/// Outcome of a successful run. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct UpdateResult {
    /// Targets (and swept units) that completed their batches.
    pub succeeded: BTreeSet<String>,
    /// Units that completed but had a non-fatal failure (translation import).
    pub failed: BTreeSet<String>,
    /// Dangling units observed after the run.
    pub dangling: Vec<DanglingUnit>,
    /// Units newly installed by the install pass, in request order.
    pub installed: Vec<String>,
    /// Units installed by the auto-install sweep.
    pub auto_installed: Vec<String>,
    pub translation_failures: Vec<TranslationImportFailed>,
    /// Human-readable log of what was done, in order.
    pub summary: Vec<String>,
}

/// Catalog units whose `auto_install` flag is set and whose whole dependency
/// list is installed.
///
/// Only membership matters; the batch installer orders units itself.
/// Candidates whose dependencies cannot be read are skipped.
pub fn auto_install_eligible(
    candidates: &[String],
    states: &BTreeMap<String, ModuleState>,
    manifests: &dyn ManifestSource,
) -> Vec<String> {
    let mut eligible: Vec<String> = candidates
        .iter()
        .filter(|unit| states.get(unit.as_str()) != Some(&ModuleState::Installed))
        .filter(|unit| match manifests.dependencies(unit) {
            Ok(deps) => deps
                .iter()
                .all(|d| states.get(d.as_str()) == Some(&ModuleState::Installed)),
            Err(e) => {
                warn!(unit = %unit, error = %e, "skipping auto-install candidate");
                false
            }
        })
        .cloned()
        .collect();
    eligible.sort();
    eligible.dedup();
    eligible
}

/// The reconciliation engine. Holds only borrowed collaborators.
pub struct Reconciler<'a> {
    states: &'a dyn ModuleStates,
    manifests: &'a dyn ManifestSource,
    invoker: &'a dyn BatchInvoker,
    prompt: &'a dyn Prompt,
    catalog_refresh_unit: String,
    base_locale: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        states: &'a dyn ModuleStates,
        manifests: &'a dyn ManifestSource,
        invoker: &'a dyn BatchInvoker,
        prompt: &'a dyn Prompt,
    ) -> Self {
        Self {
            states,
            manifests,
            invoker,
            prompt,
            catalog_refresh_unit: "update_module_list".into(),
            base_locale: "en_US".into(),
        }
    }

    pub fn with_catalog_refresh_unit(mut self, unit: impl Into<String>) -> Self {
        self.catalog_refresh_unit = unit.into();
        self
    }

    pub fn with_base_locale(mut self, locale: impl Into<String>) -> Self {
        self.base_locale = locale.into();
        self
    }

    /// Run the whole algorithm for `request`.
    pub fn update(&self, request: &UpdateRequest) -> Result<UpdateResult, ReconcileError> {
        let mut result = UpdateResult::default();
        info!(targets = %request.targets().join(","), mode = ?request.mode, "reconciliation started");

        // 1. catalog refresh gate
        let pending = self.ensure_catalog(request)?;

        // 2. dangling reconciliation
        self.reconcile_dangling(&request.options)?;

        // 3. install pass
        if !pending.is_empty() {
            self.install_batch(&pending)?;
            for unit in &pending {
                result.summary.push(format!("INSTALL {}", unit));
            }
            result.installed = pending;
        }

        if request.mode == UpdateMode::Upgrade {
            // 4. upgrade pass
            self.upgrade_batch(request.targets(), request.options.run_tests)?;
            for unit in request.targets() {
                result.summary.push(format!("UPDATE {}", unit));
            }
        }
        result.succeeded.extend(request.targets().iter().cloned());

        // 5. auto-install sweep, only after a full batch
        if request.mode == UpdateMode::Upgrade && !request.is_single_unit() {
            let swept = self.auto_install_sweep(&request.options)?;
            for unit in &swept {
                result.summary.push(format!("AUTO-INSTALL {}", unit));
            }
            result.succeeded.extend(swept.iter().cloned());
            result.auto_installed = swept;
        }

        // 6. translation pass
        if request.options.overwrite_translations {
            let units: Vec<String> = result.succeeded.iter().cloned().collect();
            result.translation_failures = self.import_translations(&units)?;
            result.failed = result
                .translation_failures
                .iter()
                .map(|f| f.unit.clone())
                .collect();
        }

        result.dangling = self
            .states
            .list_dangling()
            .map_err(store_err("post-run check"))?;
        if !result.dangling.is_empty() {
            warn!(dangling = %format_dangling(&result.dangling), "dangling units after run");
        }
        info!(succeeded = result.succeeded.len(), "reconciliation finished");
        Ok(result)
    }

    /// Targets not installed yet, refreshing the catalog once if any is unknown.
    fn ensure_catalog(&self, request: &UpdateRequest) -> Result<Vec<String>, ReconcileError> {
        let mut pending = Vec::new();
        let mut refreshed = false;

        for unit in request.targets() {
            let mut state = self
                .states
                .lookup(unit)
                .map_err(unit_store_err("catalog lookup", unit))?;

            if state.is_none() {
                if !refreshed {
                    info!(unit = %unit, "unit not in catalog, refreshing catalog");
                    self.refresh_catalog()?;
                    refreshed = true;
                }
                state = self
                    .states
                    .lookup(unit)
                    .map_err(unit_store_err("catalog lookup", unit))?;
                if state.is_none() {
                    return Err(ReconcileError::CatalogRefreshFailed {
                        units: vec![unit.clone()],
                        reason: "unit is still not listed after the catalog refresh".into(),
                    });
                }
            }

            match state {
                Some(ModuleState::Installed) if request.mode == UpdateMode::Install => {
                    return Err(ReconcileError::InvalidRequest(format!(
                        "'{}' is already installed",
                        unit
                    )));
                }
                Some(ModuleState::Installed) => {}
                _ => pending.push(unit.clone()),
            }
        }
        Ok(pending)
    }

    /// Install (if needed) and upgrade the catalog refresh unit.
    fn refresh_catalog(&self) -> Result<(), ReconcileError> {
        let unit = self.catalog_refresh_unit.clone();
        let failed = |reason: String| ReconcileError::CatalogRefreshFailed {
            units: vec![unit.clone()],
            reason,
        };

        let installed = self
            .states
            .is_installed(&unit)
            .map_err(unit_store_err("catalog refresh", &unit))?;
        if !installed {
            info!(unit = %unit, "catalog refresh unit missing, installing it");
            let output = self
                .invoker
                .run(&BatchCommand::Install {
                    units: vec![unit.clone()],
                })
                .map_err(|e| failed(e.to_string()))?;
            let now_installed = self
                .states
                .is_installed(&unit)
                .map_err(unit_store_err("catalog refresh", &unit))?;
            if !now_installed {
                return Err(failed(format!(
                    "refresh unit is not installable (exit code {}): {}",
                    output.exit_code.unwrap_or(-1),
                    output.stderr.trim()
                )));
            }
        }

        let output = self
            .invoker
            .run(&BatchCommand::Upgrade {
                units: vec![unit.clone()],
                run_tests: false,
            })
            .map_err(|e| failed(e.to_string()))?;
        if !output.success {
            return Err(failed(format!(
                "refresh batch exited with code {}: {}",
                output.exit_code.unwrap_or(-1),
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Demote uninstallable units, then repair or refuse remaining dangling units.
    ///
    /// The dangling list is re-read after every mutation instead of reusing an
    /// earlier listing.
    fn reconcile_dangling(&self, options: &UpdateOptions) -> Result<(), ReconcileError> {
        let dangling = self
            .states
            .list_dangling()
            .map_err(store_err("dangling check"))?;
        if dangling.is_empty() {
            return Ok(());
        }
        for unit in &dangling {
            warn!(unit = %unit.name, state = %unit.state, "dangling unit");
        }

        let uninstallable: Vec<&DanglingUnit> = dangling
            .iter()
            .filter(|u| u.state == ModuleState::Uninstallable)
            .collect();
        if !uninstallable.is_empty() {
            let names: Vec<&str> = uninstallable.iter().map(|u| u.name.as_str()).collect();
            let demote = options.non_interactive
                || self.prompt.confirm(&format!(
                    "Uninstallable units found ({}) - set them to 'uninstalled'?",
                    names.join(", ")
                ));
            if demote {
                for name in &names {
                    self.states
                        .set_state(name, ModuleState::Uninstalled)
                        .map_err(unit_store_err("uninstallable demotion", name))?;
                }
                info!(units = %names.join(","), "demoted uninstallable units");
            }
        }

        let mut remaining = self
            .states
            .list_dangling()
            .map_err(store_err("dangling check"))?;
        if !remaining.is_empty() && options.repair_dangling {
            info!("aborting interrupted upgrade to repair dangling units");
            self.states
                .abort_upgrade()
                .map_err(store_err("dangling repair"))?;
            remaining = self
                .states
                .list_dangling()
                .map_err(store_err("dangling check"))?;
        }

        if remaining.is_empty() {
            Ok(())
        } else if options.allow_dangling {
            debug!(dangling = %format_dangling(&remaining), "dangling units allowed by caller");
            Ok(())
        } else {
            Err(ReconcileError::DanglingState(remaining))
        }
    }

    /// One install batch for `units`, then verify each reached `installed`.
    fn install_batch(&self, units: &[String]) -> Result<(), ReconcileError> {
        let output = self
            .invoker
            .run(&BatchCommand::Install {
                units: units.to_vec(),
            })
            .map_err(|e| ReconcileError::InstallVerificationFailed {
                units: units.to_vec(),
                reason: e.to_string(),
            })?;
        if !output.success {
            warn!(
                code = output.exit_code.unwrap_or(-1),
                "install batch exited unsuccessfully, verifying states"
            );
        }

        let mut missing = Vec::new();
        for unit in units {
            if !self
                .states
                .is_installed(unit)
                .map_err(unit_store_err("install verification", unit))?
            {
                missing.push(unit.clone());
            }
        }
        if !missing.is_empty() {
            let reason = if output.success {
                "batch succeeded but the units are not installed".to_string()
            } else {
                format!(
                    "batch exited with code {}: {}",
                    output.exit_code.unwrap_or(-1),
                    output.stderr.trim()
                )
            };
            return Err(ReconcileError::InstallVerificationFailed {
                units: missing,
                reason,
            });
        }
        Ok(())
    }

    fn upgrade_batch(&self, units: &[String], run_tests: bool) -> Result<(), ReconcileError> {
        let failed = |reason: String| ReconcileError::UpdateBatchFailed {
            units: units.to_vec(),
            reason,
        };
        let output = self
            .invoker
            .run(&BatchCommand::Upgrade {
                units: units.to_vec(),
                run_tests,
            })
            .map_err(|e| failed(e.to_string()))?;
        if !output.success {
            return Err(failed(format!(
                "batch exited with code {}: {}",
                output.exit_code.unwrap_or(-1),
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Install auto-install units whose dependencies are now satisfied.
    fn auto_install_sweep(&self, options: &UpdateOptions) -> Result<Vec<String>, ReconcileError> {
        let candidates = self
            .states
            .auto_install_candidates()
            .map_err(store_err("auto-install sweep"))?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let states = self
            .states
            .all_states()
            .map_err(store_err("auto-install sweep"))?;
        let eligible = auto_install_eligible(&candidates, &states, self.manifests);
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        info!(units = %eligible.join(","), "auto-installable units became eligible");
        if !options.non_interactive
            && !self.prompt.confirm(&format!(
                "Install auto-installable units {}?",
                eligible.join(",")
            ))
        {
            info!("auto-install sweep declined");
            return Ok(Vec::new());
        }

        self.install_batch(&eligible)?;
        Ok(eligible)
    }

    /// Import translation files with overwrite for every installed unit and
    /// every active locale except the base one.
    fn import_translations(
        &self,
        units: &[String],
    ) -> Result<Vec<TranslationImportFailed>, ReconcileError> {
        let locales: Vec<String> = self
            .states
            .active_locales()
            .map_err(store_err("translation pass"))?
            .into_iter()
            .filter(|l| *l != self.base_locale)
            .collect();

        let mut failures = Vec::new();
        for unit in units {
            if !self
                .states
                .is_installed(unit)
                .map_err(unit_store_err("translation pass", unit))?
            {
                continue;
            }
            for locale in &locales {
                let Some(file) = self.manifests.translation_file(unit, locale) else {
                    continue;
                };
                if let Err(reason) = self.import_one(unit, locale, file) {
                    let failure = TranslationImportFailed {
                        unit: unit.clone(),
                        locale: locale.clone(),
                        reason,
                    };
                    warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }
        Ok(failures)
    }

    fn import_one(&self, unit: &str, locale: &str, file: PathBuf) -> Result<(), String> {
        info!(unit, locale, file = %file.display(), "importing translation");
        let output = self
            .invoker
            .run(&BatchCommand::ImportTranslation {
                unit: unit.to_string(),
                locale: locale.to_string(),
                file,
            })
            .map_err(|e| e.to_string())?;
        if output.success {
            Ok(())
        } else {
            Err(format!(
                "exit code {}: {}",
                output.exit_code.unwrap_or(-1),
                output.stderr.trim()
            ))
        }
    }

    /// Re-import translations for `targets` without any install or upgrade
    /// batch. Empty `targets` fall back to [`Self::default_targets`].
    pub fn update_translations(&self, targets: &[String]) -> Result<UpdateResult, ReconcileError> {
        let mut units = normalize_targets(targets);
        if units.is_empty() {
            units = self.default_targets()?;
        }
        if units.iter().any(|t| t == ALL_SENTINEL) {
            return Err(ReconcileError::InvalidRequest(
                "updating 'all' is not allowed, name the units".into(),
            ));
        }
        if units.is_empty() {
            return Err(ReconcileError::InvalidRequest("no units to update".into()));
        }
        info!(targets = %units.join(","), "translation update started");

        let mut result = UpdateResult {
            translation_failures: self.import_translations(&units)?,
            ..UpdateResult::default()
        };
        result.failed = result
            .translation_failures
            .iter()
            .map(|f| f.unit.clone())
            .collect();
        for unit in units {
            if !result.failed.contains(&unit) {
                result.summary.push(format!("I18N {}", unit));
                result.succeeded.insert(unit);
            }
        }
        Ok(result)
    }

    /// Units a run works on when none are named: the project's update list
    /// plus `uninstalled` units that installed units depend on.
    pub fn default_targets(&self) -> Result<Vec<String>, ReconcileError> {
        let mut targets = self
            .manifests
            .update_list()
            .map_err(store_err("default targets"))?;
        targets.extend(
            self.states
                .uninstalled_dependencies()
                .map_err(store_err("default targets"))?,
        );
        Ok(normalize_targets(targets))
    }

    /// Explicit targets (or [`Self::default_targets`] when none are given)
    /// plus, on request, every installed and/or dangling unit.
    pub fn expand_targets(
        &self,
        explicit: &[String],
        include_installed: bool,
        include_dangling: bool,
    ) -> Result<Vec<String>, ReconcileError> {
        let mut targets = normalize_targets(explicit);
        if targets.is_empty() {
            targets = self.default_targets()?;
        }
        if include_installed {
            let states = self
                .states
                .all_states()
                .map_err(store_err("target expansion"))?;
            targets.extend(
                states
                    .into_iter()
                    .filter(|(_, s)| *s == ModuleState::Installed)
                    .map(|(name, _)| name),
            );
        }
        if include_dangling {
            targets.extend(
                self.states
                    .list_dangling()
                    .map_err(store_err("target expansion"))?
                    .into_iter()
                    .map(|u| u.name),
            );
        }
        Ok(normalize_targets(targets))
    }

    /// Current dangling units; an error unless `suppress_error`.
    pub fn check_install_state(
        &self,
        suppress_error: bool,
    ) -> Result<Vec<DanglingUnit>, ReconcileError> {
        let dangling = self
            .states
            .list_dangling()
            .map_err(store_err("install state"))?;
        if !dangling.is_empty() && !suppress_error {
            return Err(ReconcileError::DanglingState(dangling));
        }
        Ok(dangling)
    }

    /// Units still referenced by the state table whose sources are gone.
    ///
    /// `base` is never considered.
    pub fn orphaned_units(&self) -> Result<Vec<String>, ReconcileError> {
        Ok(self
            .states
            .units_in_use()
            .map_err(store_err("orphan scan"))?
            .into_iter()
            .filter(|u| u != "base" && !self.manifests.has_manifest(u))
            .collect())
    }

    /// Set every orphaned unit to `uninstalled` with `auto_install` cleared,
    /// after confirmation unless `non_interactive`.
    pub fn retire_orphaned_units(&self, non_interactive: bool) -> Result<Vec<String>, ReconcileError> {
        let orphans = self.orphaned_units()?;
        if orphans.is_empty() {
            return Ok(orphans);
        }
        if !non_interactive
            && !self.prompt.confirm(&format!(
                "Set {} to uninstalled?",
                orphans.join(", ")
            ))
        {
            return Ok(Vec::new());
        }
        for unit in &orphans {
            self.states
                .retire(unit)
                .map_err(unit_store_err("orphan retirement", unit))?;
            info!(unit = %unit, "set unit to uninstalled");
        }
        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_targets_splits_and_dedups() {
        let targets = normalize_targets(["sale,stock", "crm  sale", "", "stock,,purchase"]);
        assert_eq!(targets, vec!["sale", "stock", "crm", "purchase"]);
    }

    #[test]
    fn test_request_rejects_all_and_empty() {
        let err = UpdateRequest::new(["sale,all"], UpdateMode::Upgrade, UpdateOptions::default())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidRequest(_)));

        let err = UpdateRequest::new([" , "], UpdateMode::Upgrade, UpdateOptions::default())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidRequest(_)));
    }

    #[test]
    fn test_single_unit_detection() {
        let req = UpdateRequest::new(["sale"], UpdateMode::Upgrade, UpdateOptions::default()).unwrap();
        assert!(req.is_single_unit());
        let req = UpdateRequest::new(["sale,sale"], UpdateMode::Upgrade, UpdateOptions::default())
            .unwrap();
        assert!(req.is_single_unit());
        let req = UpdateRequest::new(["sale,stock"], UpdateMode::Upgrade, UpdateOptions::default())
            .unwrap();
        assert!(!req.is_single_unit());
    }

    #[test]
    fn test_dangling_error_names_units() {
        let err = ReconcileError::DanglingState(vec![DanglingUnit {
            name: "stock".into(),
            state: ModuleState::ToUpgrade,
        }]);
        assert!(err.to_string().contains("stock: to upgrade"));
        assert!(err.is_recoverable());
    }
}
