//! Unit manifests on disk.
//!
//! Each unit is a directory under one of the configured addons paths holding
//! a `__manifest__.py` (or the legacy `__openerp__.py`) dict literal. Only the
//! `depends` list is read here; the file is never written.
//!
//! Translation resources live next to the manifest as `i18n/<locale>.po`,
//! with the bare language (`de.po` for `de_DE`) as fallback.
//!
//! The project itself may carry a manifest of the same shape whose `install`
//! list names the units a bare `module update` works on.

use crate::error::{Result, StackError};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

const MANIFEST_NAMES: &[&str] = &["__manifest__.py", "__openerp__.py"];

/// Read-only view on unit sources used by the reconciler.
pub trait ManifestSource {
    /// Declared dependency list of `unit`, in manifest order.
    fn dependencies(&self, unit: &str) -> Result<Vec<String>>;

    /// Translation file for `(unit, locale)` if one exists on disk.
    fn translation_file(&self, unit: &str, locale: &str) -> Option<PathBuf>;

    /// Whether any addons path still contains the unit.
    fn has_manifest(&self, unit: &str) -> bool;

    /// Units the project updates when none are named.
    fn update_list(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Manifest lookup over an ordered list of addons paths.
#[derive(Debug, Clone)]
pub struct AddonsManifests {
    addons_paths: Vec<PathBuf>,
    project_manifest: Option<PathBuf>,
}

impl AddonsManifests {
    pub fn new(addons_paths: Vec<PathBuf>) -> Self {
        Self {
            addons_paths,
            project_manifest: None,
        }
    }

    pub fn with_project_manifest(mut self, path: Option<PathBuf>) -> Self {
        self.project_manifest = path;
        self
    }

    /// First `(unit dir, manifest file)` found across the addons paths.
    fn locate(&self, unit: &str) -> Option<(PathBuf, PathBuf)> {
        self.addons_paths.iter().find_map(|base| {
            let dir = base.join(unit);
            MANIFEST_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.is_file())
                .map(|manifest| (dir, manifest))
        })
    }
}

impl ManifestSource for AddonsManifests {
    fn dependencies(&self, unit: &str) -> Result<Vec<String>> {
        let (_, manifest) = self.locate(unit).ok_or_else(|| {
            StackError::manifest(format!("no manifest for unit '{}' in any addons path", unit))
        })?;
        let content = fs::read_to_string(&manifest)?;
        let deps = parse_depends(&content);
        debug!(unit, ?deps, "read manifest dependencies");
        Ok(deps)
    }

    fn translation_file(&self, unit: &str, locale: &str) -> Option<PathBuf> {
        let (dir, _) = self.locate(unit)?;
        translation_candidates(&dir, locale)
            .into_iter()
            .find(|p| p.is_file())
    }

    fn has_manifest(&self, unit: &str) -> bool {
        self.locate(unit).is_some()
    }

    fn update_list(&self) -> Result<Vec<String>> {
        let Some(path) = &self.project_manifest else {
            return Ok(Vec::new());
        };
        let content = fs::read_to_string(path).map_err(|e| {
            StackError::manifest(format!("cannot read project manifest {}: {}", path.display(), e))
        })?;
        let units = parse_list(install_regex(), &content);
        debug!(?units, "read project update list");
        Ok(units)
    }
}

fn translation_candidates(unit_dir: &Path, locale: &str) -> Vec<PathBuf> {
    let i18n = unit_dir.join("i18n");
    let mut candidates = vec![i18n.join(format!("{}.po", locale))];
    if let Some((lang, _)) = locale.split_once('_') {
        candidates.push(i18n.join(format!("{}.po", lang)));
    }
    candidates
}

fn depends_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)['"]depends['"]\s*:\s*[\[(](.*?)[\])]"#).expect("valid depends regex")
    })
}

fn install_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)['"]install['"]\s*:\s*[\[(](.*?)[\])]"#).expect("valid install regex")
    })
}

fn quoted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("valid quoted regex"))
}

/// Extract the `depends` entries from a manifest dict literal.
///
/// Full-line `#` comments are ignored. A manifest without `depends` has no
/// dependencies.
pub fn parse_depends(content: &str) -> Vec<String> {
    parse_list(depends_regex(), content)
}

fn parse_list(list: &Regex, content: &str) -> Vec<String> {
    let stripped: String = content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let Some(caps) = list.captures(&stripped) else {
        return Vec::new();
    };
    quoted_regex()
        .captures_iter(&caps[1])
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
