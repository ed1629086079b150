//! Property-Based Tests for stackctl
//!
//! Uses proptest for invariants that hold over arbitrary inputs:
//! - State enum string round-trips and dangling classification
//! - Target list normalisation
//! - Auto-install eligibility in both directions
//! - Timestamps embedded in snapshot ids

use proptest::prelude::*;
use stackctl::error::{Result, StackError};
use stackctl::manifest::ManifestSource;
use stackctl::module_state::ModuleState;
use stackctl::reconciler::{auto_install_eligible, normalize_targets};
use stackctl::snapshot::{TIMESTAMP_FORMAT, parse_timestamp};
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// ModuleState
// =============================================================================

fn state_strategy() -> impl Strategy<Value = ModuleState> {
    prop_oneof![
        Just(ModuleState::NotPresent),
        Just(ModuleState::Uninstalled),
        Just(ModuleState::ToInstall),
        Just(ModuleState::Installed),
        Just(ModuleState::ToUpgrade),
        Just(ModuleState::ToRemove),
        Just(ModuleState::Uninstallable),
    ]
}

proptest! {
    /// ModuleState: to_string → parse round-trip is identity
    #[test]
    fn module_state_roundtrip(state in state_strategy()) {
        let parsed: ModuleState = state.to_string().parse().expect("Should parse");
        prop_assert_eq!(state, parsed);
    }

    /// Exactly the three transitional/broken states are dangling
    #[test]
    fn module_state_dangling_classification(state in state_strategy()) {
        let expected = matches!(
            state,
            ModuleState::ToInstall | ModuleState::ToUpgrade | ModuleState::Uninstallable
        );
        prop_assert_eq!(state.is_dangling(), expected);
    }
}

// =============================================================================
// Target normalisation
// =============================================================================

fn unit_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,8}"
}

proptest! {
    /// Every produced name is non-empty, separator-free and unique
    #[test]
    fn normalized_targets_are_clean(raw in prop::collection::vec("[a-z_, ]{0,20}", 0..6)) {
        let targets = normalize_targets(&raw);
        let mut seen = std::collections::BTreeSet::new();
        for t in &targets {
            prop_assert!(!t.is_empty());
            prop_assert!(!t.contains(',') && !t.contains(' '));
            prop_assert!(seen.insert(t.clone()), "duplicate {}", t);
        }
    }

    /// Joining names with commas and splitting again keeps first-seen order
    #[test]
    fn normalized_targets_preserve_order(names in prop::collection::vec(unit_name(), 1..8)) {
        let joined = names.join(",");
        let mut expected: Vec<String> = Vec::new();
        for n in &names {
            if !expected.contains(n) {
                expected.push(n.clone());
            }
        }
        prop_assert_eq!(normalize_targets([joined]), expected);
    }
}

// =============================================================================
// Auto-install eligibility
// =============================================================================

struct Deps(BTreeMap<String, Vec<String>>);

impl ManifestSource for Deps {
    fn dependencies(&self, unit: &str) -> Result<Vec<String>> {
        self.0
            .get(unit)
            .cloned()
            .ok_or_else(|| StackError::manifest(unit.to_string()))
    }

    fn translation_file(&self, _unit: &str, _locale: &str) -> Option<PathBuf> {
        None
    }

    fn has_manifest(&self, unit: &str) -> bool {
        self.0.contains_key(unit)
    }
}

proptest! {
    /// A candidate is eligible iff every dependency is installed
    #[test]
    fn auto_install_closure(
        dep_states in prop::collection::vec(state_strategy(), 0..6),
    ) {
        let mut states = BTreeMap::new();
        let mut deps = Vec::new();
        for (i, state) in dep_states.iter().enumerate() {
            let name = format!("dep{}", i);
            states.insert(name.clone(), *state);
            deps.push(name);
        }
        states.insert("glue".to_string(), ModuleState::Uninstalled);
        let manifests = Deps(BTreeMap::from([("glue".to_string(), deps)]));

        let eligible = auto_install_eligible(&["glue".to_string()], &states, &manifests);

        let all_installed = dep_states.iter().all(|s| *s == ModuleState::Installed);
        prop_assert_eq!(eligible == vec!["glue".to_string()], all_installed);
    }
}

// =============================================================================
// Snapshot timestamps
// =============================================================================

proptest! {
    /// Formatted timestamps parse back to the same second, with any suffix
    #[test]
    fn snapshot_timestamp_roundtrip(
        secs in 0i64..4_102_444_800,
        suffix in "(\\.[0-9]{1,6})?",
    ) {
        let at = chrono::DateTime::from_timestamp(secs, 0).expect("in range").naive_utc();
        let raw = format!("{}{}", at.format(TIMESTAMP_FORMAT), suffix);
        prop_assert_eq!(parse_timestamp(&raw), Some(at));
    }

    /// Arbitrary text never panics the parser
    #[test]
    fn snapshot_timestamp_total(raw in ".{0,40}") {
        let _ = parse_timestamp(&raw);
    }
}
