//! Capability profile resolution.
//!
//! Optional diagnostics and persistence features are switched by a profile (`full`
//! or `lean`) plus one optional override per feature. Overrides are folded into the
//! profile once, at construction; everything downstream reads plain booleans.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base set of optional features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Everything on
    #[default]
    Full,
    /// Everything off
    Lean,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Lean => f.write_str("lean"),
        }
    }
}

/// Per-feature overrides as written in configuration; `None` means "profile default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_snapshot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_summary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidation_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_metrics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_diagnostics: Option<bool>,
}

/// Resolved feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub profile: Profile,
    /// Persist and restore discovery list snapshots (also enables preload and the
    /// shared in-process list cache)
    pub discovery_snapshot: bool,
    /// Persist the last warm-up summary
    pub warmup_summary: bool,
    /// Keep and persist invalidation history
    pub invalidation_history: bool,
    /// Report dynamic function/filter counts and names
    pub dynamic_metrics: bool,
    /// Include compiled/discovered name lists in diagnostics
    pub extended_diagnostics: bool,
}

impl Capabilities {
    pub fn for_profile(profile: Profile) -> Self {
        let on = profile == Profile::Full;
        Self {
            profile,
            discovery_snapshot: on,
            warmup_summary: on,
            invalidation_history: on,
            dynamic_metrics: on,
            extended_diagnostics: on,
        }
    }

    /// Apply `overrides` on top of the `profile` defaults.
    pub fn resolve(profile: Profile, overrides: &CapabilityOverrides) -> Self {
        let base = Self::for_profile(profile);
        Self {
            profile,
            discovery_snapshot: overrides.discovery_snapshot.unwrap_or(base.discovery_snapshot),
            warmup_summary: overrides.warmup_summary.unwrap_or(base.warmup_summary),
            invalidation_history: overrides.invalidation_history.unwrap_or(base.invalidation_history),
            dynamic_metrics: overrides.dynamic_metrics.unwrap_or(base.dynamic_metrics),
            extended_diagnostics: overrides.extended_diagnostics.unwrap_or(base.extended_diagnostics),
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::for_profile(Profile::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        let full = Capabilities::for_profile(Profile::Full);
        assert!(full.discovery_snapshot && full.extended_diagnostics);
        let lean = Capabilities::for_profile(Profile::Lean);
        assert!(!lean.discovery_snapshot && !lean.warmup_summary && !lean.dynamic_metrics);
    }

    #[test]
    fn test_overrides_win_over_profile() {
        let overrides = CapabilityOverrides {
            warmup_summary: Some(true),
            ..CapabilityOverrides::default()
        };
        let lean = Capabilities::resolve(Profile::Lean, &overrides);
        assert!(lean.warmup_summary);
        assert!(!lean.invalidation_history);

        let overrides = CapabilityOverrides {
            extended_diagnostics: Some(false),
            ..CapabilityOverrides::default()
        };
        let full = Capabilities::resolve(Profile::Full, &overrides);
        assert!(!full.extended_diagnostics);
        assert!(full.dynamic_metrics);
    }
}
