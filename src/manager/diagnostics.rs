//! Structured diagnostics snapshot.
//!
//! Base sections (render counters, cache, performance, capabilities, compile-index
//! medium) are always present. Every other section is included only when its
//! capability is on, so a lean profile stays minimal.

use super::TemplateManager;
use super::history::{InvalidationRecord, WarmupRecord};
use crate::artifact::CacheSetting;
use crate::config::Capabilities;
use crate::constants::DIAGNOSTICS_NAME_LIMIT;
use crate::discovery::DiscoveryStats;
use crate::registry::StackCounts;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheDiagnostics {
    pub enabled: bool,
    /// Artifact directory, filesystem backend only
    pub path: Option<PathBuf>,
    /// `"filesystem"` or `"service"`
    pub mode: &'static str,
    /// Key prefix, service backend only
    pub prefix: Option<String>,
    /// Entry expiry in seconds, service backend only
    pub ttl: Option<u64>,
    pub compiled_templates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceDiagnostics {
    pub total_render_time_ms: f64,
    pub avg_render_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryDiagnostics {
    #[serde(flatten)]
    pub stats: DiscoveryStats,
    pub persistence_medium: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarmupDiagnostics {
    pub last: Option<WarmupRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidationDiagnostics {
    pub last: Option<InvalidationRecord>,
    pub cumulative_removed: usize,
}

/// Name lists, each truncated to a fixed limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameLists {
    pub dynamic_functions: Vec<String>,
    pub dynamic_filters: Vec<String>,
    pub compiled_templates: Vec<String>,
    /// In-process discovery list; empty until something listed templates
    pub discovered_templates: Vec<String>,
}

/// Snapshot returned by [`TemplateManager::diagnostics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub renders: u64,
    pub last_render_view: Option<String>,
    pub environment_resets: u64,
    pub cache: CacheDiagnostics,
    pub performance: PerformanceDiagnostics,
    pub capabilities: Capabilities,
    /// Slot name -> storage medium
    pub persistence: BTreeMap<&'static str, &'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_functions: Option<StackCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_filters: Option<StackCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub names: Option<NameLists>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup: Option<WarmupDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidations: Option<InvalidationDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryDiagnostics>,
}

fn truncated<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
    items.into_iter().take(DIAGNOSTICS_NAME_LIMIT).map(|s| s.as_ref().to_string()).collect()
}

fn millis(duration: std::time::Duration) -> f64 {
    (duration.as_secs_f64() * 100_000.0).round() / 100.0
}

impl TemplateManager {
    /// Collect the diagnostics snapshot. Loads the compile index if needed but never
    /// triggers a discovery scan.
    pub fn diagnostics(&mut self) -> Diagnostics {
        self.load_compile_index();
        let caps = self.capabilities;
        let medium = self.sink.medium().as_str();

        let remote = matches!(self.cache, CacheSetting::Custom(_));
        let cache = CacheDiagnostics {
            enabled: self.is_cache_enabled(),
            path: self.cache_path().map(PathBuf::from),
            mode: self.artifacts.as_ref().map_or(medium, |cache| cache.backend_label()),
            prefix: remote.then(|| self.prefix.clone()),
            ttl: remote.then_some(self.config.cache.ttl_secs).filter(|ttl| *ttl > 0),
            compiled_templates: self.index.len(),
        };

        let average = if self.metrics.renders > 0 {
            self.metrics.total_time / u32::try_from(self.metrics.renders).unwrap_or(u32::MAX)
        } else {
            std::time::Duration::ZERO
        };
        let performance = PerformanceDiagnostics {
            total_render_time_ms: millis(self.metrics.total_time),
            avg_render_time_ms: millis(average),
        };

        let mut persistence = BTreeMap::from([("compile_index", medium)]);
        if caps.discovery_snapshot {
            persistence.insert("discovery_snapshot", medium);
        }
        if caps.warmup_summary {
            persistence.insert("warmup", medium);
        }
        if caps.invalidation_history {
            persistence.insert("invalidations", medium);
        }

        Diagnostics {
            renders: self.metrics.renders,
            last_render_view: self.metrics.last_view.clone(),
            environment_resets: self.metrics.environment_resets,
            cache,
            performance,
            capabilities: caps,
            persistence,
            dynamic_functions: caps.dynamic_metrics.then(|| self.registry.functions().counts()),
            dynamic_filters: caps.dynamic_metrics.then(|| self.registry.filters().counts()),
            names: caps.extended_diagnostics.then(|| NameLists {
                dynamic_functions: truncated(self.registry.functions().names()),
                dynamic_filters: truncated(self.registry.filters().names()),
                compiled_templates: truncated(self.index.names()),
                discovered_templates: truncated(self.discovery.cached_names().unwrap_or_default()),
            }),
            warmup: caps.warmup_summary.then(|| WarmupDiagnostics {
                last: self.last_warmup.clone(),
            }),
            invalidations: caps.invalidation_history.then(|| InvalidationDiagnostics {
                last: self.invalidations.last.clone(),
                cumulative_removed: self.invalidations.cumulative,
            }),
            discovery: caps.discovery_snapshot.then(|| DiscoveryDiagnostics {
                stats: self.discovery.stats(),
                persistence_medium: medium,
            }),
        }
    }
}
