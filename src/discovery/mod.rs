//! Template discovery.
//!
//! Enumerates logical template names under the configured search roots and caches
//! the result at three levels:
//!
//! 1. in-process, bound to a context hash of (backend kind, extension, canonical roots)
//! 2. in the process-wide [`shared`] map, keyed by fingerprint
//! 3. in the persisted list snapshot, validated by fingerprint
//!
//! [`TemplateDiscovery::list_all`] resolves a request in this order:
//!
//! | Step | Condition | Source tag |
//! |------|-----------|------------|
//! | in-process hit | context hash matches | unchanged |
//! | preload reconciliation | preloaded snapshot, fingerprint matches | `persisted-preload` |
//! | shared / persisted restore | list persistence on, fingerprint matches | `shared` / `persisted` |
//! | full scan | otherwise | `scan` |
//!
//! Every failure along the way (unreadable directory, corrupt snapshot, unreachable
//! backend) degrades to the next step; the scan itself never fails.

pub mod fingerprint;
pub mod roots;
pub mod shared;

use crate::persistence::{PersistenceSink, Slot};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use walkdir::WalkDir;

pub use roots::{CanonicalRoots, SearchRoot, canonicalize, context_hash};

/// Behavior switches resolved from configuration and capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Persist `{fingerprint, list}` snapshots and restore from them
    pub persist_list: bool,
    /// Load the snapshot eagerly in [`TemplateDiscovery::load_persisted`]
    pub preload: bool,
    /// Use the process-wide shared list cache
    pub shared_memory: bool,
    /// Subdirectory depth sampled by the fingerprint
    pub fingerprint_depth: usize,
}

/// Where the current in-process list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheSource {
    Scan,
    Persisted,
    PersistedPreload,
    Shared,
}

impl CacheSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Persisted => "persisted",
            Self::PersistedPreload => "persisted-preload",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and cache state, as reported in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub cached: bool,
    pub count: Option<usize>,
    pub persisted_count: Option<usize>,
    pub fingerprint: Option<String>,
    pub cache_source: Option<CacheSource>,
}

/// Persisted form of the counters (`discovery-stats.json` / `disc.stats`).
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    hits: u64,
    #[serde(default)]
    misses: u64,
    #[serde(default)]
    invalidations: u64,
    #[serde(default)]
    cached: bool,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    persisted_count: Option<usize>,
    #[serde(default)]
    fingerprint: Option<String>,
}

/// Persisted list snapshot (`discovery-stats-list.json` / `disc.list`).
#[derive(Debug, Serialize, Deserialize)]
struct ListSnapshot {
    fingerprint: Option<String>,
    list: Vec<String>,
}

/// Discovery service: name enumeration plus its caches and counters.
#[derive(Debug, Default)]
pub struct TemplateDiscovery {
    settings: DiscoverySettings,
    cache: Option<Vec<String>>,
    context_hash: Option<String>,
    hits: u64,
    misses: u64,
    invalidations: u64,
    persisted_count: Option<usize>,
    persisted_fingerprint: Option<String>,
    cache_source: Option<CacheSource>,
    preloaded: bool,
}

impl TemplateDiscovery {
    pub fn new(settings: DiscoverySettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> DiscoverySettings {
        self.settings
    }

    pub fn configure(&mut self, settings: DiscoverySettings) {
        self.settings = settings;
    }

    /// Restore counters and fingerprint from `sink`; preload the list snapshot when
    /// both preload and list persistence are on and nothing is cached yet.
    pub fn load_persisted(&mut self, sink: &PersistenceSink) {
        if let Some(data) = sink.try_load::<PersistedStats>(Slot::DiscoveryStats) {
            self.hits = data.hits;
            self.misses = data.misses;
            self.invalidations = data.invalidations;
            if let Some(count) = data.persisted_count.or(data.count) {
                self.persisted_count = Some(count);
            }
            if data.fingerprint.is_some() {
                self.persisted_fingerprint = data.fingerprint;
            }
        }

        if self.settings.persist_list
            && self.settings.preload
            && self.cache.is_none()
            && let Some(list) = self.restore_snapshot(sink)
        {
            tracing::debug!("Preloaded {} template names from snapshot", list.len());
            self.cache = Some(list);
            self.cache_source = Some(CacheSource::Persisted);
            self.preloaded = true;
        }
    }

    /// Drop the in-process list. Persisted snapshots are left alone; they are
    /// rejected on the next fingerprint mismatch.
    pub fn invalidate(&mut self) {
        self.cache = None;
        self.context_hash = None;
        self.cache_source = None;
        self.preloaded = false;
        self.invalidations += 1;
    }

    /// Zero every counter and forget the in-process list and fingerprint.
    pub fn reset(&mut self) {
        *self = Self::new(self.settings);
    }

    /// The in-process list, if any.
    pub fn cached_names(&self) -> Option<&[String]> {
        self.cache.as_deref()
    }

    pub fn stats(&self) -> DiscoveryStats {
        DiscoveryStats {
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
            cached: self.cache.is_some(),
            count: self.cache.as_ref().map(Vec::len),
            persisted_count: self.persisted_count,
            fingerprint: self.persisted_fingerprint.clone(),
            cache_source: self.cache_source,
        }
    }

    /// Logical names (no extension, `@ns/` prefixed outside the main namespace)
    /// of every template under `roots`.
    ///
    /// An empty root set yields an empty list without touching any counter.
    pub fn list_all(
        &mut self,
        roots: &[SearchRoot],
        extension: &str,
        sink: Option<&PersistenceSink>,
    ) -> Vec<String> {
        if roots.is_empty() {
            return Vec::new();
        }
        let canonical = canonicalize(roots);
        let hash = context_hash(&canonical, extension);

        if let Some(names) = &self.cache
            && self.context_hash.as_deref() == Some(hash.as_str())
        {
            let names = names.clone();
            self.hits += 1;
            self.persist(sink);
            return names;
        }

        if self.cache.is_some() && self.context_hash.is_none() && self.preloaded {
            let current = fingerprint::compute(&canonical, self.settings.fingerprint_depth);
            if self.persisted_fingerprint.as_deref() == Some(current.as_str()) {
                self.context_hash = Some(hash);
                self.hits += 1;
                if self.cache_source == Some(CacheSource::Persisted) {
                    self.cache_source = Some(CacheSource::PersistedPreload);
                }
                self.persist(sink);
                return self.cache.clone().unwrap_or_default();
            }
            tracing::debug!("Preloaded snapshot is stale, rescanning");
        }

        if self.cache.is_none()
            && self.settings.persist_list
            && let Some(stored) = self.persisted_fingerprint.clone()
        {
            let current = fingerprint::compute(&canonical, self.settings.fingerprint_depth);
            if current == stored {
                let restored = if self.settings.shared_memory {
                    shared::fetch(&current).map(|names| (names, CacheSource::Shared))
                } else {
                    None
                };
                let restored = restored.or_else(|| {
                    sink.and_then(|s| self.restore_snapshot(s)).map(|names| (names, CacheSource::Persisted))
                });
                if let Some((names, source)) = restored {
                    tracing::debug!("Restored {} template names from {}", names.len(), source);
                    self.cache = Some(names.clone());
                    self.context_hash = Some(hash);
                    self.cache_source = Some(source);
                    self.preloaded = false;
                    self.hits += 1;
                    self.persist(sink);
                    return names;
                }
            }
        }

        self.misses += 1;
        let names = scan(&canonical, extension);
        tracing::debug!("Discovered {} templates by scanning", names.len());

        self.cache = Some(names.clone());
        self.context_hash = Some(hash);
        self.cache_source = Some(CacheSource::Scan);
        self.preloaded = false;
        if self.settings.persist_list {
            self.persisted_fingerprint =
                Some(fingerprint::compute(&canonical, self.settings.fingerprint_depth));
        }
        self.persist(sink);
        names
    }

    fn restore_snapshot(&self, sink: &PersistenceSink) -> Option<Vec<String>> {
        let snapshot = sink.try_load::<ListSnapshot>(Slot::DiscoveryList)?;
        if snapshot.fingerprint.is_none() || snapshot.fingerprint != self.persisted_fingerprint {
            return None;
        }
        Some(snapshot.list)
    }

    fn persist(&mut self, sink: Option<&PersistenceSink>) {
        let count = self.cache.as_ref().map(Vec::len);
        if count.is_some() {
            self.persisted_count = count;
        }

        if let Some(sink) = sink {
            let stats = PersistedStats {
                hits: self.hits,
                misses: self.misses,
                invalidations: self.invalidations,
                cached: self.cache.is_some(),
                count: count.or(self.persisted_count),
                persisted_count: self.persisted_count,
                fingerprint: self.persisted_fingerprint.clone(),
            };
            sink.try_save(Slot::DiscoveryStats, &stats);

            if self.settings.persist_list
                && let Some(list) = &self.cache
            {
                sink.try_save(
                    Slot::DiscoveryList,
                    &ListSnapshot {
                        fingerprint: self.persisted_fingerprint.clone(),
                        list: list.clone(),
                    },
                );
            }
        }

        if self.settings.shared_memory
            && let (Some(list), Some(fp)) = (&self.cache, &self.persisted_fingerprint)
        {
            shared::store(fp, list);
        }
    }
}

/// Walk every canonical root and collect logical names.
///
/// Entries are visited in file-name order. A name found under two roots of the same
/// namespace is reported once (the engine resolves it to the first root anyway).
fn scan(canonical: &CanonicalRoots, extension: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (namespace, paths) in canonical {
        for base in paths {
            let base = Path::new(base);
            if !base.is_dir() {
                continue;
            }
            for entry in WalkDir::new(base).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(base) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                let Some(stem) = relative.strip_suffix(extension) else {
                    continue;
                };
                if stem.is_empty() || stem.ends_with('/') {
                    continue;
                }
                let logical = if namespace == crate::constants::MAIN_NAMESPACE {
                    stem.to_string()
                } else {
                    crate::core::naming::qualify(Some(namespace), stem)
                };
                if seen.insert(logical.clone()) {
                    out.push(logical);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn fixture() -> TempDir {
        let temp = tempdir().unwrap();
        let views = temp.path().join("views");
        fs::create_dir_all(views.join("emails")).unwrap();
        fs::create_dir_all(temp.path().join("admin/users")).unwrap();
        fs::write(views.join("home.html"), "home").unwrap();
        fs::write(views.join("emails/welcome.html"), "hi").unwrap();
        fs::write(views.join("notes.txt"), "skip").unwrap();
        fs::write(temp.path().join("admin/users/list.html"), "list").unwrap();
        fs::create_dir_all(temp.path().join("state")).unwrap();
        temp
    }

    fn roots(temp: &TempDir) -> Vec<SearchRoot> {
        vec![
            SearchRoot::main(temp.path().join("views")),
            SearchRoot::namespaced("admin", temp.path().join("admin")),
        ]
    }

    fn persisting() -> DiscoverySettings {
        DiscoverySettings {
            persist_list: true,
            preload: true,
            shared_memory: false,
            fingerprint_depth: 0,
        }
    }

    #[test]
    fn test_scan_and_in_process_hit() {
        let temp = fixture();
        let mut discovery = TemplateDiscovery::new(DiscoverySettings::default());

        let first = discovery.list_all(&roots(&temp), ".html", None);
        assert_eq!(first, vec!["emails/welcome", "home", "@admin/users/list"]);
        assert_eq!(discovery.stats().misses, 1);
        assert_eq!(discovery.stats().hits, 0);

        let second = discovery.list_all(&roots(&temp), ".html", None);
        assert_eq!(first, second);
        let stats = discovery.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.cache_source, Some(CacheSource::Scan));
        assert_eq!(stats.count, Some(3));
    }

    #[test]
    fn test_empty_roots_leave_counters_alone() {
        let mut discovery = TemplateDiscovery::new(DiscoverySettings::default());
        assert!(discovery.list_all(&[], ".html", None).is_empty());
        assert_eq!(discovery.stats(), DiscoveryStats::default());
    }

    #[test]
    fn test_context_change_rescans() {
        let temp = fixture();
        let mut discovery = TemplateDiscovery::new(DiscoverySettings::default());
        discovery.list_all(&roots(&temp), ".html", None);
        let txt = discovery.list_all(&roots(&temp), ".txt", None);
        assert_eq!(txt, vec!["notes"]);
        assert_eq!(discovery.stats().misses, 2);
    }

    #[test]
    fn test_extension_change_with_snapshot_rescans() {
        let temp = fixture();
        let sink = PersistenceSink::filesystem(temp.path().join("state"));
        let mut discovery = TemplateDiscovery::new(persisting());

        let html = discovery.list_all(&roots(&temp), ".html", Some(&sink));
        assert!(html.contains(&"home".to_string()));
        let txt = discovery.list_all(&roots(&temp), ".txt", Some(&sink));
        assert_eq!(txt, vec!["notes"]);
        assert_eq!(discovery.stats().cache_source, Some(CacheSource::Scan));
        assert_eq!(discovery.stats().misses, 2);
    }

    #[test]
    fn test_invalidate_counts_and_rescans() {
        let temp = fixture();
        let mut discovery = TemplateDiscovery::new(DiscoverySettings::default());
        discovery.list_all(&roots(&temp), ".html", None);
        discovery.invalidate();
        assert!(discovery.cached_names().is_none());
        discovery.list_all(&roots(&temp), ".html", None);
        let stats = discovery.stats();
        assert_eq!(stats.invalidations, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_persisted_snapshot_restores_in_new_instance() {
        let temp = fixture();
        let sink = PersistenceSink::filesystem(temp.path().join("state"));

        let mut first = TemplateDiscovery::new(persisting());
        let names = first.list_all(&roots(&temp), ".html", Some(&sink));
        assert!(temp.path().join("state/discovery-stats-list.json").exists());

        // Preload path
        let mut second = TemplateDiscovery::new(persisting());
        second.load_persisted(&sink);
        assert_eq!(second.stats().cache_source, Some(CacheSource::Persisted));
        assert_eq!(second.list_all(&roots(&temp), ".html", Some(&sink)), names);
        let stats = second.stats();
        assert_eq!(stats.cache_source, Some(CacheSource::PersistedPreload));
        assert_eq!(stats.misses, 1, "misses restored from the first instance");

        // Fetch path (no preload)
        let mut third = TemplateDiscovery::new(DiscoverySettings {
            preload: false,
            ..persisting()
        });
        third.load_persisted(&sink);
        assert!(third.cached_names().is_none());
        assert_eq!(third.list_all(&roots(&temp), ".html", Some(&sink)), names);
        assert_eq!(third.stats().cache_source, Some(CacheSource::Persisted));
    }

    #[test]
    fn test_stale_fingerprint_forces_scan() {
        let temp = fixture();
        let sink = PersistenceSink::filesystem(temp.path().join("state"));
        let mut first = TemplateDiscovery::new(persisting());
        first.list_all(&roots(&temp), ".html", Some(&sink));

        // Adding a direct child changes the root mtime
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(temp.path().join("views/about.html"), "about").unwrap();

        let mut second = TemplateDiscovery::new(persisting());
        second.load_persisted(&sink);
        let names = second.list_all(&roots(&temp), ".html", Some(&sink));
        assert!(names.contains(&"about".to_string()));
        assert_eq!(second.stats().cache_source, Some(CacheSource::Scan));
    }

    #[test]
    #[serial]
    fn test_shared_memory_restore() {
        let temp = fixture();
        let settings = DiscoverySettings {
            shared_memory: true,
            preload: false,
            ..persisting()
        };
        let sink = PersistenceSink::filesystem(temp.path().join("state"));
        let mut first = TemplateDiscovery::new(settings);
        let names = first.list_all(&roots(&temp), ".html", Some(&sink));

        let mut second = TemplateDiscovery::new(settings);
        second.load_persisted(&sink);
        assert_eq!(second.list_all(&roots(&temp), ".html", Some(&sink)), names);
        assert_eq!(second.stats().cache_source, Some(CacheSource::Shared));
    }

    #[test]
    fn test_corrupt_snapshot_degrades_to_scan() {
        let temp = fixture();
        let sink = PersistenceSink::filesystem(temp.path().join("state"));
        let mut first = TemplateDiscovery::new(persisting());
        let names = first.list_all(&roots(&temp), ".html", Some(&sink));
        fs::write(temp.path().join("state/discovery-stats-list.json"), "garbage").unwrap();

        let mut second = TemplateDiscovery::new(persisting());
        second.load_persisted(&sink);
        assert_eq!(second.list_all(&roots(&temp), ".html", Some(&sink)), names);
        assert_eq!(second.stats().cache_source, Some(CacheSource::Scan));
    }
}
