//! Best-effort persistence of metadata blobs.
//!
//! Discovery counters, list snapshots, the compile index, the warm-up summary and the
//! invalidation history are all caches of re-derivable facts. They are written as
//! JSON, last writer wins, with no locking. [`PersistenceSink`] is the single place that
//! knows where each blob lives and that swallows (and logs) storage failures, so
//! callers only see `bool` / `Option` results.
//!
//! # Layout
//!
//! | Slot | Filesystem backend | Remote backend |
//! |------|--------------------|----------------|
//! | [`Slot::DiscoveryStats`] | `<dir>/discovery-stats.json` | `<prefix>disc.stats` |
//! | [`Slot::DiscoveryList`] | `<dir>/discovery-stats-list.json` | `<prefix>disc.list` |
//! | [`Slot::CompileIndex`] | `<dir>/compile-index.json` | `<prefix>compile.index` |
//! | [`Slot::WarmupSummary`] | `<dir>/warmup-summary.json` | `<prefix>warmup.summary` |
//! | [`Slot::Invalidations`] | `<dir>/invalidations.json` | `<prefix>invalidations` |

use crate::artifact::{KeyValueStore, normalize_prefix};
use crate::constants::state_files::*;
use crate::utils::fs::atomic_write;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A named metadata blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    DiscoveryStats,
    DiscoveryList,
    CompileIndex,
    WarmupSummary,
    Invalidations,
}

impl Slot {
    pub const ALL: [Slot; 5] = [
        Slot::DiscoveryStats,
        Slot::DiscoveryList,
        Slot::CompileIndex,
        Slot::WarmupSummary,
        Slot::Invalidations,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::DiscoveryStats => DISCOVERY_STATS_FILE,
            Self::DiscoveryList => DISCOVERY_LIST_FILE,
            Self::CompileIndex => COMPILE_INDEX_FILE,
            Self::WarmupSummary => WARMUP_SUMMARY_FILE,
            Self::Invalidations => INVALIDATIONS_FILE,
        }
    }

    pub fn key_suffix(self) -> &'static str {
        match self {
            Self::DiscoveryStats => DISCOVERY_STATS_KEY,
            Self::DiscoveryList => DISCOVERY_LIST_KEY,
            Self::CompileIndex => COMPILE_INDEX_KEY,
            Self::WarmupSummary => WARMUP_SUMMARY_KEY,
            Self::Invalidations => INVALIDATIONS_KEY,
        }
    }
}

/// Where metadata blobs are stored.
#[derive(Clone)]
pub enum StorageBackend {
    /// One JSON file per slot inside `dir`.
    Filesystem { dir: PathBuf },
    /// One key per slot in a key-value service.
    Remote {
        store: Arc<dyn KeyValueStore>,
        prefix: String,
        ttl: Option<Duration>,
    },
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem {
                dir,
            } => f.debug_struct("Filesystem").field("dir", dir).finish(),
            Self::Remote {
                prefix,
                ttl,
                ..
            } => f.debug_struct("Remote").field("prefix", prefix).field("ttl", ttl).finish(),
        }
    }
}

/// Storage medium label shown in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Filesystem,
    Remote,
}

impl Medium {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Remote => "service",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Try-save / try-load access to metadata slots.
#[derive(Debug, Clone)]
pub struct PersistenceSink {
    backend: StorageBackend,
}

impl PersistenceSink {
    pub fn new(backend: StorageBackend) -> Self {
        Self {
            backend,
        }
    }

    pub fn filesystem(dir: impl Into<PathBuf>) -> Self {
        Self::new(StorageBackend::Filesystem {
            dir: dir.into(),
        })
    }

    pub fn remote(store: Arc<dyn KeyValueStore>, prefix: &str, ttl: Option<Duration>) -> Self {
        Self::new(StorageBackend::Remote {
            store,
            prefix: normalize_prefix(prefix),
            ttl: ttl.filter(|d| !d.is_zero()),
        })
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    pub fn medium(&self) -> Medium {
        match self.backend {
            StorageBackend::Filesystem {
                ..
            } => Medium::Filesystem,
            StorageBackend::Remote {
                ..
            } => Medium::Remote,
        }
    }

    /// File path or key of `slot`. Also the memoization key of loaders.
    pub fn locator(&self, slot: Slot) -> String {
        match &self.backend {
            StorageBackend::Filesystem {
                dir,
            } => dir.join(slot.file_name()).to_string_lossy().into_owned(),
            StorageBackend::Remote {
                prefix,
                ..
            } => format!("{prefix}{}", slot.key_suffix()),
        }
    }

    /// Serialize and store `value`. Returns whether the write happened.
    ///
    /// Filesystem writes are skipped (not an error) when the directory is missing,
    /// which keeps read-only deployments working.
    pub fn try_save<T: Serialize>(&self, slot: Slot, value: &T) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Could not serialize {:?}: {}", slot, e);
                return false;
            }
        };
        self.try_save_raw(slot, &json)
    }

    fn try_save_raw(&self, slot: Slot, json: &str) -> bool {
        match &self.backend {
            StorageBackend::Filesystem {
                dir,
            } => {
                if !dir.is_dir() {
                    tracing::debug!("Skipping {:?} persistence, {} does not exist", slot, dir.display());
                    return false;
                }
                let path = dir.join(slot.file_name());
                match atomic_write(&path, json.as_bytes()) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!("Could not persist {}: {:#}", path.display(), e);
                        false
                    }
                }
            }
            StorageBackend::Remote {
                store,
                prefix,
                ttl,
            } => {
                let key = format!("{prefix}{}", slot.key_suffix());
                match store.set(&key, json, *ttl) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("Could not persist key {}: {:#}", key, e);
                        false
                    }
                }
            }
        }
    }

    /// Load and deserialize `slot`. Missing, unreadable or malformed blobs are `None`.
    pub fn try_load<T: DeserializeOwned>(&self, slot: Slot) -> Option<T> {
        let raw = self.try_load_raw(slot)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Discarding malformed {}: {}", self.locator(slot), e);
                None
            }
        }
    }

    fn try_load_raw(&self, slot: Slot) -> Option<String> {
        match &self.backend {
            StorageBackend::Filesystem {
                dir,
            } => {
                let path = dir.join(slot.file_name());
                if !path.is_file() {
                    return None;
                }
                fs::read_to_string(&path)
                    .map_err(|e| tracing::debug!("Could not read {}: {}", path.display(), e))
                    .ok()
            }
            StorageBackend::Remote {
                store,
                prefix,
                ..
            } => {
                let key = format!("{prefix}{}", slot.key_suffix());
                store.get(&key).map_err(|e| tracing::debug!("Could not read key {}: {:#}", key, e)).ok()?
            }
        }
    }

    /// Delete `slot`. Returns whether something was removed.
    pub fn try_remove(&self, slot: Slot) -> bool {
        match &self.backend {
            StorageBackend::Filesystem {
                dir,
            } => fs::remove_file(dir.join(slot.file_name())).is_ok(),
            StorageBackend::Remote {
                store,
                prefix,
                ..
            } => {
                let key = format!("{prefix}{}", slot.key_suffix());
                store.delete(&key).unwrap_or_else(|e| {
                    tracing::debug!("Could not delete key {}: {:#}", key, e);
                    false
                })
            }
        }
    }

    /// Copy filesystem blobs of `slots` from `dir` into empty remote keys.
    ///
    /// Runs when a deployment switches from filesystem to remote persistence so the
    /// first process on the new medium does not start from zero. Keys that already
    /// hold a value are left untouched. Returns the number of blobs migrated; always
    /// `0` for a filesystem sink.
    pub fn migrate_from_directory(&self, dir: &Path, slots: &[Slot]) -> usize {
        if self.medium() != Medium::Remote {
            return 0;
        }

        let mut migrated = 0;
        for &slot in slots {
            let path = dir.join(slot.file_name());
            let Ok(json) = fs::read_to_string(&path) else {
                continue;
            };
            if json.trim().is_empty() || self.try_load_raw(slot).is_some() {
                continue;
            }
            if self.try_save_raw(slot, &json) {
                tracing::debug!("Migrated {} into {}", path.display(), self.locator(slot));
                migrated += 1;
            }
        }
        migrated
    }
}
