//! Key-value artifact backend.

use super::{ArtifactCache, KeyValueStore};
use crate::constants::{ARTIFACT_INDEX_SUFFIX, DEFAULT_CACHE_PREFIX};
use crate::core::artifact_hash;
use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Normalize a key prefix so it always ends in exactly one `_`.
///
/// Trailing `:` and `_` are stripped first; an empty result falls back to
/// [`DEFAULT_CACHE_PREFIX`].
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches([':', '_']);
    if trimmed.is_empty() {
        DEFAULT_CACHE_PREFIX.to_string()
    } else {
        format!("{trimmed}_")
    }
}

/// Payload of a primary artifact entry.
#[derive(Debug, Serialize, Deserialize)]
struct RemoteEntry {
    /// Unix seconds at write time
    t: i64,
    /// Artifact body
    c: String,
}

/// Stores artifacts in a [`KeyValueStore`].
///
/// Layout:
/// - `<prefix><hash>` -> `{"t": <unix secs>, "c": <artifact>}`
/// - `<prefix>__index` -> JSON list of every primary key written
///
/// Index maintenance is best-effort. A key missing from the index is leaked by
/// [`clear`](ArtifactCache::clear), which is harmless because artifacts are
/// content-addressed.
#[derive(Debug, Clone)]
pub struct RemoteArtifactCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    index_key: String,
    ttl: Option<Duration>,
}

impl RemoteArtifactCache {
    /// Create a cache over `store`. A zero or absent `ttl` means no expiry.
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: &str, ttl: Option<Duration>) -> Self {
        let prefix = normalize_prefix(prefix);
        let index_key = format!("{prefix}{ARTIFACT_INDEX_SUFFIX}");
        Self {
            store,
            prefix,
            index_key,
            ttl: ttl.filter(|d| !d.is_zero()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn store_handle(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /// Primary keys currently recorded in the index.
    pub fn indexed_keys(&self) -> Vec<String> {
        match self.store.get(&self.index_key) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::debug!("Could not read artifact index {}: {}", self.index_key, e);
                Vec::new()
            }
        }
    }

    fn write_index(&self, keys: &[String]) -> Result<()> {
        let raw = serde_json::to_string(keys)?;
        self.store.set(&self.index_key, &raw, self.ttl)
    }

    fn read_entry(&self, key: &str) -> Option<RemoteEntry> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("Artifact lookup for {} failed: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Discarding malformed artifact {}: {}", key, e);
                None
            }
        }
    }
}

impl ArtifactCache for RemoteArtifactCache {
    fn generate_key(&self, template: &str) -> String {
        format!("{}{}", self.prefix, artifact_hash(template))
    }

    fn store(&self, key: &str, code: &str) -> Result<()> {
        let payload = serde_json::to_string(&RemoteEntry {
            t: Utc::now().timestamp(),
            c: code.to_string(),
        })?;
        self.store.set(key, &payload, self.ttl)?;

        let mut keys = self.indexed_keys();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
            if let Err(e) = self.write_index(&keys) {
                tracing::debug!("Artifact index update failed for {}: {}", key, e);
            }
        }
        Ok(())
    }

    fn load(&self, key: &str) -> Option<String> {
        self.read_entry(key).map(|entry| entry.c)
    }

    fn last_modified(&self, key: &str) -> i64 {
        self.read_entry(key).map_or(0, |entry| entry.t)
    }

    fn remove(&self, key: &str) -> bool {
        let removed = match self.store.delete(key) {
            Ok(existed) => existed,
            Err(e) => {
                tracing::debug!("Could not delete artifact {}: {}", key, e);
                false
            }
        };

        let mut keys = self.indexed_keys();
        let before = keys.len();
        keys.retain(|k| k != key);
        if keys.len() != before
            && let Err(e) = self.write_index(&keys)
        {
            tracing::debug!("Artifact index update failed for {}: {}", key, e);
        }

        removed
    }

    fn clear(&self) -> usize {
        let mut removed = 0;
        for key in self.indexed_keys() {
            match self.store.delete(&key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::debug!("Could not delete artifact {}: {}", key, e),
            }
        }
        if let Err(e) = self.store.delete(&self.index_key) {
            tracing::debug!("Could not delete artifact index {}: {}", self.index_key, e);
        }
        removed
    }

    fn backend_label(&self) -> &'static str {
        "service"
    }
}
