//! Compiled-artifact cache abstraction.
//!
//! The engine persists the validated form of each template through an
//! [`ArtifactCache`]. Two backends exist:
//!
//! - [`FilesystemArtifactCache`] - one file per template under a cache directory,
//!   sharded by the first two hex characters of the artifact hash
//! - [`RemoteArtifactCache`] - entries in a generic [`KeyValueStore`], plus an index
//!   key listing every key ever written so `clear()` works without prefix enumeration
//!
//! Both derive artifact names from [`artifact_hash`](crate::core::artifact_hash) of
//! `logical_name + extension`; the invalidator relies on that convention to find the
//! artifacts of a logical template.
//!
//! Cache failures never reach callers as errors: a failed load is a miss, a failed
//! clear removes what it can and reports the count.

pub mod filesystem;
pub mod remote;
pub mod store;

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use filesystem::FilesystemArtifactCache;
pub use remote::{RemoteArtifactCache, normalize_prefix};
pub use store::{KeyValueStore, MemoryStore};

/// Storage contract for compiled template artifacts.
///
/// Keys are backend-specific: a file path for the filesystem backend, a prefixed
/// key for the remote backend. Always obtain them through [`generate_key`].
///
/// [`generate_key`]: ArtifactCache::generate_key
pub trait ArtifactCache: Send + Sync + fmt::Debug {
    /// Backend key for `template` (logical name including extension).
    fn generate_key(&self, template: &str) -> String;

    /// Persist `code` under `key`, replacing any previous artifact.
    fn store(&self, key: &str, code: &str) -> Result<()>;

    /// Load the artifact stored under `key`. Missing or malformed entries are `None`.
    fn load(&self, key: &str) -> Option<String>;

    /// Unix timestamp (seconds) of the artifact under `key`, `0` when absent.
    fn last_modified(&self, key: &str) -> i64;

    /// Whether an artifact exists for `template` (logical name including extension).
    fn contains(&self, template: &str) -> bool {
        self.last_modified(&self.generate_key(template)) > 0
    }

    /// Delete one artifact. Returns whether something was removed.
    fn remove(&self, key: &str) -> bool;

    /// Delete every artifact this cache knows about. Returns the number removed.
    fn clear(&self) -> usize;

    /// Short label for diagnostics (`"filesystem"` or `"service"`).
    fn backend_label(&self) -> &'static str;
}

/// Artifact cache setting handed to an engine.
#[derive(Debug, Clone, Default)]
pub enum CacheSetting {
    /// Compile in memory only.
    #[default]
    Disabled,
    /// Filesystem backend rooted at the directory.
    Directory(PathBuf),
    /// Any other backend, typically [`RemoteArtifactCache`].
    Custom(Arc<dyn ArtifactCache>),
}

impl CacheSetting {
    /// Build the cache object this setting describes.
    pub fn build(&self) -> Option<Arc<dyn ArtifactCache>> {
        match self {
            Self::Disabled => None,
            Self::Directory(dir) => Some(Arc::new(FilesystemArtifactCache::new(dir.clone()))),
            Self::Custom(cache) => Some(Arc::clone(cache)),
        }
    }

    /// Whether compiled artifacts are persisted at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}
