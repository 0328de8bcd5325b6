//! Filesystem artifact backend.

use super::ArtifactCache;
use crate::constants::ARTIFACT_FILE_EXTENSION;
use crate::core::artifact_hash;
use crate::utils::fs::{atomic_write, modified_secs};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Stores artifacts as `<dir>/<hash[0..2]>/<hash>.tplc`.
///
/// No index is kept; [`clear`](ArtifactCache::clear) enumerates the directory and
/// only touches `.tplc` files, so metadata JSON living in the same directory survives.
#[derive(Debug, Clone)]
pub struct FilesystemArtifactCache {
    directory: PathBuf,
}

impl FilesystemArtifactCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn is_artifact(path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_FILE_EXTENSION)
    }

    /// `<hash[..2]>` directories created by [`store`](ArtifactCache::store).
    fn is_shard(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() == 2 && n.bytes().all(|b| b.is_ascii_hexdigit()))
    }
}

impl ArtifactCache for FilesystemArtifactCache {
    fn generate_key(&self, template: &str) -> String {
        let hash = artifact_hash(template);
        self.directory
            .join(&hash[..2])
            .join(format!("{hash}.{ARTIFACT_FILE_EXTENSION}"))
            .to_string_lossy()
            .into_owned()
    }

    fn store(&self, key: &str, code: &str) -> Result<()> {
        atomic_write(Path::new(key), code.as_bytes())
    }

    fn load(&self, key: &str) -> Option<String> {
        fs::read_to_string(key).ok()
    }

    fn last_modified(&self, key: &str) -> i64 {
        modified_secs(Path::new(key)).unwrap_or(0)
    }

    fn remove(&self, key: &str) -> bool {
        fs::remove_file(key).is_ok()
    }

    fn clear(&self) -> usize {
        if !self.directory.is_dir() {
            return 0;
        }

        let mut removed = 0;
        let mut shards = Vec::new();
        for entry in WalkDir::new(&self.directory).min_depth(1).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if entry.depth() == 1 && Self::is_shard(path) {
                    shards.push(path.to_path_buf());
                }
            } else if Self::is_artifact(path) {
                match fs::remove_file(path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::debug!("Could not remove artifact {}: {}", path.display(), e),
                }
            }
        }

        // Non-empty shards are left alone
        for shard in &shards {
            let _ = fs::remove_dir(shard);
        }

        removed
    }

    fn backend_label(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_layout_and_roundtrip() {
        let temp = tempdir().unwrap();
        let cache = FilesystemArtifactCache::new(temp.path());

        let key = cache.generate_key("home.html");
        let hash = artifact_hash("home.html");
        assert!(key.ends_with(&format!("{}.tplc", hash)));
        assert!(key.contains(&hash[..2]));

        assert!(!cache.contains("home.html"));
        assert_eq!(cache.last_modified(&key), 0);

        cache.store(&key, "<p>{{ x }}</p>").unwrap();
        assert_eq!(cache.load(&key).as_deref(), Some("<p>{{ x }}</p>"));
        assert!(cache.last_modified(&key) > 0);
        assert!(cache.contains("home.html"));

        assert!(cache.remove(&key));
        assert!(!cache.remove(&key));
        assert_eq!(cache.load(&key), None);
    }

    #[test]
    fn test_clear_keeps_metadata_files() {
        let temp = tempdir().unwrap();
        let cache = FilesystemArtifactCache::new(temp.path());
        for name in ["a.html", "b.html", "@ns/c.html"] {
            cache.store(&cache.generate_key(name), name).unwrap();
        }
        fs::write(temp.path().join("compile-index.json"), "{}").unwrap();

        assert_eq!(cache.clear(), 3);
        assert!(temp.path().join("compile-index.json").exists());
        assert!(!cache.contains("a.html"));
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn test_clear_removes_only_shard_directories() {
        let temp = tempdir().unwrap();
        let cache = FilesystemArtifactCache::new(temp.path());
        let key = cache.generate_key("a.html");
        cache.store(&key, "a").unwrap();
        let shard = Path::new(&key).parent().unwrap().to_path_buf();
        fs::create_dir_all(temp.path().join("uploads")).unwrap();
        fs::create_dir_all(temp.path().join("zz")).unwrap();

        assert_eq!(cache.clear(), 1);
        assert!(!shard.exists());
        assert!(temp.path().join("uploads").is_dir());
        assert!(temp.path().join("zz").is_dir());
    }

    #[test]
    fn test_clear_missing_directory() {
        let temp = tempdir().unwrap();
        let cache = FilesystemArtifactCache::new(temp.path().join("missing"));
        assert_eq!(cache.clear(), 0);
    }
}
