//! Search roots and their canonical form.

use crate::constants::MAIN_NAMESPACE;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A directory templates are loaded from, optionally bound to a namespace.
///
/// Several roots may share a namespace; lookups try them in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchRoot {
    /// Namespace without `@`, `None` for the main namespace
    pub namespace: Option<String>,
    pub path: PathBuf,
}

impl SearchRoot {
    pub fn main(path: impl Into<PathBuf>) -> Self {
        Self {
            namespace: None,
            path: path.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            path: path.into(),
        }
    }

    /// Key used in canonical structures: the namespace or `__main__`.
    pub fn namespace_key(&self) -> &str {
        self.namespace.as_deref().unwrap_or(MAIN_NAMESPACE)
    }
}

impl fmt::Display for SearchRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "@{ns} -> {}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Namespace key -> sorted, de-duplicated, `/`-normalized real paths.
pub type CanonicalRoots = BTreeMap<String, Vec<String>>;

/// Normalize one path: resolve symlinks when possible, `/` separators, no trailing `/`.
pub fn canonical_path(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let normalized = resolved.to_string_lossy().replace('\\', "/");
    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Canonical structure of `roots`, independent of registration order.
pub fn canonicalize(roots: &[SearchRoot]) -> CanonicalRoots {
    let mut out = CanonicalRoots::new();
    for root in roots {
        out.entry(root.namespace_key().to_string()).or_default().push(canonical_path(&root.path));
    }
    for paths in out.values_mut() {
        paths.sort();
        paths.dedup();
    }
    out
}

/// Hash binding an in-process name list to the configuration it was built for.
pub fn context_hash(canonical: &CanonicalRoots, extension: &str) -> String {
    let structure = serde_json::to_string(canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(format!("filesystem|{extension}|{structure}").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_canonicalize_sorts_and_dedups() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();

        let roots = vec![
            SearchRoot::main(&b),
            SearchRoot::namespaced("admin", &a),
            SearchRoot::main(&a),
            SearchRoot::main(format!("{}/", a.display())),
        ];
        let canonical = canonicalize(&roots);

        assert_eq!(canonical.keys().collect::<Vec<_>>(), vec!["__main__", "admin"]);
        let main = &canonical["__main__"];
        assert_eq!(main.len(), 2);
        assert!(main[0].ends_with("/a"));
        assert!(main[1].ends_with("/b"));
    }

    #[test]
    fn test_context_hash_depends_on_extension_and_roots() {
        let temp = tempdir().unwrap();
        let canonical = canonicalize(&[SearchRoot::main(temp.path())]);
        let h1 = context_hash(&canonical, ".html");
        assert_eq!(h1, context_hash(&canonical, ".html"));
        assert_ne!(h1, context_hash(&canonical, ".twig"));
        assert_ne!(h1, context_hash(&CanonicalRoots::new(), ".html"));
    }

    #[test]
    fn test_missing_path_kept_verbatim() {
        let path = Path::new("/definitely/not/here/");
        assert_eq!(canonical_path(path), "/definitely/not/here");
    }
}
