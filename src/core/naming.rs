//! Logical template names.
//!
//! A logical name identifies a template independently of its file extension and of
//! the backend that stores its compiled artifact. Names in a namespace carry an
//! `@namespace/` prefix; un-prefixed names live in the main namespace. The two
//! universes never overlap: `@admin/users` and `admin/users` are different templates.

use sha2::{Digest, Sha256};

/// A logical template name split into its namespace and in-namespace path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalName<'a> {
    /// Namespace without the leading `@`, `None` for the main namespace
    pub namespace: Option<&'a str>,
    /// Path inside the namespace root, `/`-separated, without extension
    pub path: &'a str,
}

impl<'a> LogicalName<'a> {
    /// Split `@ns/path/to/template` or `path/to/template`.
    ///
    /// A bare `@ns` (no slash) is a namespace with an empty path.
    pub fn parse(name: &'a str) -> Self {
        match name.strip_prefix('@') {
            Some(rest) => match rest.split_once('/') {
                Some((ns, path)) => Self {
                    namespace: Some(ns),
                    path,
                },
                None => Self {
                    namespace: Some(rest),
                    path: "",
                },
            },
            None => Self {
                namespace: None,
                path: name,
            },
        }
    }

    /// Whether the name belongs to the main (un-namespaced) universe.
    pub fn is_main(&self) -> bool {
        self.namespace.is_none()
    }
}

/// Build the logical name for a file found under a root of `namespace`.
pub fn qualify(namespace: Option<&str>, relative: &str) -> String {
    match namespace {
        Some(ns) => format!("@{ns}/{relative}"),
        None => relative.to_string(),
    }
}

/// Normalize a user-supplied namespace: strips `@` and slashes, empty means main.
pub fn normalize_namespace(namespace: &str) -> Option<String> {
    let trimmed = namespace.trim().trim_start_matches('@').trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Content hash that names the compiled artifact of a template.
///
/// SHA-256 over `logical_name + extension`, hex encoded (64 characters). Both the
/// filesystem file name and the remote key embed this value, which is what the
/// invalidator matches on.
pub fn artifact_hash(template_with_extension: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template_with_extension.as_bytes());
    hex::encode(hasher.finalize())
}
