//! Removal of compiled artifacts for one, many or a namespace of templates.
//!
//! Artifacts are located by name: every artifact file (or key) embeds the
//! [`artifact_hash`] of `logical_name + extension`, so invalidation needs no mapping
//! from artifact back to template. On the filesystem the hash is matched as a
//! substring of the file name; the artifact layout puts exactly one hash in each name.
//!
//! Nothing here fails. Unremovable files count as not removed, a missing cache
//! directory yields an empty summary, and zero matches is the normal outcome for a
//! template that was never compiled.

use crate::artifact::ArtifactCache;
use crate::core::{artifact_hash, normalize_namespace};
use crate::index::CompileIndex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Where the artifacts to remove live.
#[derive(Debug, Clone, Copy)]
pub enum InvalidationTarget<'a> {
    /// Filesystem cache directory, searched recursively.
    Directory(&'a Path),
    /// A cache addressed by key, typically the remote backend. Keys are deleted directly.
    Artifacts(&'a dyn ArtifactCache),
    /// Caching is off; nothing can be removed.
    Unavailable,
}

/// Result of a batch or namespace invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationSummary {
    /// Total artifacts removed
    pub removed: usize,
    /// Removed count per template, only templates with at least one removal
    pub templates: BTreeMap<String, usize>,
    /// Whether the caller should reset the engine
    pub reinit: bool,
    /// Input names dropped as duplicates or blanks
    pub deduplicated: usize,
}

/// Stateless invalidation service bound to a template extension.
#[derive(Debug, Clone)]
pub struct TemplateInvalidator {
    extension: String,
}

impl TemplateInvalidator {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn hash_of(&self, logical: &str) -> String {
        artifact_hash(&format!("{logical}{}", self.extension))
    }

    /// Remove every artifact of `logical`. Forgets it in `index` when something was removed.
    pub fn invalidate_one(
        &self,
        logical: &str,
        target: InvalidationTarget<'_>,
        index: &mut CompileIndex,
    ) -> usize {
        let removed = match target {
            InvalidationTarget::Directory(dir) => {
                let hash = self.hash_of(logical);
                let mut removed = 0;
                for path in artifact_files(dir) {
                    if file_name_contains(&path, &hash) && remove_file(&path) {
                        removed += 1;
                    }
                }
                removed
            }
            InvalidationTarget::Artifacts(cache) => {
                let key = cache.generate_key(&format!("{logical}{}", self.extension));
                usize::from(cache.remove(&key))
            }
            InvalidationTarget::Unavailable => 0,
        };

        if removed > 0 {
            index.forget(logical);
            tracing::info!("Invalidated template {} ({} artifact(s) removed)", logical, removed);
        }
        removed
    }

    /// Remove artifacts of every name in `names` with a single directory walk.
    ///
    /// Names are trimmed and de-duplicated first; blanks are dropped. The summary's
    /// `reinit` is `reinit && removed > 0`.
    pub fn invalidate_many<S: AsRef<str>>(
        &self,
        names: &[S],
        target: InvalidationTarget<'_>,
        reinit: bool,
        index: &mut CompileIndex,
    ) -> InvalidationSummary {
        let mut unique: Vec<&str> = Vec::new();
        for candidate in names {
            let name = candidate.as_ref().trim();
            if !name.is_empty() && !unique.contains(&name) {
                unique.push(name);
            }
        }
        let deduplicated = names.len() - unique.len();

        let mut summary = InvalidationSummary {
            deduplicated,
            ..InvalidationSummary::default()
        };

        match unique.as_slice() {
            [] => return summary,
            [single] => {
                let removed = self.invalidate_one(single, target, index);
                if removed > 0 {
                    summary.templates.insert((*single).to_string(), removed);
                }
                summary.removed = removed;
            }
            many => {
                let per_name = match target {
                    InvalidationTarget::Directory(dir) => self.remove_in_one_walk(many, dir),
                    InvalidationTarget::Artifacts(cache) => many
                        .iter()
                        .map(|name| {
                            let key = cache.generate_key(&format!("{name}{}", self.extension));
                            (*name, usize::from(cache.remove(&key)))
                        })
                        .collect(),
                    InvalidationTarget::Unavailable => Vec::new(),
                };
                for (name, count) in per_name {
                    if count > 0 {
                        index.forget(name);
                        summary.templates.insert(name.to_string(), count);
                        summary.removed += count;
                    }
                }
            }
        }

        summary.reinit = reinit && summary.removed > 0;
        if summary.removed > 0 {
            tracing::info!(
                "Invalidated {} template(s), {} artifact(s) removed, {} duplicate(s) skipped",
                summary.templates.len(),
                summary.removed,
                deduplicated
            );
        }
        summary
    }

    /// Invalidate every discovered name in `namespace` (`None` = main namespace).
    ///
    /// `namespace` may be given with or without `@`.
    pub fn invalidate_namespace(
        &self,
        namespace: Option<&str>,
        discovered: &[String],
        target: InvalidationTarget<'_>,
        reinit: bool,
        index: &mut CompileIndex,
    ) -> InvalidationSummary {
        let selected = filter_namespace(discovered, namespace);
        let summary = self.invalidate_many(&selected, target, reinit, index);
        if summary.removed > 0 {
            tracing::info!(
                "Invalidated namespace {} ({} artifact(s) removed)",
                namespace.unwrap_or("main"),
                summary.removed
            );
        }
        summary
    }

    fn remove_in_one_walk<'n>(&self, names: &[&'n str], dir: &Path) -> Vec<(&'n str, usize)> {
        let hashes: Vec<(String, usize)> =
            names.iter().enumerate().map(|(i, name)| (self.hash_of(name), i)).collect();
        let mut counts = vec![0usize; names.len()];

        for path in artifact_files(dir) {
            if let Some((_, i)) = hashes.iter().find(|(hash, _)| file_name_contains(&path, hash))
                && remove_file(&path)
            {
                counts[*i] += 1;
            }
        }

        names.iter().copied().zip(counts).collect()
    }
}

/// Names belonging to `namespace`: `@ns/...` or exactly `@ns`; `None` keeps
/// un-prefixed names.
pub fn filter_namespace(names: &[String], namespace: Option<&str>) -> Vec<String> {
    match namespace.and_then(normalize_namespace) {
        None => names.iter().filter(|n| !n.is_empty() && !n.starts_with('@')).cloned().collect(),
        Some(ns) => {
            let exact = format!("@{ns}");
            let prefix = format!("{exact}/");
            names.iter().filter(|n| n.starts_with(&prefix) || **n == exact).cloned().collect()
        }
    }
}

fn artifact_files(dir: &Path) -> Vec<std::path::PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn file_name_contains(path: &Path, hash: &str) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.contains(hash))
}

fn remove_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
            false
        }
    }
}
