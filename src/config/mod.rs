//! Configuration for tplcache.
//!
//! Settings come from a TOML file, `tplcache.toml` in the working directory by
//! default. The CLI accepts `--config <path>` or the `TPLCACHE_CONFIG` environment
//! variable instead. Every section is optional:
//!
//! ```toml
//! extension = ".html"
//! paths = ["templates"]
//! autoescape = true
//!
//! [namespaces]
//! admin = ["modules/admin/views"]
//!
//! [cache]
//! enabled = true
//! directory = ".tplcache"
//! backend = "filesystem"   # or "service"
//! prefix = "tpl_"
//! ttl_secs = 0
//!
//! [discovery]
//! fingerprint_depth = 0
//! shared_memory = true
//!
//! [diagnostics]
//! profile = "full"          # or "lean"
//! warmup_summary = false    # optional per-feature overrides
//! ```
//!
//! Relative paths are resolved against the directory holding the configuration file
//! (or the working directory when no file is used).
//!
//! # Modules
//!
//! - `parser` - generic TOML parsing with file context
//! - `capabilities` - profile + override resolution into [`Capabilities`]

mod capabilities;
mod parser;

pub use capabilities::{Capabilities, CapabilityOverrides, Profile};
pub use parser::parse_config;

use crate::constants::{DEFAULT_CACHE_DIR, DEFAULT_CACHE_PREFIX, DEFAULT_CONFIG_FILE, DEFAULT_EXTENSION};
use crate::core::TplError;
use crate::discovery::{DiscoverySettings, SearchRoot};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where compiled artifacts and metadata are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Files under `cache.directory`
    #[default]
    Filesystem,
    /// A key-value service injected by the embedding application
    Service,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Artifact directory (filesystem backend) and metadata directory (always)
    pub directory: PathBuf,
    pub backend: CacheBackendKind,
    /// Key prefix for the service backend
    pub prefix: String,
    /// Expiry of service entries in seconds, `0` for none
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from(DEFAULT_CACHE_DIR),
            backend: CacheBackendKind::Filesystem,
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            ttl_secs: 0,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

/// `[discovery]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Subdirectory levels sampled by the fingerprint (`0` = root mtime only)
    pub fingerprint_depth: usize,
    /// Share discovered lists between managers of the same process
    pub shared_memory: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            fingerprint_depth: 0,
            shared_memory: true,
        }
    }
}

/// `[diagnostics]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub profile: Profile,
    #[serde(flatten)]
    pub overrides: CapabilityOverrides,
}

/// Complete configuration of a [`TemplateManager`](crate::manager::TemplateManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Template file extension, with leading dot
    pub extension: String,
    /// Main-namespace search roots, in lookup order
    pub paths: Vec<PathBuf>,
    /// HTML-escape output of `.html`/`.htm`/`.xml` templates
    pub autoescape: bool,
    /// Namespace -> search roots
    pub namespaces: BTreeMap<String, Vec<PathBuf>>,
    pub cache: CacheConfig,
    pub discovery: DiscoveryConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            paths: Vec::new(),
            autoescape: true,
            namespaces: BTreeMap::new(),
            cache: CacheConfig::default(),
            discovery: DiscoveryConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl TemplatesConfig {
    /// Configuration file to use: `explicit` if given, else `tplcache.toml` in `cwd`
    /// when it exists.
    pub fn locate(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        candidate.is_file().then_some(candidate)
    }

    /// Load `path` and resolve its relative paths against the file's directory.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed file, or invalid values (see [`validate`](Self::validate)).
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = parse_config(path)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let config = config.resolved_against(&base);
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// [`load`](Self::load) the located file, or defaults rooted at `cwd` when none exists.
    pub fn load_or_default(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        match Self::locate(explicit, cwd) {
            Some(path) => Self::load(&path),
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default().resolved_against(cwd))
            }
        }
    }

    /// Make every relative path absolute against `base` and normalize the extension.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        let absolute = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        self.paths = self.paths.iter().map(absolute).collect();
        for roots in self.namespaces.values_mut() {
            *roots = roots.iter().map(absolute).collect();
        }
        self.cache.directory = absolute(&self.cache.directory);
        self.extension = normalize_extension(&self.extension);
        self
    }

    /// Reject values no manager can work with.
    ///
    /// # Errors
    ///
    /// [`TplError::Config`] for an empty extension or an empty namespace name.
    pub fn validate(&self) -> Result<(), TplError> {
        if self.extension.trim_matches('.').is_empty() {
            return Err(TplError::Config {
                message: "`extension` must not be empty".to_string(),
            });
        }
        if let Some(name) = self.namespaces.keys().find(|n| crate::core::normalize_namespace(n).is_none()) {
            return Err(TplError::Config {
                message: format!("invalid namespace name '{name}'"),
            });
        }
        Ok(())
    }

    /// Search roots in lookup order: main paths first, then namespaces by name.
    pub fn search_roots(&self) -> Vec<SearchRoot> {
        let mut roots: Vec<SearchRoot> = self.paths.iter().map(SearchRoot::main).collect();
        for (namespace, paths) in &self.namespaces {
            if let Some(ns) = crate::core::normalize_namespace(namespace) {
                roots.extend(paths.iter().map(|p| SearchRoot::namespaced(ns.clone(), p)));
            }
        }
        roots
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::resolve(self.diagnostics.profile, &self.diagnostics.overrides)
    }

    /// Discovery behavior implied by this configuration and `capabilities`.
    pub fn discovery_settings(&self, capabilities: &Capabilities) -> DiscoverySettings {
        DiscoverySettings {
            persist_list: capabilities.discovery_snapshot,
            preload: capabilities.discovery_snapshot,
            shared_memory: capabilities.discovery_snapshot && self.discovery.shared_memory,
            fingerprint_depth: self.discovery.fingerprint_depth,
        }
    }
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = TemplatesConfig::default();
        assert_eq!(config.extension, ".html");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.backend, CacheBackendKind::Filesystem);
        assert_eq!(config.cache.ttl(), None);
        assert_eq!(config.capabilities(), Capabilities::for_profile(Profile::Full));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tplcache.toml");
        fs::write(
            &path,
            r#"
extension = "twig"
paths = ["templates", "/abs/views"]

[namespaces]
"@admin" = ["modules/admin"]

[cache]
backend = "service"
prefix = "app:"
ttl_secs = 60

[discovery]
fingerprint_depth = 2

[diagnostics]
profile = "lean"
warmup_summary = true
"#,
        )
        .unwrap();

        let config = TemplatesConfig::load(&path).unwrap();
        assert_eq!(config.extension, ".twig");
        assert_eq!(config.paths[0], temp.path().join("templates"));
        assert_eq!(config.paths[1], PathBuf::from("/abs/views"));
        assert_eq!(config.cache.directory, temp.path().join(".tplcache"));
        assert_eq!(config.cache.backend, CacheBackendKind::Service);
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.discovery.fingerprint_depth, 2);

        let caps = config.capabilities();
        assert_eq!(caps.profile, Profile::Lean);
        assert!(caps.warmup_summary);
        assert!(!caps.discovery_snapshot);

        let roots = config.search_roots();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[2].namespace.as_deref(), Some("admin"));
        assert_eq!(roots[2].path, temp.path().join("modules/admin"));
    }

    #[test]
    fn test_locate_and_default() {
        let temp = tempdir().unwrap();
        assert!(TemplatesConfig::locate(None, temp.path()).is_none());
        let config = TemplatesConfig::load_or_default(None, temp.path()).unwrap();
        assert_eq!(config.cache.directory, temp.path().join(".tplcache"));

        fs::write(temp.path().join("tplcache.toml"), "paths = [\"v\"]").unwrap();
        let config = TemplatesConfig::load_or_default(None, temp.path()).unwrap();
        assert_eq!(config.paths, vec![temp.path().join("v")]);
    }

    #[test]
    fn test_invalid_values() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.toml");
        fs::write(&path, "extension = \"\"").unwrap();
        assert!(TemplatesConfig::load(&path).is_err());

        fs::write(&path, "[cache]\nbackend = \"redis\"").unwrap();
        assert!(TemplatesConfig::load(&path).is_err());
    }

    #[test]
    fn test_discovery_settings_follow_snapshot_capability() {
        let mut config = TemplatesConfig::default();
        let full = config.discovery_settings(&config.capabilities());
        assert!(full.persist_list && full.preload && full.shared_memory);

        config.discovery.shared_memory = false;
        config.diagnostics.profile = Profile::Lean;
        let lean = config.discovery_settings(&config.capabilities());
        assert_eq!(lean, DiscoverySettings::default());
    }
}
