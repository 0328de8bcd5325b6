//! Test environment builder for simplified test setup
//!
//! Creates a temporary project with template files and a configuration whose
//! search roots and cache directory live inside it.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{Profile, TemplatesConfig};
use crate::constants::DEFAULT_CONFIG_FILE;
use crate::manager::TemplateManager;

/// A builder for creating test environments with a fluent API
pub struct TestEnvironmentBuilder {
    temp_dir: TempDir,
    files: Vec<(String, String)>,
    paths: Vec<String>,
    namespaces: BTreeMap<String, Vec<String>>,
    profile: Profile,
    cache_enabled: bool,
}

impl TestEnvironmentBuilder {
    /// Create a new builder with `views` as the only main search root
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            files: Vec::new(),
            paths: vec!["views".to_string()],
            namespaces: BTreeMap::new(),
            profile: Profile::Full,
            cache_enabled: true,
        })
    }

    /// Add a file, relative to the project directory
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Add a template under the `views` root; `name` includes the extension
    pub fn with_template(self, name: &str, content: &str) -> Self {
        self.with_file(format!("views/{name}"), content)
    }

    /// Register `dir` (relative to the project) as a root of `namespace`
    pub fn with_namespace(mut self, namespace: &str, dir: &str) -> Self {
        self.namespaces.entry(namespace.to_string()).or_default().push(dir.to_string());
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Build the test environment
    pub fn build(self) -> Result<TestEnvironment> {
        let project_dir = self.temp_dir.path().to_path_buf();
        for dir in self.paths.iter().chain(self.namespaces.values().flatten()) {
            std::fs::create_dir_all(project_dir.join(dir))?;
        }
        for (path, content) in &self.files {
            let full_path = project_dir.join(path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)
                .with_context(|| format!("Failed to write {}", full_path.display()))?;
        }

        let mut config = TemplatesConfig::default();
        config.paths = self.paths.iter().map(PathBuf::from).collect();
        config.namespaces = self
            .namespaces
            .iter()
            .map(|(ns, dirs)| (ns.clone(), dirs.iter().map(PathBuf::from).collect()))
            .collect();
        config.cache.enabled = self.cache_enabled;
        config.cache.directory = PathBuf::from("cache");
        config.diagnostics.profile = self.profile;

        Ok(TestEnvironment {
            _temp_dir: self.temp_dir,
            config: config.clone().resolved_against(&project_dir),
            raw_config: config,
            project_dir,
        })
    }
}

/// A built test environment
pub struct TestEnvironment {
    _temp_dir: TempDir, // Keep temp dir alive
    pub project_dir: PathBuf,
    /// Configuration with absolute paths
    pub config: TemplatesConfig,
    /// Same configuration with project-relative paths, as written to disk
    raw_config: TemplatesConfig,
}

impl TestEnvironment {
    /// Create a new test environment builder
    pub fn builder() -> Result<TestEnvironmentBuilder> {
        TestEnvironmentBuilder::new()
    }

    pub fn manager(&self) -> TemplateManager {
        TemplateManager::new(self.config.clone())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache.directory
    }

    /// Write the configuration as `tplcache.toml` in the project directory
    pub fn write_config(&self) -> Result<PathBuf> {
        let path = self.project_dir.join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, toml::to_string_pretty(&self.raw_config)?)?;
        Ok(path)
    }

    /// Write a file relative to the project directory
    pub fn write_file(&self, path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let full_path = self.project_dir.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full_path, content)?;
        Ok(full_path)
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.project_dir.join(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_config_resolves_to_same_paths() -> Result<()> {
        let env = TestEnvironment::builder()?
            .with_template("home.html", "home")
            .with_namespace("admin", "admin")
            .build()?;
        assert!(env.config.paths.iter().all(|p| p.is_absolute()));
        assert!(env.raw_config.paths.iter().all(|p| p.is_relative()));

        let loaded = TemplatesConfig::load(&env.write_config()?)?;
        assert_eq!(loaded.paths, env.config.paths);
        assert_eq!(loaded.namespaces, env.config.namespaces);
        assert_eq!(loaded.cache.directory, env.config.cache.directory);
        Ok(())
    }
}
