//! Common utilities and traits for CLI commands

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::TemplatesConfig;
use crate::manager::TemplateManager;

/// Common trait for CLI command execution pattern
pub trait CommandExecutor: Sized {
    /// Execute the command, loading configuration from the working directory
    fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let mut ctx = CommandContext::load(config_path)?;
        self.execute_with_context(&mut ctx)
    }

    /// Execute the command against an already built context
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()>;
}

/// Resolved configuration plus the manager built from it
#[derive(Debug)]
pub struct CommandContext {
    /// Configuration file in use, `None` when running on defaults
    pub config_path: Option<PathBuf>,
    pub manager: TemplateManager,
}

impl CommandContext {
    /// Locate and load the configuration, then build a [`TemplateManager`].
    ///
    /// # Errors
    /// Returns an error if the working directory is unavailable or the
    /// configuration file cannot be read, parsed or validated
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        let located = TemplatesConfig::locate(config_path, &cwd);
        let config = TemplatesConfig::load_or_default(config_path, &cwd)?;
        Ok(Self::from_config(config, located))
    }

    pub fn from_config(config: TemplatesConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            manager: TemplateManager::new(config),
        }
    }
}

/// Output format shared by reporting commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, human readable output
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    /// `--json` wins over `--format`
    pub fn resolve(format: Self, json: bool) -> Self {
        if json { Self::Json } else { format }
    }

    pub fn is_json(self) -> bool {
        self == Self::Json
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}

/// Singular or plural noun for counts in summaries
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 { format!("{count} {noun}") } else { format!("{count} {noun}s") }
}
