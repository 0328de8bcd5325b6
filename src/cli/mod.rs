//! Command-line interface for tplcache.
//!
//! The binary drives a [`TemplateManager`](crate::manager::TemplateManager) built
//! from `tplcache.toml` and exposes its maintenance operations as subcommands.
//! Every subcommand loads configuration the same way, runs one operation and
//! prints either colored text or pretty JSON.
//!
//! # Command Overview
//!
//! - **list**: Show discovered templates, optionally with compile status
//! - **warmup**: Compile templates ahead of the first render
//! - **invalidate**: Drop compiled artifacts for specific templates
//! - **invalidate-namespace**: Drop compiled artifacts for a whole namespace
//! - **clear-cache**: Delete every compiled artifact
//! - **diagnostics**: Show cache, discovery, warm-up and invalidation state
//! - **reset-metrics**: Delete persisted statistics
//! - **render**: Render one template to stdout
//!
//! # Usage Examples
//!
//! ```bash
//! tplcache list --status
//! tplcache warmup --all
//! tplcache invalidate home --reinit
//! tplcache --config deploy/tplcache.toml diagnostics --json
//! RUST_LOG=debug tplcache render home --data '{"title": "Hi"}'
//! ```
//!
//! # Global Options
//!
//! - `--config <PATH>`: configuration file (also `TPLCACHE_CONFIG`)
//! - `--verbose`: debug logging
//! - `--quiet`: errors only

mod cache;
mod common;
mod diagnostics;
mod invalidate;
mod list;
mod render;
mod warmup;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::constants::CONFIG_PATH_ENV;
use common::CommandExecutor;

pub use common::{CommandContext, OutputFormat};

/// Runtime settings derived from the global flags.
///
/// Kept apart from [`Cli`] so tests and embedders can choose a log level without
/// parsing arguments.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default filter directive when `RUST_LOG` is unset; `None` keeps logging off
    pub log_level: Option<String>,
    /// Configuration file from `--config` / `TPLCACHE_CONFIG`
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the log filter: `RUST_LOG` wins, then the flag-derived level.
    pub fn env_filter(&self) -> EnvFilter {
        let fallback = self.log_level.as_deref().unwrap_or("off");
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    }

    /// Install the global `tracing` subscriber writing to stderr. A subscriber that
    /// is already installed is left in place.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Compiled-template lifecycle management for Tera.
#[derive(Parser, Debug)]
#[command(
    name = "tplcache",
    about = "Manage compiled templates: discovery, warm-up, invalidation and diagnostics",
    version,
    author,
    long_about = "tplcache discovers templates in the configured search roots, compiles them ahead \
                  of time into a filesystem or key-value cache, and keeps the cache consistent \
                  through targeted invalidation."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file (default: ./tplcache.toml)
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List discovered templates.
    List(list::ListCommand),

    /// Compile templates ahead of time.
    Warmup(warmup::WarmupCommand),

    /// Remove compiled artifacts for the given templates.
    Invalidate(invalidate::InvalidateCommand),

    /// Remove compiled artifacts for every template in a namespace.
    InvalidateNamespace(invalidate::InvalidateNamespaceCommand),

    /// Delete every compiled artifact and the compile index.
    ClearCache(cache::ClearCacheCommand),

    /// Show the diagnostics snapshot.
    Diagnostics(diagnostics::DiagnosticsCommand),

    /// Delete persisted discovery stats and warm-up summary.
    ResetMetrics(diagnostics::ResetMetricsCommand),

    /// Render a template to stdout.
    Render(render::RenderCommand),
}

impl Cli {
    /// Execute the CLI with configuration derived from the parsed flags.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config)
    }

    /// Translate the global flags into a [`CliConfig`].
    ///
    /// `--verbose` selects `debug`, `--quiet` selects `error`, otherwise `warn`.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: Some(log_level.to_string()),
            config_path: self.config.clone(),
        }
    }

    /// Execute the CLI with an explicit configuration.
    pub fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let config_path = config.config_path.as_deref();

        match self.command {
            Commands::List(cmd) => cmd.execute(config_path),
            Commands::Warmup(cmd) => cmd.execute(config_path),
            Commands::Invalidate(cmd) => cmd.execute(config_path),
            Commands::InvalidateNamespace(cmd) => cmd.execute(config_path),
            Commands::ClearCache(cmd) => cmd.execute(config_path),
            Commands::Diagnostics(cmd) => cmd.execute(config_path),
            Commands::ResetMetrics(cmd) => cmd.execute(config_path),
            Commands::Render(cmd) => cmd.execute(config_path),
        }
    }
}
