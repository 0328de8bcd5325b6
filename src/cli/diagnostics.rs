//! Diagnostics and metric maintenance commands.
//!
//! `diagnostics` prints the manager's snapshot: cache mode, compile counters,
//! persisted warm-up and invalidation history, and discovery statistics. Which
//! sections appear depends on the diagnostics profile (`full` or `lean`).
//! `reset-metrics` deletes the persisted statistics, optionally together with the
//! compile index and compiled artifacts.
//!
//! # Examples
//!
//! ```bash
//! tplcache diagnostics
//! tplcache diagnostics --json
//! tplcache reset-metrics --include-index --include-cache
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, CommandExecutor, OutputFormat, plural, print_json};
use crate::manager::Diagnostics;

/// Command to show the diagnostics snapshot.
#[derive(Args, Debug, Default)]
pub struct DiagnosticsCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Shorthand for `--format json`
    #[arg(long)]
    json: bool,
}

impl CommandExecutor for DiagnosticsCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        let diagnostics = ctx.manager.diagnostics();
        if OutputFormat::resolve(self.format, self.json).is_json() {
            return print_json(&diagnostics);
        }
        print_text(&diagnostics, ctx);
        Ok(())
    }
}

fn print_text(diag: &Diagnostics, ctx: &CommandContext) {
    println!("{}", "Template diagnostics".bold());
    if let Some(path) = &ctx.config_path {
        println!("  {:<22} {}", "config:", path.display());
    }
    println!();

    println!("{}", "Cache".cyan().bold());
    let state = if diag.cache.enabled { "enabled".green() } else { "disabled".yellow() };
    println!("  {:<22} {} ({})", "status:", state, diag.cache.mode);
    if let Some(path) = &diag.cache.path {
        println!("  {:<22} {}", "path:", path.display());
    }
    if let Some(prefix) = &diag.cache.prefix {
        println!("  {:<22} {}", "prefix:", prefix);
    }
    if let Some(ttl) = diag.cache.ttl {
        println!("  {:<22} {}s", "ttl:", ttl);
    }
    println!("  {:<22} {}", "compiled templates:", diag.cache.compiled_templates);
    for (slot, medium) in &diag.persistence {
        println!("  {:<22} {}", format!("{slot}:"), medium);
    }
    println!();

    if let Some(discovery) = &diag.discovery {
        let stats = &discovery.stats;
        println!("{}", "Discovery".cyan().bold());
        println!("  {:<22} {} hit(s), {} miss(es)", "cache:", stats.hits, stats.misses);
        if let Some(count) = stats.count {
            println!("  {:<22} {}", "templates:", count);
        }
        if let Some(source) = stats.cache_source {
            println!("  {:<22} {}", "source:", source);
        }
        println!();
    }

    if let Some(warmup) = &diag.warmup {
        println!("{}", "Warm-up".cyan().bold());
        match &warmup.last {
            Some(record) => {
                let scope = if record.all { "all" } else { "selected" };
                println!(
                    "  {:<22} {} ({}), {} compiled, {} skipped, {} failed",
                    "last:",
                    record.timestamp.to_rfc3339(),
                    scope,
                    record.summary.compiled,
                    record.summary.skipped,
                    record.summary.errors
                );
            }
            None => println!("  {:<22} never", "last:"),
        }
        println!();
    }

    if let Some(invalidations) = &diag.invalidations {
        println!("{}", "Invalidations".cyan().bold());
        if let Some(last) = &invalidations.last {
            println!(
                "  {:<22} {} removed at {}",
                "last:",
                plural(last.removed, "artifact"),
                last.timestamp.to_rfc3339()
            );
        }
        println!("  {:<22} {}", "cumulative removed:", invalidations.cumulative_removed);
        println!();
    }

    if let (Some(functions), Some(filters)) = (&diag.dynamic_functions, &diag.dynamic_filters) {
        println!("{}", "Dynamic registrations".cyan().bold());
        println!("  {:<22} {} active, {} pending", "functions:", functions.active, functions.pending);
        println!("  {:<22} {} active, {} pending", "filters:", filters.active, filters.pending);
        println!();
    }

    println!("{}", "Renders".cyan().bold());
    println!("  {:<22} {}", "count:", diag.renders);
    println!("  {:<22} {:.2} ms", "average:", diag.performance.avg_render_time_ms);
    println!("  {:<22} {}", "engine resets:", diag.environment_resets);
}

/// Command to delete persisted metrics.
#[derive(Args, Debug, Default)]
pub struct ResetMetricsCommand {
    /// Also delete the compile index
    #[arg(long)]
    include_index: bool,

    /// Also delete compiled artifacts
    #[arg(long)]
    include_cache: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Shorthand for `--format json`
    #[arg(long)]
    json: bool,
}

impl CommandExecutor for ResetMetricsCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        let report = ctx.manager.reset_metrics(self.include_index, self.include_cache);
        if OutputFormat::resolve(self.format, self.json).is_json() {
            return print_json(&report);
        }

        if report.removed.is_empty() {
            println!("{}", "No persisted metrics found.".yellow());
        } else {
            println!("{} {}", "Removed".green().bold(), plural(report.removed.len(), "metrics record"));
            for locator in &report.removed {
                println!("  {locator}");
            }
        }
        if report.include_cache {
            println!("{} {}", "Cleared".green().bold(), plural(report.cache_files_removed, "artifact"));
        }
        Ok(())
    }
}
