//! Compile templates ahead of time.
//!
//! Warm-up stores a compiled artifact per template and records it in the compile
//! index, so later renders (in this or another process) skip compilation. Templates
//! already compiled are skipped unless `--force` is given. Per-template failures
//! are reported but do not make the command fail.
//!
//! # Examples
//!
//! ```bash
//! tplcache warmup home emails/welcome
//! tplcache warmup --all
//! tplcache warmup --all --force --json
//! ```

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, CommandExecutor, OutputFormat, plural, print_json};

/// Command to warm up templates.
#[derive(Args, Debug, Default)]
pub struct WarmupCommand {
    /// Logical template names (without extension)
    names: Vec<String>,

    /// Warm up every discovered template
    #[arg(long, conflicts_with = "names")]
    all: bool,

    /// Recompile even when a template is already compiled
    #[arg(long)]
    force: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Shorthand for `--format json`
    #[arg(long)]
    json: bool,
}

impl CommandExecutor for WarmupCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        if !self.all && self.names.is_empty() {
            bail!("Nothing to warm up: pass template names or --all");
        }

        let summary = if self.all {
            ctx.manager.warmup_all(self.force)
        } else {
            ctx.manager.warmup(&self.names, self.force)
        };

        if OutputFormat::resolve(self.format, self.json).is_json() {
            return print_json(&summary);
        }

        println!(
            "{} {}, {} skipped, {} failed",
            "Warm-up:".green().bold(),
            plural(summary.compiled, "template"),
            summary.skipped,
            summary.errors
        );
        for detail in &summary.error_details {
            println!("  {} {}: {}", "✗".red(), detail.template.bold(), detail.error);
        }
        Ok(())
    }
}
