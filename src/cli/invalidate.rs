//! Drop compiled artifacts for templates or whole namespaces.
//!
//! Artifacts are matched by the content hash of the template name, so invalidating
//! `home` removes the artifact for `home.html` in every backend. Removals are
//! recorded in the invalidation history when that capability is on.
//!
//! # Examples
//!
//! ```bash
//! tplcache invalidate home emails/welcome
//! tplcache invalidate-namespace admin --reinit
//! tplcache invalidate-namespace            # main namespace
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, CommandExecutor, OutputFormat, plural, print_json};
use crate::invalidation::InvalidationSummary;

/// Command to invalidate individual templates.
#[derive(Args, Debug, Default)]
pub struct InvalidateCommand {
    /// Logical template names (without extension)
    #[arg(required = true)]
    names: Vec<String>,

    /// Reset the engine afterwards
    #[arg(long)]
    reinit: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Shorthand for `--format json`
    #[arg(long)]
    json: bool,
}

impl CommandExecutor for InvalidateCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        let summary = ctx.manager.invalidate_templates(&self.names, self.reinit);
        report(&summary, OutputFormat::resolve(self.format, self.json), None)
    }
}

/// Command to invalidate every template of one namespace.
#[derive(Args, Debug, Default)]
pub struct InvalidateNamespaceCommand {
    /// Namespace (`admin` or `@admin`); omitted means the main namespace
    namespace: Option<String>,

    /// Reset the engine afterwards
    #[arg(long)]
    reinit: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Shorthand for `--format json`
    #[arg(long)]
    json: bool,
}

impl CommandExecutor for InvalidateNamespaceCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        let summary = ctx.manager.invalidate_namespace(self.namespace.as_deref(), self.reinit);
        let label = self.namespace.as_deref().unwrap_or("main");
        report(&summary, OutputFormat::resolve(self.format, self.json), Some(label))
    }
}

fn report(summary: &InvalidationSummary, format: OutputFormat, namespace: Option<&str>) -> Result<()> {
    if format.is_json() {
        return print_json(summary);
    }

    let scope = namespace.map(|ns| format!(" in namespace {}", ns.bold())).unwrap_or_default();
    if summary.removed == 0 {
        println!("{}{}", "No compiled artifacts to remove".yellow(), scope);
        return Ok(());
    }

    println!("{} {}{}", "Removed".green().bold(), plural(summary.removed, "artifact"), scope);
    for (template, removed) in &summary.templates {
        println!("  {template}: {removed}");
    }
    if summary.reinit {
        println!("{}", "Engine reset".dimmed());
    }
    Ok(())
}
