//! List discovered templates.
//!
//! Templates are found by scanning every configured search root (or served from
//! the discovery snapshot when it is still valid). Names are logical: no
//! extension, `/` separators, and `@namespace/` for namespaced roots.
//!
//! # Examples
//!
//! ```bash
//! tplcache list
//! tplcache list --status
//! tplcache list --namespace admin --pattern 'users/*'
//! tplcache list --json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, CommandExecutor, OutputFormat, plural, print_json};
use crate::manager::TemplateListing;

/// Command to list discovered templates.
#[derive(Args, Debug, Default)]
pub struct ListCommand {
    /// Show whether each template is recorded as compiled
    #[arg(long)]
    status: bool,

    /// Only templates of this namespace (`admin` or `@admin`)
    #[arg(long, short = 'n')]
    namespace: Option<String>,

    /// Filter names: `prefix*`, glob (`*`, `?`) or exact, case-insensitive
    #[arg(long, short = 'p')]
    pattern: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Shorthand for `--format json`
    #[arg(long)]
    json: bool,
}

impl CommandExecutor for ListCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        let listing = ctx.manager.list_templates(
            self.status,
            self.namespace.as_deref(),
            self.pattern.as_deref(),
        );

        if OutputFormat::resolve(self.format, self.json).is_json() {
            return print_json(&listing);
        }

        if listing.is_empty() {
            println!("{}", "No templates found.".yellow());
            return Ok(());
        }

        match &listing {
            TemplateListing::Names(names) => {
                for name in names {
                    println!("{name}");
                }
            }
            TemplateListing::WithStatus(entries) => {
                for entry in entries {
                    let marker = if entry.compiled {
                        "compiled".green()
                    } else {
                        "pending".dimmed()
                    };
                    println!("{:<48} {}", entry.name, marker);
                }
            }
        }
        println!();
        println!("{}: {}", "Total".green().bold(), plural(listing.len(), "template"));
        Ok(())
    }
}
