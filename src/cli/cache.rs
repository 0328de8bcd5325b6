//! Clear the compiled-template cache.
//!
//! Deletes every compiled artifact and empties the compile index. With the
//! service backend, persisted metadata (discovery snapshot, warm-up and
//! invalidation history) is removed as well.
//!
//! # Examples
//!
//! ```bash
//! tplcache clear-cache
//! tplcache clear-cache --reinit
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, CommandExecutor, plural};

/// Command to clear compiled artifacts.
#[derive(Args, Debug, Default)]
pub struct ClearCacheCommand {
    /// Reset the engine afterwards
    #[arg(long)]
    reinit: bool,
}

impl CommandExecutor for ClearCacheCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        if !ctx.manager.is_cache_enabled() {
            println!("{}", "Template cache is disabled; nothing to clear.".yellow());
            return Ok(());
        }

        let removed = ctx.manager.clear_cache(self.reinit);
        let location = ctx
            .manager
            .cache_path()
            .map(|dir| format!(" from {}", dir.display()))
            .unwrap_or_default();
        println!("{} {}{}", "Cleared".green().bold(), plural(removed, "artifact"), location);
        Ok(())
    }
}
