//! tplcache command-line entry point
//!
//! Parses arguments, runs the selected subcommand and turns any error into a
//! colored message with a suggestion before exiting with status 1.

use anyhow::Result;
use clap::Parser;
use tplcache::cli;
use tplcache::core::user_friendly_error;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
