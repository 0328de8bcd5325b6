//! Render one template to stdout.
//!
//! The template is compiled on demand (or loaded from its cached artifact) and
//! rendered with the JSON object given by `--data`, `--data-file`, or an empty
//! context.
//!
//! # Examples
//!
//! ```bash
//! tplcache render home --data '{"title": "Welcome"}'
//! tplcache render @admin/dash --data-file context.json
//! ```

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;

use super::common::{CommandContext, CommandExecutor};

/// Command to render a template.
#[derive(Args, Debug, Default)]
pub struct RenderCommand {
    /// Logical template name (without extension)
    name: String,

    /// Context data as a JSON object
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    data: Option<String>,

    /// Read context data from a JSON file
    #[arg(long)]
    data_file: Option<PathBuf>,
}

impl RenderCommand {
    fn context_data(&self) -> Result<Value> {
        if let Some(raw) = &self.data {
            return serde_json::from_str(raw).context("--data is not valid JSON");
        }
        if let Some(path) = &self.data_file {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read data file: {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("Data file is not valid JSON: {}", path.display()));
        }
        Ok(Value::Object(serde_json::Map::new()))
    }
}

impl CommandExecutor for RenderCommand {
    fn execute_with_context(self, ctx: &mut CommandContext) -> Result<()> {
        let data = self.context_data()?;
        let output = ctx.manager.render(&self.name, &data)?;
        print!("{output}");
        if !output.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
