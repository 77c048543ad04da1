//! `pate eval` command implementation

use crate::context::CliContext;
use anyhow::Context;
use pate_engine::bridge::dynamic_to_json;
use std::path::Path;
use tracing::debug;

/// Execute the `pate eval` command
pub fn run(ctx: &CliContext, script: Option<&str>, file: Option<&Path>) -> anyhow::Result<()> {
    let source = match (script, file) {
        (Some(script), _) => script.to_string(),
        (None, Some(file)) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?,
        (None, None) => anyhow::bail!("Nothing to evaluate"),
    };

    debug!("Evaluating {} bytes of script", source.len());
    let adapter = ctx.activate();
    let engine = adapter.engine();
    let result = engine.eval(&source);
    engine.shutdown();

    let value = result?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&dynamic_to_json(&value))?);
    } else if !value.is_unit() {
        println!("{}", value);
    }
    Ok(())
}
