//! `pate config` command implementation

use crate::context::{CliContext, SESSION_PREFIX};
use colored::Colorize;
use pate_engine::bridge::{dynamic_to_json, json_to_dynamic};
use pate_engine::config::{LiteralParser, to_literal};
use pate_engine::rhai::Dynamic;
use tracing::{debug, warn};

/// Execute the `pate config show` command
pub fn run_show(ctx: &CliContext) -> anyhow::Result<()> {
    let adapter = ctx.activate();
    let report = adapter.read_session_config(ctx.open_store()?, SESSION_PREFIX);
    let configuration = adapter.engine().configuration();

    if ctx.json {
        let output = dynamic_to_json(&Dynamic::from(configuration.snapshot()));
        println!("{}", serde_json::to_string_pretty(&output)?);
        adapter.engine().shutdown();
        return Ok(());
    }

    println!("{} Configuration ({})", "->".green(), ctx.store_path.display());
    if let Some(report) = &report {
        for error in &report.errors {
            println!("  {} {}", "Skipped".yellow(), error);
        }
    }
    if configuration.is_empty() {
        println!("  (empty)");
    }
    for (key, value) in configuration.snapshot() {
        let text = to_literal(&value).unwrap_or_else(|e| format!("<{e}>"));
        println!("  {} = {}", key.cyan(), text);
    }

    adapter.engine().shutdown();
    Ok(())
}

/// Execute the `pate config set` command
pub fn run_set(ctx: &CliContext, key: &str, value: &str, from_json: bool) -> anyhow::Result<()> {
    let value = if from_json {
        let json: serde_json::Value = serde_json::from_str(value)
            .map_err(|e| anyhow::anyhow!("Invalid value for '{}': {}", key, e))?;
        json_to_dynamic(&json).map_err(|e| anyhow::anyhow!("Invalid value for '{}': {}", key, e))?
    } else {
        LiteralParser::new()
            .parse(value)
            .map_err(|e| anyhow::anyhow!("Invalid value for '{}': {}", key, e))?
    };

    let store = ctx.open_store()?;
    let adapter = ctx.activate();
    if let Some(report) = adapter.read_session_config(store.clone(), SESSION_PREFIX) {
        for error in &report.errors {
            warn!("Dropping unreadable entry: {}", error);
        }
    }
    adapter.engine().configuration().insert(key, value);
    let saved = adapter.write_session_config(store, SESSION_PREFIX);
    adapter.engine().shutdown();

    match saved {
        Some(report) => {
            debug!("Saved {} entries to {}", report.saved.len(), ctx.store_path.display());
            println!("{} Set {}", "✓".green(), key.cyan());
            Ok(())
        }
        None => anyhow::bail!("Could not save the configuration"),
    }
}
