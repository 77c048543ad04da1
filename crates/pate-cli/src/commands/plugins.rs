//! `pate plugins` command implementation

use crate::context::CliContext;
use colored::Colorize;
use pate_engine::bridge::dynamic_to_json;

/// Execute the `pate plugins` command
pub fn run(ctx: &CliContext) -> anyhow::Result<()> {
    let adapter = ctx.activate();
    let engine = adapter.engine();
    if !engine.is_initialized() {
        anyhow::bail!("The interpreter could not be started (see the log above)");
    }

    let directories = engine.plugin_directories();
    let plugins = engine.plugins();

    if ctx.json {
        let output = serde_json::json!({
            "directories": directories.iter().map(|d| d.display().to_string()).collect::<Vec<_>>(),
            "plugins": plugins.iter().map(|p| dynamic_to_json(&p.to_dynamic())).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        engine.shutdown();
        return Ok(());
    }

    println!("{} Plugin directories", "->".green());
    if directories.is_empty() {
        println!("  (none)");
    }
    for dir in &directories {
        println!("  {}", dir.display());
    }
    println!();

    println!("{} Plugins", "->".green());
    if plugins.is_empty() {
        println!("  No plugins found.");
    }
    for plugin in &plugins {
        println!(
            "  {:<20} {:<8} {}",
            plugin.name.cyan(),
            plugin.kind.to_string(),
            plugin.path.display()
        );
    }

    engine.shutdown();
    Ok(())
}
