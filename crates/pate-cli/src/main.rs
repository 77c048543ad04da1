//! Pate CLI - command-line host for the Pate plugin engine

mod cli;
mod commands;
mod context;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use context::CliContext;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = CliContext::new(&cli)?;

    match cli.command {
        Commands::Plugins => commands::plugins::run(&ctx),
        Commands::Eval { script, file } => commands::eval::run(&ctx, script.as_deref(), file.as_deref()),
        Commands::Config { action } => match action {
            ConfigCommands::Show => commands::config_cmd::run_show(&ctx),
            ConfigCommands::Set {
                key,
                value,
                from_json,
            } => commands::config_cmd::run_set(&ctx, &key, &value, from_json),
        },
    }
}
