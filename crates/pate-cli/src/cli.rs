//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pate CLI - Load and drive Rhai plugins
#[derive(Parser)]
#[command(name = "pate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine settings file (TOML)
    #[arg(short = 's', long, global = true, env = "PATE_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Directory holding the support module
    #[arg(long, global = true)]
    pub support_dir: Option<PathBuf>,

    /// Plugin root; repeat for several. Replaces the configured roots.
    #[arg(short = 'p', long = "plugin-dir", global = true)]
    pub plugin_dirs: Vec<PathBuf>,

    /// Configuration store file
    #[arg(long, global = true, env = "PATE_STORE")]
    pub store: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load plugins and list them
    Plugins,

    /// Evaluate a script with plugins loaded
    Eval {
        /// Script text
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        script: Option<String>,

        /// Read the script from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Persisted configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show every entry as stored literal text
    Show,

    /// Set an entry; the value is a literal such as `42`, `"text"` or `[1, 2]`
    Set {
        key: String,
        value: String,

        /// Parse the value as JSON instead
        #[arg(long = "from-json")]
        from_json: bool,
    },
}
