//! Engine construction shared by all commands

use crate::cli::Cli;
use anyhow::Context;
use pate_engine::config::{SharedStore, TomlStore, shared};
use pate_engine::{Engine, EngineSettings, HostAdapter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Session prefix passed to the adapter for CLI runs.
pub const SESSION_PREFIX: &str = "cli";

pub struct CliContext {
    pub settings: EngineSettings,
    pub store_path: PathBuf,
    pub json: bool,
}

impl CliContext {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let mut settings = EngineSettings::load(cli.settings.as_deref())
            .context("Failed to load engine settings")?;
        if let Some(dir) = &cli.support_dir {
            settings = settings.with_support_dir(dir.clone());
        }
        if !cli.plugin_dirs.is_empty() {
            settings = settings.with_plugin_dirs(cli.plugin_dirs.clone());
        }

        let store_path = match &cli.store {
            Some(path) => path.clone(),
            None => default_store_path()?,
        };

        debug!(
            "Support dir {:?}, plugin dirs {:?}, store {}",
            settings.support_dir,
            settings.plugin_dirs,
            store_path.display()
        );
        Ok(Self {
            settings,
            store_path,
            json: cli.json,
        })
    }

    /// Start an engine and load plugins.
    pub fn activate(&self) -> HostAdapter {
        let adapter = HostAdapter::activate(Arc::new(Engine::new(self.settings.clone())));
        let engine = adapter.engine();
        if engine.is_initialized() {
            info!("Engine ready with {} plugins", engine.plugins().len());
        } else {
            error!("Engine is {} after activation", engine.state());
        }
        adapter
    }

    pub fn open_store(&self) -> anyhow::Result<SharedStore> {
        let store = TomlStore::open(&self.store_path)
            .with_context(|| format!("Failed to open store {}", self.store_path.display()))?;
        Ok(shared(store))
    }
}

/// `<config dir>/pate/pate.toml`
fn default_store_path() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("pate").join("pate.toml"))
        .context("No configuration directory on this platform; pass --store")
}
