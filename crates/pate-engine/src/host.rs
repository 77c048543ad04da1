//! 嵌入引擎的宿主应用入口
//! Entry points for the application embedding the engine.
//!
//! The host activates the adapter once, asks it for a view per top-level
//! window and forwards its session-config events. Nothing here panics or
//! propagates failures back into the host; they are logged.

use crate::config::{ReloadReport, SaveReport, SharedStore};
use crate::engine::Engine;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 宿主插件系统契约
/// The host plugin-system contract.
#[derive(Debug, Clone)]
pub struct HostAdapter {
    engine: Arc<Engine>,
}

impl HostAdapter {
    /// Start the engine and load plugins.
    pub fn activate(engine: Arc<Engine>) -> Self {
        match engine.init() {
            Ok(()) => match engine.load_plugins() {
                Ok(report) => info!(
                    "Pate activated: {} plugins loaded, {} failed",
                    report.plugins.len(),
                    report.errors.len()
                ),
                Err(e) => error!("Could not load plugins: {}", e),
            },
            Err(e) => error!("Could not initialise Pate: {}", e),
        }
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// A view for the top-level window `window`.
    pub fn create_view(&self, window: impl Into<String>) -> PluginView {
        let window = window.into();
        debug!("Creating plugin view for window '{}'", window);
        PluginView {
            window,
            engine: self.engine.clone(),
        }
    }

    /// Load the session configuration from `store`.
    ///
    /// `store` becomes the engine's store. Nothing is read unless the engine
    /// is running and the store holds the configuration group. The group
    /// prefix is not used; entries always live in the configured group.
    pub fn read_session_config(&self, store: SharedStore, prefix: &str) -> Option<ReloadReport> {
        debug!("Reading session config (prefix '{}')", prefix);
        self.engine.attach_store(store.clone());
        if !self.engine.is_initialized() {
            return None;
        }
        if !store.lock().has_group(self.engine.config_group()) {
            return None;
        }
        match self.engine.reload_configuration() {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Could not read session config: {}", e);
                None
            }
        }
    }

    /// Write the session configuration into `store`.
    pub fn write_session_config(&self, store: SharedStore, prefix: &str) -> Option<SaveReport> {
        debug!("Writing session config (prefix '{}')", prefix);
        self.engine.attach_store(store);
        match self.engine.save_configuration() {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Could not write session config: {}", e);
                None
            }
        }
    }
}

/// Per-window view. Holds the engine alive while the window is open.
#[derive(Debug, Clone)]
pub struct PluginView {
    window: String,
    engine: Arc<Engine>,
}

impl PluginView {
    pub fn window(&self) -> &str {
        &self.window
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}
