//! The native host module scripts see as `pate`.

use crate::bridge::{paths_to_array, traceback};
use crate::config::{self, Configuration, LiteralParser, ReloadReport, SaveReport, SharedStore};
use crate::error::EngineError;
use crate::plugin::PluginRecord;
use parking_lot::Mutex;
use rhai::{Array, EvalAltResult, INT, Module};
use std::path::PathBuf;
use std::sync::Arc;

/// Native functions of the host module callable by name from the host.
pub(crate) const HOST_FUNCTIONS: &[&str] = &["saveConfiguration"];

/// State the host module's native functions share with the engine.
///
/// Nothing here touches the interpreter lock, so scripts can call back into
/// it while the lock is held.
#[derive(Clone)]
pub(crate) struct HostBindings {
    pub configuration: Configuration,
    pub store: Arc<Mutex<Option<SharedStore>>>,
    pub group: String,
}

impl HostBindings {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            configuration: Configuration::new(),
            store: Arc::new(Mutex::new(None)),
            group: group.into(),
        }
    }

    fn attached_store(&self) -> Result<SharedStore, EngineError> {
        self.store.lock().clone().ok_or(EngineError::NoStore)
    }

    pub fn reload(&self, parser: &LiteralParser) -> Result<ReloadReport, EngineError> {
        let store = self.attached_store()?;
        let store = store.lock();
        Ok(config::reload(&self.configuration, &*store, &self.group, parser))
    }

    pub fn save(&self) -> Result<SaveReport, EngineError> {
        let store = self.attached_store()?;
        let mut store = store.lock();
        Ok(config::save(&self.configuration, &mut *store, &self.group)?)
    }
}

/// Build the host module for the current plugin set.
pub(crate) fn build(
    name: &str,
    bindings: &HostBindings,
    plugins: &[PluginRecord],
    directories: &[PathBuf],
) -> Module {
    let mut module = Module::new();
    module.set_id(name);
    module.set_var("configuration", bindings.configuration.clone());
    module.set_var("pluginDirectories", paths_to_array(directories));
    module.set_var(
        "plugins",
        plugins.iter().map(PluginRecord::to_dynamic).collect::<Array>(),
    );

    let save_bindings = bindings.clone();
    module.set_native_fn("saveConfiguration", move || -> Result<INT, Box<EvalAltResult>> {
        match save_bindings.save() {
            Ok(report) => Ok(report.saved.len() as INT),
            Err(e) => Err(traceback("saveConfiguration() failed", &e).into()),
        }
    });

    module
}
