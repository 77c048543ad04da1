//! 引擎：解释器生命周期的所有者
//! The engine: owner of the interpreter lifecycle.
//!
//! An [`Engine`] loads the runtime library, starts the interpreter, installs
//! the host module, imports the support module, drives plugin discovery and
//! tears all of it down again. It is shared as `Arc<Engine>`; hosts that want
//! a single process-wide instance use [`Engine::global`].
//!
//! Every entry point that runs guest code takes the interpreter lock for the
//! duration of the call. [`Engine::lock`] hands the lock to the caller as an
//! [`InterpreterGuard`]; other engine methods called on the same thread while
//! the guard is alive would deadlock.

mod host_module;
mod library;
mod runtime;
mod state;

pub use library::RuntimeLibrary;
pub use state::EngineState;

use crate::bridge::traceback;
use crate::config::{Configuration, LiteralParser, ReloadReport, SaveReport, SharedStore};
use crate::error::{CallbackError, EngineError, EngineResult, WrapError};
use crate::plugin::{LoadReport, PluginLoader, PluginRecord, default_plugin_dirs};
use crate::proxy::{ProxyRegistry, ProxyType};
use crate::settings::EngineSettings;
use host_module::HostBindings;
use parking_lot::{Mutex, MutexGuard, RwLock};
use rhai::Dynamic;
use runtime::Runtime;
use std::ffi::c_void;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

/// 插件加载完成后调用的回调
/// Callback invoked after plugins are loaded.
pub const PLUGINS_LOADED_CALLBACK: &str = "_pluginsLoaded";

/// 插件卸载完成后调用的回调
/// Callback invoked after plugins are unloaded.
pub const PLUGINS_UNLOADED_CALLBACK: &str = "_pluginsUnloaded";

/// 插件可定义的初始化函数，在所有插件加载后调用
/// Function a plugin may define to run once every plugin is loaded.
pub const PLUGIN_INIT_HOOK: &str = "init";

static GLOBAL: OnceLock<Arc<Engine>> = OnceLock::new();

#[derive(Default)]
struct Interpreter {
    library: Option<RuntimeLibrary>,
    runtime: Option<Runtime>,
}

/// Outcome of [`Engine::unload_plugins`].
#[derive(Debug, Default)]
pub struct UnloadReport {
    /// Plugins evicted from the module cache.
    pub evicted: Vec<String>,
    /// Failure of the unload callback, if it raised.
    pub callback: Option<CallbackError>,
}

/// 嵌入式解释器与插件宿主
/// Embedded interpreter and plugin host.
pub struct Engine {
    settings: EngineSettings,
    bindings: HostBindings,
    parser: LiteralParser,
    state: RwLock<EngineState>,
    proxies: RwLock<ProxyRegistry>,
    interpreter: Mutex<Interpreter>,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        let bindings = HostBindings::new(settings.config_group.clone());
        Self {
            settings,
            bindings,
            parser: LiteralParser::new(),
            state: RwLock::new(EngineState::Unstarted),
            proxies: RwLock::new(ProxyRegistry::new()),
            interpreter: Mutex::new(Interpreter::default()),
        }
    }

    /// The process-wide engine, created on first use from
    /// [`EngineSettings::load`] without a settings file.
    pub fn global() -> Arc<Engine> {
        GLOBAL
            .get_or_init(|| {
                let settings = EngineSettings::load(None).unwrap_or_else(|e| {
                    warn!("Invalid engine settings, using defaults: {}", e);
                    EngineSettings::default()
                });
                Arc::new(Engine::new(settings))
            })
            .clone()
    }

    /// Install `engine` as the process-wide engine. Fails, returning the
    /// argument, when one is already installed.
    pub fn install_global(engine: Arc<Engine>) -> Result<Arc<Engine>, Arc<Engine>> {
        GLOBAL.set(engine.clone())?;
        Ok(engine)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Store group the configuration is persisted under.
    pub fn config_group(&self) -> &str {
        &self.settings.config_group
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    pub fn is_initialized(&self) -> bool {
        self.state().is_initialized()
    }

    pub fn plugins_loaded(&self) -> bool {
        self.state().plugins_loaded()
    }

    fn set_state(&self, state: EngineState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!("Engine state: {} -> {}", previous, state);
        }
    }

    // ========================================================================
    // 生命周期
    // Lifecycle
    // ========================================================================

    /// 启动解释器，已在运行时不做任何事
    /// Start the interpreter. Does nothing when it is already running.
    ///
    /// A runtime library that fails to load leaves the engine unstarted. A
    /// support module that fails to import shuts the engine down for good.
    pub fn init(&self) -> EngineResult<()> {
        let mut interpreter = self.interpreter.lock();
        self.init_locked(&mut interpreter)
    }

    fn init_locked(&self, interpreter: &mut Interpreter) -> EngineResult<()> {
        match self.state() {
            EngineState::Initialized | EngineState::PluginsLoaded => return Ok(()),
            EngineState::Terminated => {
                error!("Cannot restart the interpreter once it has been finalized");
                return Err(EngineError::RestartUnsupported);
            }
            EngineState::Unstarted => {}
        }

        if interpreter.library.is_none() {
            if let Some(path) = &self.settings.runtime_library {
                let library = RuntimeLibrary::open(path).inspect_err(|e| error!("{}", e))?;
                interpreter.library = Some(library);
            }
        }

        let proxies = self.proxies.read();
        let mut runtime = Runtime::start(&self.settings, &self.bindings, &proxies);
        drop(proxies);

        let support_dir = self.settings.resolved_support_dir();
        runtime.resolver.search_path().prepend(&support_dir);
        let module = self.settings.support_module.clone();
        let imported = runtime.resolver.import(&runtime.engine, &module);
        interpreter.runtime = Some(runtime);

        match imported {
            Ok(support) => {
                if let Some(runtime) = interpreter.runtime.as_mut() {
                    runtime.support = Some(support);
                }
            }
            Err(err) => {
                let message = traceback(
                    &format!("Could not import the support module '{module}' from {support_dir:?}"),
                    &err,
                );
                self.shutdown_locked(interpreter);
                return Err(EngineError::Bootstrap { module, message });
            }
        }

        self.set_state(EngineState::Initialized);
        info!("Interpreter initialized (support module '{}')", module);

        match self.bindings.reload(&self.parser) {
            Ok(report) => debug!("Loaded {} configuration entries", report.loaded.len()),
            Err(EngineError::NoStore) => debug!("No configuration store attached"),
            Err(e) => warn!("Could not reload configuration: {}", e),
        }
        Ok(())
    }

    /// 发现并导入插件，必要时先启动解释器
    /// Discover and import plugins, starting the interpreter first if needed.
    ///
    /// When plugins are already loaded the report describes the current set.
    pub fn load_plugins(&self) -> EngineResult<LoadReport> {
        let mut interpreter = self.interpreter.lock();
        if self.plugins_loaded() {
            let runtime = interpreter.runtime.as_ref().ok_or(EngineError::NotInitialized)?;
            return Ok(LoadReport {
                plugins: runtime.plugins.clone(),
                directories: runtime.directories.clone(),
                ..LoadReport::default()
            });
        }
        self.init_locked(&mut interpreter)?;
        let runtime = interpreter.runtime.as_mut().ok_or(EngineError::NotInitialized)?;

        let roots = self.plugin_roots();
        let mut report = PluginLoader::new(&runtime.engine, &runtime.resolver).load(&roots);
        runtime.plugins = report.plugins.clone();
        runtime.directories = report.directories.clone();
        runtime.added_paths = report.added_paths.clone();
        runtime.publish_host_module(&self.bindings);
        self.set_state(EngineState::PluginsLoaded);

        report.callback = lifecycle_callback(runtime, PLUGINS_LOADED_CALLBACK);
        report.init_errors = runtime.run_plugin_hooks(PLUGIN_INIT_HOOK);
        Ok(report)
    }

    /// 卸载已加载的插件
    /// Evict the loaded plugins. Does nothing unless plugins are loaded.
    ///
    /// Modules the plugins imported themselves stay cached, and global state
    /// a plugin changed is not undone.
    pub fn unload_plugins(&self) -> UnloadReport {
        let mut interpreter = self.interpreter.lock();
        self.unload_locked(&mut interpreter)
    }

    fn unload_locked(&self, interpreter: &mut Interpreter) -> UnloadReport {
        let mut report = UnloadReport::default();
        if !self.plugins_loaded() {
            return report;
        }
        let Some(runtime) = interpreter.runtime.as_mut() else {
            return report;
        };

        for record in &runtime.plugins {
            if runtime
                .resolver
                .cache()
                .remove_script(&record.name, &record.path)
                .is_some()
            {
                report.evicted.push(record.name.clone());
            }
        }
        for dir in runtime.added_paths.drain(..) {
            if !runtime.resolver.search_path().remove(&dir) {
                debug!("Search path entry {:?} was already removed", dir);
            }
        }
        runtime.plugins.clear();
        runtime.directories.clear();
        runtime.publish_host_module(&self.bindings);

        report.callback = lifecycle_callback(runtime, PLUGINS_UNLOADED_CALLBACK);
        self.set_state(EngineState::Initialized);
        info!("Unloaded {} plugins", report.evicted.len());
        report
    }

    /// Finalize the interpreter and close the runtime library.
    ///
    /// Safe to call repeatedly. The engine cannot be initialized again
    /// afterwards.
    pub fn shutdown(&self) {
        let mut interpreter = self.interpreter.lock();
        self.shutdown_locked(&mut interpreter);
    }

    fn shutdown_locked(&self, interpreter: &mut Interpreter) {
        if self.plugins_loaded() {
            self.unload_locked(interpreter);
        }
        let Some(runtime) = interpreter.runtime.take() else {
            return;
        };
        runtime.finalize();
        if let Some(library) = interpreter.library.take() {
            if let Err(e) = library.close() {
                warn!("{}", e);
            }
        }
        self.set_state(EngineState::Terminated);
        info!("Interpreter shut down");
    }

    fn plugin_roots(&self) -> Vec<PathBuf> {
        if self.settings.plugin_dirs.is_empty() {
            default_plugin_dirs()
        } else {
            self.settings.plugin_dirs.clone()
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Plugins imported by the last load, in discovery order.
    pub fn plugins(&self) -> Vec<PluginRecord> {
        self.interpreter
            .lock()
            .runtime
            .as_ref()
            .map(|r| r.plugins.clone())
            .unwrap_or_default()
    }

    /// Directories visited by the last load, in visit order.
    pub fn plugin_directories(&self) -> Vec<PathBuf> {
        self.interpreter
            .lock()
            .runtime
            .as_ref()
            .map(|r| r.directories.clone())
            .unwrap_or_default()
    }

    /// Current module search path, highest precedence first.
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.interpreter
            .lock()
            .runtime
            .as_ref()
            .map(|r| r.resolver.search_path().snapshot())
            .unwrap_or_default()
    }

    /// Whether a module of that name is in the module cache.
    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.interpreter
            .lock()
            .runtime
            .as_ref()
            .is_some_and(|r| r.resolver.cache().contains(name))
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// The live configuration mapping. Clones share storage with scripts.
    pub fn configuration(&self) -> Configuration {
        self.bindings.configuration.clone()
    }

    /// Use `store` for [`reload_configuration`](Self::reload_configuration),
    /// [`save_configuration`](Self::save_configuration) and the script-side
    /// `saveConfiguration()`.
    pub fn attach_store(&self, store: SharedStore) {
        *self.bindings.store.lock() = Some(store);
    }

    pub fn detach_store(&self) -> Option<SharedStore> {
        self.bindings.store.lock().take()
    }

    /// Replace the configuration with the attached store's entries.
    pub fn reload_configuration(&self) -> EngineResult<ReloadReport> {
        self.bindings.reload(&self.parser)
    }

    /// Persist the configuration into the attached store.
    pub fn save_configuration(&self) -> EngineResult<SaveReport> {
        self.bindings.save()
    }

    // ========================================================================
    // Guest calls
    // ========================================================================

    /// Hold the interpreter lock.
    pub fn lock(&self) -> InterpreterGuard<'_> {
        InterpreterGuard {
            guard: self.interpreter.lock(),
        }
    }

    /// Evaluate `script` in the running interpreter.
    pub fn eval(&self, script: &str) -> EngineResult<Dynamic> {
        self.lock().eval(script)
    }

    /// Call the zero-argument function `name` of the host module namespace.
    ///
    /// Failures are reported and returned; a missing function is not fatal
    /// to the caller.
    pub fn call_module_function(&self, name: &str) -> Result<Dynamic, CallbackError> {
        let interpreter = self.interpreter.lock();
        let Some(runtime) = interpreter.runtime.as_ref() else {
            let err = CallbackError::NotInitialized(name.to_string());
            warn!("{}", err);
            return Err(err);
        };
        runtime.call_module_function(name).inspect_err(|e| {
            if e.is_missing() {
                warn!("Could not find {}::{}()", runtime.host_module, name);
            }
        })
    }

    /// Register a wrappable host type, e.g. `kate.Document`.
    pub fn register_proxy_type(&self, type_name: &str) -> Result<ProxyType, WrapError> {
        let mut interpreter = self.interpreter.lock();
        let mut proxies = self.proxies.write();
        let proxy_type = proxies.register(type_name)?;
        if let Some(runtime) = interpreter.runtime.as_mut() {
            runtime.install_namespace(&proxies, proxy_type.module());
        }
        debug!("Registered proxy type {}", proxy_type.qualified_name());
        Ok(proxy_type)
    }

    /// Wrap the host object at `handle` as a guest proxy of `type_name`.
    ///
    /// The proxy does not own the object. Failures are reported and returned.
    pub fn wrap(&self, handle: *const c_void, type_name: &str) -> Result<Dynamic, WrapError> {
        self.wrap_inner(handle, type_name).inspect_err(|e| {
            traceback(&format!("Could not wrap object as '{type_name}'"), e);
        })
    }

    fn wrap_inner(&self, handle: *const c_void, type_name: &str) -> Result<Dynamic, WrapError> {
        let interpreter = self.interpreter.lock();
        let runtime = interpreter.runtime.as_ref().ok_or(WrapError::Unavailable)?;
        let requested = ProxyType::parse(type_name)?;

        let namespace = runtime
            .resolver
            .import(&runtime.engine, requested.module())
            .map_err(|err| WrapError::ModuleImport {
                module: requested.module().to_string(),
                message: err.to_string(),
            })?;
        let proxy_type = namespace
            .module
            .get_var_value::<ProxyType>(requested.name())
            .ok_or_else(|| WrapError::TypeNotFound {
                module: requested.module().to_string(),
                name: requested.name().to_string(),
            })?;

        Ok(Dynamic::from(proxy_type.wrap(handle)?))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Invoke a lifecycle callback; only a raising callback is returned.
fn lifecycle_callback(runtime: &Runtime, name: &str) -> Option<CallbackError> {
    match runtime.call_module_function(name) {
        Ok(_) => {
            debug!("Called {}::{}()", runtime.host_module, name);
            None
        }
        Err(e) if e.is_missing() => {
            debug!("{}::{}() is not defined", runtime.host_module, name);
            None
        }
        Err(e) => Some(e),
    }
}

/// Exclusive access to the interpreter, released when dropped.
pub struct InterpreterGuard<'a> {
    guard: MutexGuard<'a, Interpreter>,
}

impl InterpreterGuard<'_> {
    pub fn is_running(&self) -> bool {
        self.guard.runtime.is_some()
    }

    /// Evaluate `script` under the held lock.
    pub fn eval(&self, script: &str) -> EngineResult<Dynamic> {
        let runtime = self.guard.runtime.as_ref().ok_or(EngineError::NotInitialized)?;
        runtime
            .engine
            .eval::<Dynamic>(script)
            .map_err(|err| EngineError::Script(traceback("Script evaluation failed", &err)))
    }

    /// Release the lock while `f` runs, then take it back.
    ///
    /// Other threads may run guest code in the meantime.
    pub fn allow_threads<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        MutexGuard::unlocked(&mut self.guard, f)
    }
}
