//! A started interpreter and everything that lives as long as it does.

use super::host_module::{self, HostBindings};
use crate::bridge::{call_zero_arg, defines_zero_arg_fn};
use crate::error::CallbackError;
use crate::plugin::{LoadedModule, PluginRecord, PluginResolver};
use crate::proxy::ProxyRegistry;
use crate::settings::{EngineSettings, ScriptLimits};
use rhai::{Dynamic, Shared};
use std::path::PathBuf;
use tracing::{debug, info};

pub(crate) struct Runtime {
    pub engine: rhai::Engine,
    pub resolver: PluginResolver,
    pub host_module: String,
    pub support: Option<LoadedModule>,
    pub plugins: Vec<PluginRecord>,
    pub directories: Vec<PathBuf>,
    /// Search path entries added by the last plugin load.
    pub added_paths: Vec<PathBuf>,
}

impl Runtime {
    /// Start an interpreter with the host module and proxy namespaces installed.
    pub fn start(settings: &EngineSettings, bindings: &HostBindings, proxies: &ProxyRegistry) -> Self {
        let resolver = PluginResolver::new(settings.script_extension.clone());

        let mut engine = rhai::Engine::new();
        apply_limits(&mut engine, &settings.limits);
        engine.on_print(|text| info!(target: "pate::script", "{}", text));
        engine.on_debug(|text, source, pos| {
            debug!(target: "pate::script", "[{}{}] {}", source.unwrap_or("script"), pos_suffix(pos), text)
        });
        crate::config::configuration::register_types(&mut engine);
        crate::proxy::register_types(&mut engine);
        engine.set_module_resolver(resolver.clone());

        let mut runtime = Self {
            engine,
            resolver,
            host_module: settings.host_module.clone(),
            support: None,
            plugins: Vec::new(),
            directories: Vec::new(),
            added_paths: Vec::new(),
        };
        runtime.publish_host_module(bindings);
        for namespace in proxies.namespaces() {
            runtime.install_namespace(proxies, namespace);
        }
        debug!("Interpreter started");
        runtime
    }

    /// (Re)install the host module so scripts see the current plugin set.
    pub fn publish_host_module(&mut self, bindings: &HostBindings) {
        let module = host_module::build(&self.host_module, bindings, &self.plugins, &self.directories);
        self.engine.register_static_module(self.host_module.as_str(), module.into());
    }

    /// Make a proxy namespace visible both as `ns::Type` and through `import`.
    pub fn install_namespace(&mut self, proxies: &ProxyRegistry, namespace: &str) {
        let Some(module) = proxies.build_module(namespace) else {
            return;
        };
        let module: Shared<rhai::Module> = module.into();
        self.engine.register_static_module(namespace, module.clone());
        self.resolver.cache().insert(LoadedModule {
            name: namespace.to_string(),
            path: None,
            module,
            ast: None,
        });
    }

    /// Call a zero-argument function of the host module namespace.
    ///
    /// Script functions of the support module are looked up first, then the
    /// native host functions.
    pub fn call_module_function(&self, name: &str) -> Result<Dynamic, CallbackError> {
        if let Some(ast) = self.support.as_ref().and_then(|m| m.ast.as_ref()) {
            if defines_zero_arg_fn(ast, name) {
                return call_zero_arg(&self.engine, ast, name);
            }
        }
        if host_module::HOST_FUNCTIONS.contains(&name) {
            let script = format!("{}::{}()", self.host_module, name);
            return self.engine.eval::<Dynamic>(&script).map_err(|err| CallbackError::Raised {
                name: name.to_string(),
                message: crate::bridge::traceback(&format!("Call to {name}() failed"), &err),
            });
        }
        Err(CallbackError::Missing(name.to_string()))
    }

    /// Run the zero-argument `hook` of every loaded plugin that defines one,
    /// in discovery order. A hook that raises does not stop the others.
    pub fn run_plugin_hooks(&self, hook: &str) -> Vec<CallbackError> {
        let mut errors = Vec::new();
        for record in &self.plugins {
            let Some(ast) = self.resolver.cache().get(&record.name).and_then(|m| m.ast) else {
                continue;
            };
            if !defines_zero_arg_fn(&ast, hook) {
                continue;
            }
            match call_zero_arg(&self.engine, &ast, hook) {
                Ok(_) => debug!("Called {}::{}()", record.name, hook),
                Err(CallbackError::Raised { message, .. }) => errors.push(CallbackError::Raised {
                    name: format!("{}::{}", record.name, hook),
                    message,
                }),
                Err(e) => errors.push(e),
            }
        }
        errors
    }

    /// Drop every module and search path entry.
    pub fn finalize(self) {
        let modules = self.resolver.cache().len();
        self.resolver.cache().clear();
        self.resolver.search_path().clear();
        debug!("Interpreter finalized ({} cached modules released)", modules);
    }
}

fn apply_limits(engine: &mut rhai::Engine, limits: &ScriptLimits) {
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);
    // Zero would forbid imports altogether.
    if limits.max_modules > 0 {
        engine.set_max_modules(limits.max_modules);
    }
}

fn pos_suffix(pos: rhai::Position) -> String {
    if pos.is_none() {
        String::new()
    } else {
        format!(" @ {pos}")
    }
}
