//! Plugin discovery and module resolution.

pub mod loader;
pub mod resolver;

pub use loader::{
    LoadReport, PluginKind, PluginLoader, PluginRecord, default_plugin_dirs, system_plugin_dirs,
    user_plugin_dir,
};
pub use resolver::{LoadedModule, ModuleCache, PluginResolver, SearchPath};
