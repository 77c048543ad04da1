//! Pate 插件引擎
//! Pate engine
//!
//! 在长期运行的宿主应用中嵌入 Rhai 解释器，并向脚本提供宿主服务：
//! Embeds a Rhai interpreter in a long-lived host application and exposes
//! host services to scripts:
//! - interpreter lifecycle (runtime library, host module, support module)
//! - plugin discovery and import from a set of search roots
//! - configuration persisted as literal text and shared live with scripts
//! - guest proxies for host objects
//!
//! ```no_run
//! use pate_engine::{Engine, EngineSettings, HostAdapter};
//! use std::sync::Arc;
//!
//! let settings = EngineSettings::default()
//!     .with_support_dir("/usr/share/pate/support")
//!     .with_plugin_dirs(["/usr/share/pate/plugins"]);
//! let adapter = HostAdapter::activate(Arc::new(Engine::new(settings)));
//! println!("{} plugins", adapter.engine().plugins().len());
//! ```

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod plugin;
pub mod proxy;
pub mod settings;

pub use config::{ConfigStore, Configuration, MemoryStore, SharedStore, TomlStore};
pub use engine::{Engine, EngineState, InterpreterGuard, UnloadReport};
pub use error::{
    CallbackError, ConfigParseError, ConfigReprError, EngineError, EngineResult, LibraryLoadError,
    PluginImportError, SettingsError, StoreError, WrapError,
};
pub use host::{HostAdapter, PluginView};
pub use plugin::{LoadReport, PluginKind, PluginRecord};
pub use proxy::{Proxy, ProxyType};
pub use settings::{EngineSettings, ScriptLimits};

pub use rhai;
