//! 引擎配置
//! Engine settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `PATE_` (nested keys use `__`, lists
//! use `:`), e.g. `PATE_PLUGIN_DIRS=/opt/a:/opt/b` or
//! `PATE_LIMITS__MAX_OPERATIONS=50000`.

use crate::error::SettingsError;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 安装到解释器中的宿主模块名
/// Name of the host module installed into the interpreter.
pub const DEFAULT_HOST_MODULE: &str = "pate";

/// Name of the support module imported at bootstrap.
pub const DEFAULT_SUPPORT_MODULE: &str = "host";

/// Extension of plugin script files.
pub const DEFAULT_SCRIPT_EXTENSION: &str = "rhai";

/// Group holding persisted configuration entries.
pub const DEFAULT_CONFIG_GROUP: &str = "Pate";

/// Application directory name used under the platform data directories.
pub const APP_DIR_NAME: &str = "pate";

/// 解释器资源限制
/// Resource limits applied to the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// 每次求值的最大运算次数（0 表示不限）
    /// Maximum operations per evaluation; 0 means unlimited.
    pub max_operations: u64,
    /// 最大函数调用深度
    /// Maximum function call depth.
    pub max_call_levels: usize,
    /// 最大表达式嵌套深度
    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,
    /// 最大字符串长度（0 表示不限）
    /// Maximum string length; 0 means unlimited.
    pub max_string_size: usize,
    /// 最大数组长度（0 表示不限）
    /// Maximum array length; 0 means unlimited.
    pub max_array_size: usize,
    /// 最大映射大小（0 表示不限）
    /// Maximum map size; 0 means unlimited.
    pub max_map_size: usize,
    /// Maximum number of modules a script may import; 0 means unlimited.
    pub max_modules: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 0,
            max_call_levels: 64,
            max_expr_depth: 128,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
            max_modules: 0,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Shared runtime library opened with global symbol visibility before
    /// the interpreter starts. `None` when the runtime is linked in.
    pub runtime_library: Option<PathBuf>,
    /// Directory holding the support module. Defaults to
    /// `<data dir>/pate/support`.
    pub support_dir: Option<PathBuf>,
    /// Support module imported at bootstrap.
    pub support_module: String,
    /// Name of the host module exposed to scripts.
    pub host_module: String,
    /// Plugin search roots. Empty means the well-known locations.
    pub plugin_dirs: Vec<PathBuf>,
    /// Extension of plugin scripts, without the dot.
    pub script_extension: String,
    /// Persisted configuration group.
    pub config_group: String,
    /// Interpreter resource limits.
    pub limits: ScriptLimits,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            runtime_library: None,
            support_dir: None,
            support_module: DEFAULT_SUPPORT_MODULE.to_string(),
            host_module: DEFAULT_HOST_MODULE.to_string(),
            plugin_dirs: Vec::new(),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            config_group: DEFAULT_CONFIG_GROUP.to_string(),
            limits: ScriptLimits::default(),
        }
    }
}

impl EngineSettings {
    /// Load settings from defaults, an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix("PATE")
                .separator("__")
                .list_separator(":")
                .with_list_parse_key("plugin_dirs")
                .try_parsing(true),
        );

        let settings: EngineSettings = builder.build()?.try_deserialize()?;
        settings.validated()
    }

    /// Parse settings from TOML text, without consulting the environment.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: EngineSettings = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    /// Normalize and check the settings.
    pub fn validated(mut self) -> Result<Self, SettingsError> {
        self.script_extension = self.script_extension.trim_start_matches('.').to_string();
        if self.script_extension.is_empty() {
            return Err(SettingsError::Invalid {
                key: "script_extension".into(),
                message: "must not be empty".into(),
            });
        }
        for (key, value) in [
            ("host_module", &self.host_module),
            ("support_module", &self.support_module),
        ] {
            if !is_identifier(value) {
                return Err(SettingsError::Invalid {
                    key: key.into(),
                    message: format!("'{value}' is not a valid module name"),
                });
            }
        }
        if self.config_group.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "config_group".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(self)
    }

    /// Directory the support module is imported from.
    pub fn resolved_support_dir(&self) -> PathBuf {
        self.support_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME).join("support"))
                .unwrap_or_else(|| PathBuf::from("support"))
        })
    }

    /// Builder-style setter for the plugin roots.
    pub fn with_plugin_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.plugin_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style setter for the support directory.
    pub fn with_support_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.support_dir = Some(dir.into());
        self
    }

    /// Builder-style setter for the runtime library.
    pub fn with_runtime_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.runtime_library = Some(library.into());
        self
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
