//! Typed errors for the engine and its collaborators.
//!
//! Batch operations (plugin discovery, configuration reload/save) never fail
//! as a whole because of one item; they collect the per-item errors defined
//! here into their reports. Only bootstrap failures are fatal.

use std::path::PathBuf;
use thiserror::Error;

/// The interpreter runtime library could not be opened or closed.
#[derive(Debug, Error)]
#[error("Could not load runtime library {path}: {reason}")]
pub struct LibraryLoadError {
    /// Library path or soname as configured.
    pub path: PathBuf,
    /// Loader diagnostic.
    pub reason: String,
}

/// Errors returned by engine lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The runtime library failed to load; the engine stays unstarted.
    #[error(transparent)]
    LibraryLoad(#[from] LibraryLoadError),

    /// The support module could not be imported; the engine was torn down.
    #[error("Could not import the support module '{module}': {message}")]
    Bootstrap {
        /// Support module name.
        module: String,
        /// Guest error text.
        message: String,
    },

    /// A finalized interpreter cannot be started again in the same engine.
    #[error("The interpreter was finalized and cannot be restarted")]
    RestartUnsupported,

    /// The operation needs a running interpreter.
    #[error("The interpreter is not initialized")]
    NotInitialized,

    /// Guest code evaluated on behalf of the host failed.
    #[error("Script error: {0}")]
    Script(String),

    /// Settings were invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// No configuration store is attached.
    #[error("No configuration store is attached")]
    NoStore,

    /// The configuration store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One plugin failed to import. Discovery continues with the next plugin.
#[derive(Debug, Clone, Error)]
#[error("Could not load plugin '{plugin}' ({}): {message}", path.display())]
pub struct PluginImportError {
    /// Import name of the plugin.
    pub plugin: String,
    /// Script file that was imported.
    pub path: PathBuf,
    /// Guest error text.
    pub message: String,
}

/// A persisted configuration entry could not be parsed back into a value.
#[derive(Debug, Clone, Error)]
#[error("Bad config value for '{key}': {text}: {message}")]
pub struct ConfigParseError {
    /// Entry key.
    pub key: String,
    /// Stored literal text.
    pub text: String,
    /// Parser diagnostic.
    pub message: String,
}

/// A configuration value has no literal representation.
#[derive(Debug, Clone, Error)]
#[error("Could not get the representation of the value for '{key}': {message}")]
pub struct ConfigReprError {
    /// Entry key.
    pub key: String,
    /// Printer diagnostic.
    pub message: String,
}

/// Failure of the restricted literal grammar, before it is tied to a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LiteralError {
    /// The text is not a valid literal expression.
    #[error("{0}")]
    Syntax(String),

    /// The value is outside the supported literal subset.
    #[error("value of type '{0}' has no literal form")]
    Unsupported(String),

    /// Floats that are NaN or infinite cannot be written back.
    #[error("non-finite float {0} has no literal form")]
    NonFinite(String),
}

/// Lifecycle callback failures. A missing callback is informational.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum CallbackError {
    /// The host module does not define the callable.
    #[error("Callback '{0}' is not defined")]
    Missing(String),

    /// The callable raised.
    #[error("Callback '{name}' failed: {message}")]
    Raised {
        /// Callback name.
        name: String,
        /// Guest error text.
        message: String,
    },

    /// No interpreter is running.
    #[error("Cannot call '{0}': the interpreter is not initialized")]
    NotInitialized(String),
}

impl CallbackError {
    /// Whether the callback simply does not exist.
    pub fn is_missing(&self) -> bool {
        matches!(self, CallbackError::Missing(_))
    }
}

/// Creating a guest proxy for a host object failed.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum WrapError {
    /// No running interpreter provides the wrapping facility.
    #[error("Object wrapping is unavailable: the interpreter is not initialized")]
    Unavailable,

    /// The name is not of the form `module.Type`.
    #[error("Invalid type name '{0}': expected 'module.Type'")]
    InvalidTypeName(String),

    /// The namespace module could not be imported.
    #[error("Could not import module '{module}': {message}")]
    ModuleImport {
        /// Namespace module.
        module: String,
        /// Guest error text.
        message: String,
    },

    /// The module does not export a wrappable type of that name.
    #[error("Module '{module}' has no wrappable type '{name}'")]
    TypeNotFound {
        /// Namespace module.
        module: String,
        /// Type name within the module.
        name: String,
    },

    /// The wrap call itself refused the handle.
    #[error("Could not wrap object as '{type_name}': {message}")]
    Failed {
        /// Fully qualified type name.
        type_name: String,
        /// Diagnostic.
        message: String,
    },
}

/// Persisted store failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// I/O error reading or writing the store file.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file is not valid TOML.
    #[error("Store parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The store could not be serialized.
    #[error("Store serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Engine settings could not be loaded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// Parsing or merging configuration sources failed.
    #[error("Settings error: {0}")]
    Load(#[from] config::ConfigError),

    /// A setting has an invalid value.
    #[error("Invalid setting '{key}': {message}")]
    Invalid {
        /// Setting key.
        key: String,
        /// Why it is invalid.
        message: String,
    },
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
