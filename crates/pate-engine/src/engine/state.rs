use std::fmt;

/// Lifecycle of an [`Engine`](super::Engine).
///
/// `Unstarted → Initialized ⇄ PluginsLoaded → Terminated`. A terminated
/// engine cannot be initialized again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineState {
    #[default]
    Unstarted,
    Initialized,
    PluginsLoaded,
    Terminated,
}

impl EngineState {
    /// Whether the interpreter is running.
    pub fn is_initialized(self) -> bool {
        matches!(self, EngineState::Initialized | EngineState::PluginsLoaded)
    }

    pub fn plugins_loaded(self) -> bool {
        self == EngineState::PluginsLoaded
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Unstarted => "unstarted",
            EngineState::Initialized => "initialized",
            EngineState::PluginsLoaded => "plugins loaded",
            EngineState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
