//! Integration tests for the engine lifecycle
//!
//! Covers init/load/unload/shutdown transitions, bootstrap failures, lifecycle
//! callbacks and calls into the host module namespace.

mod common;

use common::Fixture;
use pate_engine::{
    CallbackError, Engine, EngineError, EngineSettings, EngineState, HostAdapter, MemoryStore,
};
use std::sync::Arc;

fn config_int(engine: &Engine, key: &str) -> Option<i64> {
    engine.configuration().get(key).and_then(|v| v.as_int().ok())
}

// ============================================================================
// State Transitions
// ============================================================================

#[test]
fn test_init_is_idempotent() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    assert_eq!(engine.state(), EngineState::Unstarted);

    engine.init().unwrap();
    engine.init().unwrap();

    assert_eq!(engine.state(), EngineState::Initialized);
    assert!(engine.is_module_loaded("host"));
    assert_eq!(engine.search_path(), vec![fixture.support_dir.clone()]);
}

#[test]
fn test_load_plugins_initializes_lazily() {
    let fixture = Fixture::new();
    fixture.write_plugin("a.rhai", "let a = 1;");
    let engine = fixture.engine();

    let report = engine.load_plugins().unwrap();

    assert!(engine.is_initialized());
    assert!(engine.plugins_loaded());
    assert_eq!(report.plugin_names(), vec!["a"]);
    assert!(report.callback.is_none());
    assert_eq!(config_int(&engine, "loaded_calls"), Some(1));
}

#[test]
fn test_load_plugins_twice_is_noop() {
    let fixture = Fixture::new();
    fixture.write_plugin("a.rhai", "let a = 1;");
    let engine = fixture.engine();

    engine.load_plugins().unwrap();
    let second = engine.load_plugins().unwrap();

    assert_eq!(second.plugin_names(), vec!["a"]);
    assert!(second.errors.is_empty());
    assert_eq!(config_int(&engine, "loaded_calls"), Some(1));
}

#[test]
fn test_unload_before_load_is_noop() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let report = engine.unload_plugins();
    assert!(report.evicted.is_empty());
    assert_eq!(engine.state(), EngineState::Unstarted);

    engine.init().unwrap();
    let report = engine.unload_plugins();
    assert!(report.evicted.is_empty());
    assert_eq!(engine.state(), EngineState::Initialized);
    assert_eq!(config_int(&engine, "unloaded_calls"), None);
}

#[test]
fn test_unload_evicts_plugins() {
    let fixture = Fixture::new();
    fixture.write_plugin("a.rhai", "let a = 1;");
    fixture.write_plugin("b.rhai", "let b = 2;");
    let engine = fixture.engine();
    engine.load_plugins().unwrap();
    assert!(engine.is_module_loaded("a"));

    let report = engine.unload_plugins();

    assert_eq!(report.evicted, vec!["a", "b"]);
    assert!(report.callback.is_none());
    assert_eq!(engine.state(), EngineState::Initialized);
    assert!(!engine.is_module_loaded("a"));
    assert!(engine.is_module_loaded("host"));
    assert!(engine.plugins().is_empty());
    assert!(engine.plugin_directories().is_empty());
    assert_eq!(config_int(&engine, "unloaded_calls"), Some(1));

    let count = engine.eval("let plugins = pate::plugins; plugins.len()").unwrap();
    assert_eq!(count.as_int().unwrap(), 0);
}

#[test]
fn test_shutdown_is_final() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.load_plugins().unwrap();

    engine.shutdown();
    engine.shutdown();

    assert_eq!(engine.state(), EngineState::Terminated);
    assert!(engine.search_path().is_empty());
    assert_eq!(config_int(&engine, "unloaded_calls"), Some(1));
    assert!(matches!(engine.init(), Err(EngineError::RestartUnsupported)));
    assert!(matches!(engine.load_plugins(), Err(EngineError::RestartUnsupported)));
}

#[test]
fn test_shutdown_before_init_keeps_engine_usable() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    engine.shutdown();
    assert_eq!(engine.state(), EngineState::Unstarted);
    engine.init().unwrap();
}

// ============================================================================
// Bootstrap Failures
// ============================================================================

#[test]
fn test_missing_support_module_terminates() {
    let fixture = Fixture::without_support();
    let engine = fixture.engine();

    match engine.init() {
        Err(EngineError::Bootstrap { module, message }) => {
            assert_eq!(module, "host");
            assert!(message.contains("host"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(engine.state(), EngineState::Terminated);
    assert!(engine.search_path().is_empty());
    assert!(matches!(engine.init(), Err(EngineError::RestartUnsupported)));
}

#[test]
fn test_broken_support_module_terminates() {
    let fixture = Fixture::with_support("fn _pluginsLoaded( {");
    let engine = fixture.engine();

    assert!(matches!(engine.init(), Err(EngineError::Bootstrap { .. })));
    assert_eq!(engine.state(), EngineState::Terminated);
}

#[test]
fn test_library_load_failure_leaves_engine_unstarted() {
    let fixture = Fixture::new();
    let settings = fixture
        .settings()
        .with_runtime_library(fixture.path().join("libmissing-runtime.so"));
    let engine = Engine::new(settings);

    match engine.init() {
        Err(EngineError::LibraryLoad(err)) => {
            assert!(err.to_string().contains("libmissing-runtime.so"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(engine.state(), EngineState::Unstarted);
    assert!(!engine.is_initialized());
    assert!(matches!(engine.load_plugins(), Err(EngineError::LibraryLoad(_))));
}

#[cfg(target_os = "linux")]
#[test]
fn test_runtime_library_loaded_globally() {
    let fixture = Fixture::new();
    let engine = Engine::new(fixture.settings().with_runtime_library("libc.so.6"));

    engine.init().unwrap();
    engine.init().unwrap();
    assert!(engine.is_initialized());

    engine.shutdown();
    assert_eq!(engine.state(), EngineState::Terminated);
}

// ============================================================================
// Callbacks and Module Functions
// ============================================================================

#[test]
fn test_raising_callback_does_not_abort_load() {
    let fixture = Fixture::with_support(r#"fn _pluginsLoaded() { throw "no thanks"; }"#);
    fixture.write_plugin("a.rhai", "let a = 1;");
    let engine = fixture.engine();

    let report = engine.load_plugins().unwrap();

    assert_eq!(engine.state(), EngineState::PluginsLoaded);
    assert_eq!(report.plugin_names(), vec!["a"]);
    match report.callback {
        Some(CallbackError::Raised { name, message }) => {
            assert_eq!(name, "_pluginsLoaded");
            assert!(message.contains("no thanks"));
        }
        other => panic!("unexpected callback outcome: {other:?}"),
    }
}

#[test]
fn test_missing_callbacks_are_informational() {
    let fixture = Fixture::with_support("fn unrelated() { 1 }");
    let engine = fixture.engine();

    let loaded = engine.load_plugins().unwrap();
    assert!(loaded.callback.is_none());
    let unloaded = engine.unload_plugins();
    assert!(unloaded.callback.is_none());
}

#[test]
fn test_call_module_function() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    assert!(matches!(
        engine.call_module_function("answer"),
        Err(CallbackError::NotInitialized(_))
    ));

    engine.init().unwrap();
    let answer = engine.call_module_function("answer").unwrap();
    assert_eq!(answer.as_int().unwrap(), 42);

    let missing = engine.call_module_function("missing").unwrap_err();
    assert!(missing.is_missing());

    match engine.call_module_function("explode") {
        Err(CallbackError::Raised { message, .. }) => assert!(message.contains("kaboom")),
        other => panic!("unexpected result: {other:?}"),
    }

    // Native host functions are reachable too; without a store they raise.
    assert!(matches!(
        engine.call_module_function("saveConfiguration"),
        Err(CallbackError::Raised { .. })
    ));
}

// ============================================================================
// Interpreter Lock
// ============================================================================

#[test]
fn test_eval_requires_running_interpreter() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    assert!(matches!(engine.eval("1 + 1"), Err(EngineError::NotInitialized)));
    engine.init().unwrap();
    assert_eq!(engine.eval("1 + 1").unwrap().as_int().unwrap(), 2);
    assert!(matches!(engine.eval("throw 1;"), Err(EngineError::Script(_))));
}

#[test]
fn test_allow_threads_releases_lock() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.init().unwrap();

    let mut guard = engine.lock();
    assert!(guard.is_running());
    let from_thread = guard.allow_threads(|| {
        std::thread::scope(|s| {
            s.spawn(|| engine.eval("40 + 2").unwrap().as_int().unwrap())
                .join()
                .unwrap()
        })
    });
    assert_eq!(from_thread, 42);
    assert_eq!(guard.eval("1").unwrap().as_int().unwrap(), 1);
}

#[test]
fn test_engine_shared_across_threads() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.init().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.eval(&format!("{i} * 2")).unwrap().as_int().unwrap())
        })
        .collect();
    let results: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![0, 2, 4, 6]);
}

#[test]
fn test_global_engine() {
    let fixture = Fixture::new();
    let engine = Arc::new(Engine::new(EngineSettings::default().with_support_dir(fixture.support_dir.clone())));

    let installed = Engine::install_global(engine.clone()).unwrap();
    assert!(Arc::ptr_eq(&installed, &Engine::global()));
    assert!(Engine::install_global(Arc::new(Engine::default())).is_err());
}

// ============================================================================
// Host Adapter
// ============================================================================

#[test]
fn test_adapter_activates_engine() {
    let fixture = Fixture::new();
    fixture.write_plugin("a.rhai", "");
    let adapter = HostAdapter::activate(fixture.engine());

    assert_eq!(adapter.engine().state(), EngineState::PluginsLoaded);
    let view = adapter.create_view("main");
    assert_eq!(view.window(), "main");
    assert!(Arc::ptr_eq(view.engine(), adapter.engine()));
}

#[test]
fn test_adapter_survives_bootstrap_failure() {
    let fixture = Fixture::without_support();
    let adapter = HostAdapter::activate(fixture.engine());

    assert_eq!(adapter.engine().state(), EngineState::Terminated);
    assert!(adapter.engine().plugins().is_empty());
}

#[test]
fn test_detach_store() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.init().unwrap();
    assert!(engine.detach_store().is_none());

    engine.attach_store(pate_engine::config::shared(MemoryStore::new()));
    assert!(engine.detach_store().is_some());
    assert!(matches!(engine.save_configuration(), Err(EngineError::NoStore)));
}
