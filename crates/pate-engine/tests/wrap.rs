//! Integration tests for wrapping host objects as guest proxies

mod common;

use common::Fixture;
use pate_engine::{Proxy, WrapError};
use std::ffi::c_void;

struct Document {
    #[allow(dead_code)]
    title: String,
}

fn handle(document: &Document) -> *const c_void {
    document as *const Document as *const c_void
}

#[test]
fn test_wrap_requires_running_interpreter() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.register_proxy_type("kate.Document").unwrap();
    let document = Document { title: "notes".into() };

    assert!(matches!(
        engine.wrap(handle(&document), "kate.Document"),
        Err(WrapError::Unavailable)
    ));
}

#[test]
fn test_wrap_registered_type() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.register_proxy_type("kate.Document").unwrap();
    engine.init().unwrap();
    let document = Document { title: "notes".into() };

    let wrapped = engine.wrap(handle(&document), "kate.Document").unwrap();
    let proxy = wrapped.try_cast::<Proxy>().unwrap();

    assert_eq!(proxy.type_name(), "kate.Document");
    assert_eq!(proxy.as_ptr(), handle(&document));
    assert!(proxy.to_string().starts_with("<kate.Document proxy at 0x"));
}

#[test]
fn test_register_after_init() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.init().unwrap();

    let proxy_type = engine.register_proxy_type("kate.View").unwrap();
    assert_eq!(proxy_type.qualified_name(), "kate.View");

    let name = engine.eval("let view = kate::View; view.qualified_name").unwrap();
    assert_eq!(name.into_string().unwrap(), "kate.View");
    let imported = engine.eval(r#"import "kate" as k; let view = k::View; view.name"#).unwrap();
    assert_eq!(imported.into_string().unwrap(), "View");
}

#[test]
fn test_wrap_failures() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.register_proxy_type("kate.Document").unwrap();
    engine.init().unwrap();
    let document = Document { title: "notes".into() };

    assert!(matches!(
        engine.wrap(handle(&document), "Document"),
        Err(WrapError::InvalidTypeName(_))
    ));

    match engine.wrap(handle(&document), "pkg.Widget") {
        Err(WrapError::ModuleImport { module, message }) => {
            assert_eq!(module, "pkg");
            assert!(message.contains("pkg"));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    match engine.wrap(handle(&document), "kate.Cursor") {
        Err(WrapError::TypeNotFound { module, name }) => {
            assert_eq!(module, "kate");
            assert_eq!(name, "Cursor");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(matches!(
        engine.wrap(std::ptr::null(), "kate.Document"),
        Err(WrapError::Failed { .. })
    ));
}

#[test]
fn test_wrap_type_exported_by_plugin() {
    let fixture = Fixture::new();
    fixture.write_plugin("docs.rhai", "export const Document = kate::Document;");
    let engine = fixture.engine();
    engine.register_proxy_type("kate.Document").unwrap();
    engine.load_plugins().unwrap();
    let document = Document { title: "notes".into() };

    let wrapped = engine.wrap(handle(&document), "docs.Document").unwrap();
    let proxy = wrapped.try_cast::<Proxy>().unwrap();
    assert_eq!(proxy.type_name(), "kate.Document");
}

#[test]
fn test_script_sees_wrapped_proxy() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    engine.register_proxy_type("kate.Document").unwrap();
    engine.init().unwrap();
    let document = Document { title: "notes".into() };
    let wrapped = engine.wrap(handle(&document), "kate.Document").unwrap();
    engine.configuration().insert("active", wrapped.clone());
    engine.configuration().insert("same", wrapped);

    let result = engine
        .eval(
            r#"
            let cfg = pate::configuration;
            let doc = cfg["active"];
            [doc.type_name, doc == cfg["same"], doc.address > 0]
            "#,
        )
        .unwrap()
        .into_array()
        .unwrap();

    assert_eq!(result[0].clone().into_string().unwrap(), "kate.Document");
    assert!(result[1].as_bool().unwrap());
    assert!(result[2].as_bool().unwrap());
}

#[test]
fn test_plugins_cannot_shadow_host_modules() {
    let fixture = Fixture::new();
    fixture.write_plugin("kate.rhai", "export const marker = 1;");
    fixture.write_plugin("host.rhai", "fn answer() { 0 }");
    fixture.write_plugin("notes.rhai", "");
    let engine = fixture.engine();
    engine.register_proxy_type("kate.Document").unwrap();

    let report = engine.load_plugins().unwrap();

    assert_eq!(report.plugin_names(), vec!["notes"]);
    let mut clashed: Vec<&str> = report.errors.iter().map(|e| e.plugin.as_str()).collect();
    clashed.sort();
    assert_eq!(clashed, vec!["host", "kate"]);
    assert!(engine.eval(r#"import "kate" as k; k::marker"#).is_err());
    assert_eq!(engine.call_module_function("answer").unwrap().as_int().unwrap(), 42);

    let unloaded = engine.unload_plugins();
    assert_eq!(unloaded.evicted, vec!["notes"]);
    assert!(engine.is_module_loaded("host"));
    assert!(engine.is_module_loaded("kate"));

    let document = Document { title: "notes".into() };
    assert!(engine.wrap(handle(&document), "kate.Document").is_ok());
}
