//! 宿主对象的脚本代理
//! Guest proxies for host objects.
//!
//! Hosts register wrappable types by qualified name (`kate.Document`). Every
//! namespace becomes a native module exporting one [`ProxyType`] per type, so
//! scripts see `kate::Document`. A [`Proxy`] records the type name and the
//! address of the host object; it never owns or dereferences it.

use crate::error::WrapError;
use rhai::{INT, Module};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::c_void;
use std::fmt;

/// 可包装的宿主类型
/// A wrappable host type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyType {
    module: String,
    name: String,
}

impl ProxyType {
    /// Parse `module.Type`. The module part may itself contain dots.
    pub fn parse(qualified: &str) -> Result<Self, WrapError> {
        let invalid = || WrapError::InvalidTypeName(qualified.to_string());
        let (module, name) = qualified.rsplit_once('.').ok_or_else(invalid)?;
        if module.is_empty() || module.split('.').any(|part| !is_identifier(part)) || !is_identifier(name) {
            return Err(invalid());
        }
        Ok(Self {
            module: module.to_string(),
            name: name.to_string(),
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Create a proxy for the object at `handle`.
    pub fn wrap(&self, handle: *const c_void) -> Result<Proxy, WrapError> {
        if handle.is_null() {
            return Err(WrapError::Failed {
                type_name: self.qualified_name(),
                message: "null object handle".to_string(),
            });
        }
        Ok(Proxy {
            type_name: self.qualified_name(),
            address: handle as usize,
        })
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<type {}.{}>", self.module, self.name)
    }
}

/// 宿主对象在脚本中的句柄
/// Guest handle for a host object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proxy {
    type_name: String,
    address: usize,
}

impl Proxy {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn address(&self) -> usize {
        self.address
    }

    /// The wrapped handle. The pointee is owned by the host.
    pub fn as_ptr(&self) -> *const c_void {
        self.address as *const c_void
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} proxy at {:#x}>", self.type_name, self.address)
    }
}

/// Wrappable types, grouped by namespace.
#[derive(Debug, Clone, Default)]
pub struct ProxyRegistry {
    namespaces: BTreeMap<String, BTreeSet<String>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `qualified`; registering twice is harmless.
    pub fn register(&mut self, qualified: &str) -> Result<ProxyType, WrapError> {
        let proxy_type = ProxyType::parse(qualified)?;
        self.namespaces
            .entry(proxy_type.module.clone())
            .or_default()
            .insert(proxy_type.name.clone());
        Ok(proxy_type)
    }

    pub fn contains(&self, proxy_type: &ProxyType) -> bool {
        self.namespaces
            .get(&proxy_type.module)
            .is_some_and(|names| names.contains(&proxy_type.name))
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Native module exporting the types of `namespace`.
    pub fn build_module(&self, namespace: &str) -> Option<Module> {
        let names = self.namespaces.get(namespace)?;
        let mut module = Module::new();
        module.set_id(namespace);
        for name in names {
            module.set_var(
                name.as_str(),
                ProxyType {
                    module: namespace.to_string(),
                    name: name.clone(),
                },
            );
        }
        Some(module)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

pub(crate) fn register_types(engine: &mut rhai::Engine) {
    engine
        .register_type_with_name::<Proxy>("Proxy")
        .register_get("type_name", |p: &mut Proxy| -> String { p.type_name.clone() })
        .register_get("address", |p: &mut Proxy| -> INT { p.address as INT })
        .register_fn("to_string", |p: &mut Proxy| -> String { p.to_string() })
        .register_fn("to_debug", |p: &mut Proxy| -> String { p.to_string() })
        .register_fn("==", |a: &mut Proxy, b: Proxy| -> bool { *a == b })
        .register_fn("!=", |a: &mut Proxy, b: Proxy| -> bool { *a != b });

    engine
        .register_type_with_name::<ProxyType>("ProxyType")
        .register_get("name", |t: &mut ProxyType| -> String { t.name.clone() })
        .register_get("module", |t: &mut ProxyType| -> String { t.module.clone() })
        .register_get("qualified_name", |t: &mut ProxyType| -> String { t.qualified_name() })
        .register_fn("to_string", |t: &mut ProxyType| -> String { t.to_string() })
        .register_fn("to_debug", |t: &mut ProxyType| -> String { t.to_string() });
}
