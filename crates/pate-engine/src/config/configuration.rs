//! The live configuration mapping shared between the host and scripts.
//!
//! A [`Configuration`] is a handle: clones share the same storage, so a value
//! a script stores through `pate::configuration` is what the next `save` sees.

use parking_lot::RwLock;
use rhai::{Array, Dynamic, INT, ImmutableString, Map};
use std::fmt;
use std::sync::Arc;

/// Flat key/value mapping of guest values.
#[derive(Clone, Default)]
pub struct Configuration {
    inner: Arc<RwLock<Map>>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Dynamic> {
        self.inner.read().get(key).cloned()
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn insert(&self, key: &str, value: Dynamic) -> Option<Dynamic> {
        self.inner.write().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Dynamic> {
        self.inner.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().keys().map(|k| k.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Map {
        self.inner.read().clone()
    }

    /// Whether both handles refer to the same storage.
    pub fn ptr_eq(&self, other: &Configuration) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A view of the nested map stored under `name`.
    pub fn section(&self, name: &str) -> ConfigSection {
        ConfigSection {
            root: self.clone(),
            name: name.to_string(),
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.read().iter()).finish()
    }
}

/// Per-plugin view over one nested map of a [`Configuration`].
///
/// The section is created on first write; reading a missing section yields
/// nothing. A non-map value stored under the section name is replaced on
/// first write.
#[derive(Clone, Debug)]
pub struct ConfigSection {
    root: Configuration,
    name: String,
}

impl ConfigSection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<Dynamic> {
        let root = self.root.inner.read();
        let section = root.get(self.name.as_str())?;
        let map = section.read_lock::<Map>()?;
        map.get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Dynamic) {
        let mut root = self.root.inner.write();
        let entry = root
            .entry(self.name.as_str().into())
            .or_insert_with(|| Dynamic::from(Map::new()));
        if !entry.is_map() {
            *entry = Dynamic::from(Map::new());
        }
        if let Some(mut map) = entry.write_lock::<Map>() {
            map.insert(key.into(), value);
        }
    }

    pub fn remove(&self, key: &str) -> Option<Dynamic> {
        let mut root = self.root.inner.write();
        let section = root.get_mut(self.name.as_str())?;
        let mut map = section.write_lock::<Map>()?;
        map.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let root = self.root.inner.read();
        root.get(self.name.as_str())
            .and_then(|section| section.read_lock::<Map>().map(|m| m.keys().map(|k| k.to_string()).collect()))
            .unwrap_or_default()
    }
}

/// Register the configuration types and their script API.
///
/// Methods take the handle by value so they also work on the read-only
/// `pate::configuration` constant; indexers need a local copy
/// (`let cfg = pate::configuration;`), which shares the same storage.
pub(crate) fn register_types(engine: &mut rhai::Engine) {
    engine
        .register_type_with_name::<Configuration>("Configuration")
        .register_indexer_get(|c: &mut Configuration, key: ImmutableString| -> Dynamic {
            c.get(&key).unwrap_or(Dynamic::UNIT)
        })
        .register_indexer_set(|c: &mut Configuration, key: ImmutableString, value: Dynamic| {
            c.insert(&key, value);
        })
        .register_fn("get", |c: Configuration, key: &str| -> Dynamic {
            c.get(key).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("get", |c: Configuration, key: &str, default: Dynamic| -> Dynamic {
            c.get(key).unwrap_or(default)
        })
        .register_fn("set", |c: Configuration, key: &str, value: Dynamic| {
            c.insert(key, value);
        })
        .register_fn("contains", |c: Configuration, key: &str| -> bool { c.contains_key(key) })
        .register_fn("remove", |c: Configuration, key: &str| -> Dynamic {
            c.remove(key).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("keys", |c: Configuration| -> Array {
            c.keys().into_iter().map(Dynamic::from).collect()
        })
        .register_fn("len", |c: Configuration| -> INT { c.len() as INT })
        .register_fn("clear", |c: Configuration| c.clear())
        .register_fn("section", |c: Configuration, name: &str| -> ConfigSection {
            c.section(name)
        })
        .register_fn("to_string", |c: Configuration| -> String {
            format!("{:?}", c.snapshot())
        })
        .register_fn("to_debug", |c: Configuration| -> String {
            format!("Configuration({:?})", c.snapshot())
        });

    engine
        .register_type_with_name::<ConfigSection>("ConfigSection")
        .register_indexer_get(|s: &mut ConfigSection, key: ImmutableString| -> Dynamic {
            s.get(&key).unwrap_or(Dynamic::UNIT)
        })
        .register_indexer_set(|s: &mut ConfigSection, key: ImmutableString, value: Dynamic| {
            s.insert(&key, value);
        })
        .register_fn("get", |s: ConfigSection, key: &str, default: Dynamic| -> Dynamic {
            s.get(key).unwrap_or(default)
        })
        .register_fn("set", |s: ConfigSection, key: &str, value: Dynamic| {
            s.insert(key, value);
        })
        .register_fn("remove", |s: ConfigSection, key: &str| -> Dynamic {
            s.remove(key).unwrap_or(Dynamic::UNIT)
        })
        .register_fn("keys", |s: ConfigSection| -> Array {
            s.keys().into_iter().map(Dynamic::from).collect()
        })
        .register_get("name", |s: &mut ConfigSection| -> String { s.name.clone() });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let config = Configuration::new();
        let handle = config.clone();
        handle.insert("answer", Dynamic::from(42_i64));

        assert!(config.ptr_eq(&handle));
        assert_eq!(config.get("answer").unwrap().as_int().unwrap(), 42);
        assert_eq!(config.keys(), vec!["answer"]);
    }

    #[test]
    fn test_section_creates_nested_map() {
        let config = Configuration::new();
        let section = config.section("expand");
        assert!(section.get("x").is_none());

        section.insert("x", Dynamic::from("y".to_string()));
        assert_eq!(section.get("x").unwrap().to_string(), "y");
        assert!(config.get("expand").unwrap().is_map());
        assert_eq!(section.keys(), vec!["x"]);

        assert!(section.remove("x").is_some());
        assert!(section.keys().is_empty());
    }

    #[test]
    fn test_section_replaces_scalar() {
        let config = Configuration::new();
        config.insert("plugin", Dynamic::from(1_i64));
        config.section("plugin").insert("k", Dynamic::from(true));
        assert!(config.get("plugin").unwrap().is_map());
    }

    #[test]
    fn test_script_api() {
        let mut engine = rhai::Engine::new();
        register_types(&mut engine);

        let config = Configuration::new();
        config.insert("count", Dynamic::from(1_i64));

        let mut scope = rhai::Scope::new();
        scope.push("cfg", config.clone());
        let result = engine
            .eval_with_scope::<INT>(
                &mut scope,
                r#"
                cfg["count"] = cfg["count"] + 1;
                cfg.set("name", "pate");
                let s = cfg.section("plugin");
                s["enabled"] = true;
                cfg.len()
                "#,
            )
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(config.get("count").unwrap().as_int().unwrap(), 2);
        assert_eq!(config.get("name").unwrap().to_string(), "pate");
        assert!(config.section("plugin").get("enabled").unwrap().as_bool().unwrap());
    }
}
