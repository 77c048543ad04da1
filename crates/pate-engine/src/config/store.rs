//! 持久化键值存储
//! Persisted key/value stores.
//!
//! The host persists configuration as flat groups of string entries. Values
//! are literal text produced by the codec; the store never interprets them.

use crate::error::StoreError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 宿主持有的分组键值存储
/// A flat, grouped key/value store owned by the host.
pub trait ConfigStore: Send {
    /// Whether the store holds a group of that name.
    fn has_group(&self, group: &str) -> bool;

    /// Keys of `group`, in a stable order.
    fn keys(&self, group: &str) -> Vec<String>;

    /// Text stored under `group`/`key`.
    fn read_entry(&self, group: &str, key: &str) -> Option<String>;

    /// Store `value` under `group`/`key`, creating the group if needed.
    fn write_entry(&mut self, group: &str, key: &str, value: &str);

    /// Flush pending writes to durable storage.
    fn sync(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store shared between the host and the engine.
pub type SharedStore = Arc<Mutex<dyn ConfigStore>>;

/// Wrap a store for sharing.
pub fn shared<S: ConfigStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

type Groups = BTreeMap<String, BTreeMap<String, String>>;

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    groups: Groups,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    fn keys(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read_entry(&self, group: &str, key: &str) -> Option<String> {
        self.groups.get(group)?.get(key).cloned()
    }

    fn write_entry(&mut self, group: &str, key: &str, value: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }
}

/// Store persisted as a TOML document, one table per group.
///
/// ```toml
/// [Pate]
/// recent = '["a.txt", "b.txt"]'
/// ```
#[derive(Debug, Clone)]
pub struct TomlStore {
    path: PathBuf,
    groups: Groups,
    dirty: bool,
}

impl TomlStore {
    /// Open the store at `path`; a missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let groups = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            parse_groups(&content)?
        } else {
            Groups::new()
        };
        debug!("Opened config store {:?} ({} groups)", path, groups.len());
        Ok(Self {
            path,
            groups,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_groups(content: &str) -> Result<Groups, StoreError> {
    let table: toml::Table = content.parse()?;
    let mut groups = Groups::new();
    for (name, value) in table {
        let toml::Value::Table(entries) = value else {
            continue;
        };
        let group = groups.entry(name).or_default();
        for (key, value) in entries {
            let text = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            group.insert(key, text);
        }
    }
    Ok(groups)
}

impl ConfigStore for TomlStore {
    fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    fn keys(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read_entry(&self, group: &str, key: &str) -> Option<String> {
        self.groups.get(group)?.get(key).cloned()
    }

    fn write_entry(&mut self, group: &str, key: &str, value: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.dirty = true;
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let mut table = toml::Table::new();
        for (name, entries) in &self.groups {
            let group: toml::Table = entries
                .iter()
                .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
                .collect();
            table.insert(name.clone(), toml::Value::Table(group));
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string(&table)?)?;
        self.dirty = false;
        debug!("Synced config store {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(!store.has_group("Pate"));
        store.write_entry("Pate", "b", "2");
        store.write_entry("Pate", "a", "1");

        assert!(store.has_group("Pate"));
        assert_eq!(store.keys("Pate"), vec!["a", "b"]);
        assert_eq!(store.read_entry("Pate", "a").as_deref(), Some("1"));
        assert!(store.read_entry("Other", "a").is_none());
    }

    #[test]
    fn test_toml_store_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("session").join("pate.toml");

        let mut store = TomlStore::open(&path).unwrap();
        store.write_entry("Pate", "names", r#"["a", "b"]"#);
        store.write_entry("Pate", "count", "3");
        store.sync().unwrap();

        let reopened = TomlStore::open(&path).unwrap();
        assert_eq!(reopened.keys("Pate"), vec!["count", "names"]);
        assert_eq!(reopened.read_entry("Pate", "names").as_deref(), Some(r#"["a", "b"]"#));
    }

    #[test]
    fn test_toml_store_reads_non_string_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pate.toml");
        std::fs::write(&path, "[Pate]\ncount = 3\nflag = true\n").unwrap();

        let store = TomlStore::open(&path).unwrap();
        assert_eq!(store.read_entry("Pate", "count").as_deref(), Some("3"));
        assert_eq!(store.read_entry("Pate", "flag").as_deref(), Some("true"));
    }

    #[test]
    fn test_shared_store() {
        let store = shared(MemoryStore::new());
        store.lock().write_entry("g", "k", "v");
        assert!(store.lock().has_group("g"));
    }
}
