//! Shared fixtures: a temporary support directory and plugin root.

#![allow(dead_code)]

use pate_engine::{Engine, EngineSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Support module recording callback invocations in the configuration.
pub const SUPPORT_SCRIPT: &str = r#"
fn _pluginsLoaded() {
    let cfg = pate::configuration;
    cfg["loaded_calls"] = cfg.get("loaded_calls", 0) + 1;
}

fn _pluginsUnloaded() {
    let cfg = pate::configuration;
    cfg["unloaded_calls"] = cfg.get("unloaded_calls", 0) + 1;
}

fn answer() {
    42
}

fn explode() {
    throw "kaboom";
}
"#;

pub struct Fixture {
    pub temp: TempDir,
    pub support_dir: PathBuf,
    pub plugin_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_support(SUPPORT_SCRIPT)
    }

    pub fn with_support(script: &str) -> Self {
        let fixture = Self::without_support();
        fs::write(fixture.support_dir.join("host.rhai"), script).unwrap();
        fixture
    }

    /// A fixture whose support directory is empty.
    pub fn without_support() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let support_dir = temp.path().join("support");
        let plugin_dir = temp.path().join("plugins");
        fs::create_dir_all(&support_dir).unwrap();
        fs::create_dir_all(&plugin_dir).unwrap();
        Self {
            temp,
            support_dir,
            plugin_dir,
        }
    }

    /// Write a plugin file relative to the plugin root.
    pub fn write_plugin(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.plugin_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn plugin_path(&self, relative: &str) -> PathBuf {
        self.plugin_dir.join(relative)
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings::default()
            .with_support_dir(self.support_dir.clone())
            .with_plugin_dirs([self.plugin_dir.clone()])
    }

    pub fn engine(&self) -> Arc<Engine> {
        Arc::new(Engine::new(self.settings()))
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}
