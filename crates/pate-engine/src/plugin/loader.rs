//! 插件发现与导入
//! Plugin discovery and import.
//!
//! Each root is walked depth-first with an explicit stack, entries in sorted
//! order. Every visited directory goes to the front of the search path, so
//! deeper directories take precedence over shallower ones, and is recorded in
//! the visited-directory list. Inside a directory:
//!
//! - `<stem>.<ext>` is a plugin imported as `<stem>`;
//! - a subdirectory `d` holding `d/d.<ext>` is a package plugin imported as
//!   `d` (that script is not imported again when `d` itself is visited).
//!
//! One plugin failing never stops discovery of the others.

use super::resolver::PluginResolver;
use crate::bridge::traceback;
use crate::error::{CallbackError, PluginImportError};
use crate::settings::APP_DIR_NAME;
use rhai::{Dynamic, Map};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 插件在磁盘上的布局
/// How a plugin is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    /// 单个脚本文件
    /// A single script file.
    File,
    /// 包含同名脚本的目录
    /// A directory holding a script with the directory's own name.
    Package,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::File => write!(f, "file"),
            PluginKind::Package => write!(f, "package"),
        }
    }
}

/// 成功导入的插件
/// A successfully imported plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRecord {
    /// Import name.
    pub name: String,
    /// Script that was imported.
    pub path: PathBuf,
    /// Directory the plugin was found in.
    pub directory: PathBuf,
    pub kind: PluginKind,
}

impl PluginRecord {
    /// The record as seen by scripts: `#{name, path, directory, kind}`.
    pub fn to_dynamic(&self) -> Dynamic {
        let mut map = Map::new();
        map.insert("name".into(), Dynamic::from(self.name.clone()));
        map.insert("path".into(), crate::bridge::path_to_dynamic(&self.path));
        map.insert("directory".into(), crate::bridge::path_to_dynamic(&self.directory));
        map.insert("kind".into(), Dynamic::from(self.kind.to_string()));
        Dynamic::from(map)
    }
}

/// 一次插件发现的结果
/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// 已导入的插件（按发现顺序）
    /// Imported plugins, in discovery order.
    pub plugins: Vec<PluginRecord>,
    /// 已访问的目录（按访问顺序）
    /// Visited directories, in visit order.
    pub directories: Vec<PathBuf>,
    /// Search path entries this pass added.
    pub added_paths: Vec<PathBuf>,
    /// 导入失败的插件
    /// Plugins that failed to import.
    pub errors: Vec<PluginImportError>,
    /// Failure of the post-load callback, filled in by the engine.
    pub callback: Option<CallbackError>,
    /// Plugin `init()` hooks that raised, filled in by the engine.
    pub init_errors: Vec<CallbackError>,
}

impl LoadReport {
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }
}

/// 遍历插件根目录并通过解析器导入插件
/// Walks plugin roots and imports what it finds through a resolver.
pub struct PluginLoader<'a> {
    engine: &'a rhai::Engine,
    resolver: &'a PluginResolver,
}

impl<'a> PluginLoader<'a> {
    pub fn new(engine: &'a rhai::Engine, resolver: &'a PluginResolver) -> Self {
        Self { engine, resolver }
    }

    /// Discover and import the plugins under `roots`. Missing roots are skipped.
    pub fn load(&self, roots: &[PathBuf]) -> LoadReport {
        let mut walk = Walk::default();

        for root in roots {
            if !root.is_dir() {
                debug!("Skipping missing plugin root {:?}", root);
                continue;
            }
            debug!("Scanning plugin root {:?}", root);
            let mut stack = vec![root.clone()];

            while let Some(dir) = stack.pop() {
                // Symlinked directories can form cycles.
                let canonical = dir.canonicalize().unwrap_or_else(|_| dir.clone());
                if !walk.visited.insert(canonical) {
                    continue;
                }
                self.visit(&dir, &mut stack, &mut walk);
            }
        }

        let report = walk.report;
        info!(
            "Loaded {} plugins from {} directories ({} failed)",
            report.plugins.len(),
            report.directories.len(),
            report.errors.len()
        );
        report
    }

    fn visit(&self, dir: &Path, stack: &mut Vec<PathBuf>, walk: &mut Walk) {
        self.add_to_search_path(dir, &mut walk.report);
        walk.report.directories.push(dir.to_path_buf());

        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not read plugin directory {:?}: {}", dir, e);
                return;
            }
        };

        let mut subdirs = Vec::new();
        for path in entries {
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }

            if path.is_dir() {
                let script = path.join(format!("{file_name}.{}", self.resolver.extension()));
                if script.is_file() {
                    self.add_to_search_path(&path, &mut walk.report);
                    self.import(&file_name, &script, &path, PluginKind::Package, walk);
                }
                subdirs.push(path);
            } else if self.is_script(&path) {
                // Already handled as the script of a package.
                if walk.claimed.contains(&path) {
                    continue;
                }
                let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                    continue;
                };
                self.import(&stem, &path, dir, PluginKind::File, walk);
            }
        }

        // Reversed so the stack pops subdirectories in sorted order.
        stack.extend(subdirs.into_iter().rev());
    }

    fn is_script(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy() == self.resolver.extension())
    }

    fn add_to_search_path(&self, dir: &Path, report: &mut LoadReport) {
        if self.resolver.search_path().prepend(dir) {
            report.added_paths.push(dir.to_path_buf());
        }
    }

    fn import(&self, name: &str, script: &Path, directory: &Path, kind: PluginKind, walk: &mut Walk) {
        walk.claimed.insert(script.to_path_buf());
        // A name is taken by the first plugin that imports successfully.
        if walk.names.contains(name) {
            warn!(
                "Skipping plugin '{}' at {:?}: a plugin of that name was already loaded",
                name, script
            );
            return;
        }

        match self.resolver.import_file(self.engine, name, script) {
            Ok(_) => {
                info!("Loaded plugin '{}'", name);
                walk.names.insert(name.to_string());
                walk.report.plugins.push(PluginRecord {
                    name: name.to_string(),
                    path: script.to_path_buf(),
                    directory: directory.to_path_buf(),
                    kind,
                });
            }
            Err(err) => {
                let message = traceback(&format!("Could not load plugin '{name}'"), &err);
                walk.report.errors.push(PluginImportError {
                    plugin: name.to_string(),
                    path: script.to_path_buf(),
                    message,
                });
            }
        }
    }
}

/// Traversal bookkeeping for one [`PluginLoader::load`] call.
#[derive(Default)]
struct Walk {
    report: LoadReport,
    visited: HashSet<PathBuf>,
    names: HashSet<String>,
    claimed: HashSet<PathBuf>,
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

/// User plugin directory: `<data dir>/pate/plugins`.
pub fn user_plugin_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME).join("plugins"))
}

/// System plugin directories that exist: `$XDG_DATA_DIRS/pate/plugins`, then
/// `/usr/local/share/pate/plugins` and `/usr/share/pate/plugins`.
pub fn system_plugin_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(data_dirs) = std::env::var("XDG_DATA_DIRS") {
        for dir in data_dirs.split(':').filter(|d| !d.is_empty()) {
            let plugin_dir = PathBuf::from(dir).join(APP_DIR_NAME).join("plugins");
            if plugin_dir.is_dir() && !dirs.contains(&plugin_dir) {
                dirs.push(plugin_dir);
            }
        }
    }

    for dir in ["/usr/local/share/pate/plugins", "/usr/share/pate/plugins"] {
        let path = PathBuf::from(dir);
        if path.is_dir() && !dirs.contains(&path) {
            dirs.push(path);
        }
    }

    dirs
}

/// Well-known plugin roots, user directory first.
pub fn default_plugin_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(user_dir) = user_plugin_dir() {
        dirs.push(user_dir);
    }
    for dir in system_plugin_dirs() {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}
