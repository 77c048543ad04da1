//! 模块解析：搜索路径、模块缓存与解释器使用的解析器
//! Module resolution: search path, module cache and the resolver installed
//! into the interpreter.
//!
//! `import "name"` inside a script and plugin imports made by the loader go
//! through the same [`PluginResolver`], so a plugin imported once is shared
//! by every script that imports it afterwards.

use parking_lot::{Mutex, RwLock};
use rhai::{AST, EvalAltResult, Module, ModuleResolver, Position, Scope, Shared};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 有序的模块搜索目录列表，靠前的优先
/// Ordered list of directories searched for modules; earlier entries win.
#[derive(Debug, Default)]
pub struct SearchPath {
    dirs: RwLock<Vec<PathBuf>>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `dir` at the front of the path.
    ///
    /// An entry already on the path is moved to the front. Returns `true`
    /// when the entry was not on the path before.
    pub fn prepend(&self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        let mut dirs = self.dirs.write();
        let existing = dirs.iter().position(|d| *d == dir);
        if let Some(index) = existing {
            dirs.remove(index);
        }
        dirs.insert(0, dir);
        existing.is_none()
    }

    /// Remove `dir` from the path. Returns `false` if it was not there.
    pub fn remove(&self, dir: &Path) -> bool {
        let mut dirs = self.dirs.write();
        match dirs.iter().position(|d| d == dir) {
            Some(index) => {
                dirs.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.read().iter().any(|d| d == dir)
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.dirs.read().clone()
    }

    pub fn clear(&self) {
        self.dirs.write().clear();
    }

    /// First `<dir>/<name>.<ext>` or `<dir>/<name>/<name>.<ext>` on the path.
    pub fn find(&self, name: &str, extension: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        let file_name = format!("{name}.{extension}");
        self.dirs.read().iter().find_map(|dir| {
            [dir.join(&file_name), dir.join(name).join(&file_name)]
                .into_iter()
                .find(|candidate| candidate.is_file())
        })
    }
}

/// 解释器已知的模块
/// A module known to the interpreter.
#[derive(Clone)]
pub struct LoadedModule {
    /// Import name.
    pub name: String,
    /// Script file; `None` for native modules.
    pub path: Option<PathBuf>,
    /// The evaluated module.
    pub module: Shared<Module>,
    /// Compiled script, kept so its functions can be called from the host.
    pub ast: Option<AST>,
}

impl LoadedModule {
    /// Wrap a module built on the host side.
    pub fn native(name: impl Into<String>, module: Module) -> Self {
        Self {
            name: name.into(),
            path: None,
            module: module.into(),
            ast: None,
        }
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// 已导入的模块，以导入名为键
/// Modules imported so far, keyed by import name.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: RwLock<HashMap<String, LoadedModule>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<LoadedModule> {
        self.modules.read().get(name).cloned()
    }

    pub fn insert(&self, module: LoadedModule) -> Option<LoadedModule> {
        self.modules.write().insert(module.name.clone(), module)
    }

    pub fn remove(&self, name: &str) -> Option<LoadedModule> {
        self.modules.write().remove(name)
    }

    /// Remove `name` only if it was imported from the script at `path`.
    pub fn remove_script(&self, name: &str, path: &Path) -> Option<LoadedModule> {
        let mut modules = self.modules.write();
        let imported_here = modules
            .get(name)
            .and_then(|m| m.path.as_deref())
            .is_some_and(|cached| same_file(cached, path));
        if imported_here {
            modules.remove(name)
        } else {
            None
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    /// Import names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    pub fn clear(&self) {
        self.modules.write().clear();
    }
}

struct ResolverInner {
    search_path: SearchPath,
    cache: ModuleCache,
    extension: String,
    importing: Mutex<HashSet<String>>,
}

/// 按搜索路径解析导入，并缓存加载的每个模块
/// Resolves imports against the search path, caching every module it loads.
///
/// Clones share the same search path and cache.
#[derive(Clone)]
pub struct PluginResolver {
    inner: Arc<ResolverInner>,
}

impl PluginResolver {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                search_path: SearchPath::new(),
                cache: ModuleCache::new(),
                extension: extension.into(),
                importing: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.inner.search_path
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.inner.cache
    }

    pub fn extension(&self) -> &str {
        &self.inner.extension
    }

    /// Import `name`: a cached module if there is one, otherwise the first
    /// matching script on the search path.
    pub fn import(
        &self,
        engine: &rhai::Engine,
        name: &str,
    ) -> Result<LoadedModule, Box<EvalAltResult>> {
        if let Some(module) = self.inner.cache.get(name) {
            return Ok(module);
        }
        let path = self
            .inner
            .search_path
            .find(name, &self.inner.extension)
            .ok_or_else(|| EvalAltResult::ErrorModuleNotFound(name.to_string(), Position::NONE))?;
        self.import_file(engine, name, &path)
    }

    /// Import the script at `path` under `name`, replacing nothing.
    ///
    /// A cached module of that name is returned as is when it was imported
    /// from the same file. A native module, or one imported from another
    /// file, is a name clash and fails the import.
    pub fn import_file(
        &self,
        engine: &rhai::Engine,
        name: &str,
        path: &Path,
    ) -> Result<LoadedModule, Box<EvalAltResult>> {
        if let Some(module) = self.inner.cache.get(name) {
            return match module.path.as_deref() {
                Some(cached) if same_file(cached, path) => Ok(module),
                Some(cached) => {
                    Err(format!("Module '{name}' is already loaded from {cached:?}").into())
                }
                None => Err(format!("Module '{name}' is already provided by the host").into()),
            };
        }
        if !self.inner.importing.lock().insert(name.to_string()) {
            return Err(format!("Circular import of module '{name}'").into());
        }

        // The lock is not held while the script runs; nested imports re-enter.
        let result = evaluate_script(engine, name, path);
        self.inner.importing.lock().remove(name);

        let module = result?;
        debug!("Imported module '{}' from {:?}", name, path);
        self.inner.cache.insert(module.clone());
        Ok(module)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b
        || matches!(
            (a.canonicalize(), b.canonicalize()),
            (Ok(a), Ok(b)) if a == b
        )
}

fn evaluate_script(
    engine: &rhai::Engine,
    name: &str,
    path: &Path,
) -> Result<LoadedModule, Box<EvalAltResult>> {
    let mut ast = engine.compile_file(path.to_path_buf())?;
    ast.set_source(path.to_string_lossy().into_owned());

    let mut module = Module::eval_ast_as_new(Scope::new(), &ast, engine)?;
    module.set_id(name);

    Ok(LoadedModule {
        name: name.to_string(),
        path: Some(path.to_path_buf()),
        module: module.into(),
        ast: Some(ast),
    })
}

impl ModuleResolver for PluginResolver {
    fn resolve(
        &self,
        engine: &rhai::Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        self.import(engine, path)
            .map(|loaded| loaded.module)
            .map_err(|err| match *err {
                EvalAltResult::ErrorModuleNotFound(name, _) => {
                    EvalAltResult::ErrorModuleNotFound(name, pos).into()
                }
                other => EvalAltResult::ErrorInModule(path.to_string(), other.into(), pos).into(),
            })
    }
}
