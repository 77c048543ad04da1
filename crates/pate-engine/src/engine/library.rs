//! The interpreter's shared runtime library.
//!
//! On Unix the library is opened with `RTLD_NOW | RTLD_GLOBAL` so native
//! extensions loaded later resolve their symbols against it.

use crate::error::LibraryLoadError;
use libloading::Library;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An opened runtime library. Closed explicitly or when dropped.
pub struct RuntimeLibrary {
    path: PathBuf,
    library: Option<Library>,
}

impl RuntimeLibrary {
    /// Open `path` (a file path or a soname) with global symbol visibility.
    pub fn open(path: &Path) -> Result<Self, LibraryLoadError> {
        debug!("Opening runtime library {:?}", path);
        let library = open_global(path).map_err(|e| LibraryLoadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded runtime library {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            library: Some(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unload the library.
    pub fn close(mut self) -> Result<(), LibraryLoadError> {
        let Some(library) = self.library.take() else {
            return Ok(());
        };
        library.close().map_err(|e| LibraryLoadError {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        debug!("Closed runtime library {:?}", self.path);
        Ok(())
    }
}

impl std::fmt::Debug for RuntimeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeLibrary")
            .field("path", &self.path)
            .field("open", &self.library.is_some())
            .finish()
    }
}

#[cfg(unix)]
fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    // SAFETY: the library's initializers run here; the configured runtime is
    // trusted by the host that configured it.
    let library = unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL)? };
    Ok(library.into())
}

#[cfg(not(unix))]
fn open_global(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: see the Unix variant.
    unsafe { Library::new(path) }
}
