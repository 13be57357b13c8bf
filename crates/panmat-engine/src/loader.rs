//! Opening shared modules and looking up addresses.
//!
//! [`ModuleBackend`] is the seam between the registry and the platform loader;
//! [`DynamicLoader`] is the `libloading` implementation.

use std::ffi::{CStr, c_void};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

/// How a module is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Map the module with global symbol visibility; it stays resident after close.
    Load,
    /// Reopen a module that is already resident, never loading it.
    Attach,
}

/// An open module.
pub trait ModuleImage {
    /// Address of an exported symbol.
    fn address(&self, symbol: &CStr) -> Option<NonNull<c_void>>;
}

/// A way of opening modules.
pub trait ModuleBackend {
    /// Open `path`; the error is the loader's reason text.
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Arc<dyn ModuleImage>, String>;
}

/// Platform dynamic loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLoader;

#[cfg(unix)]
mod platform {
    use super::*;
    use libloading::os::unix::Library;

    pub struct Image(pub Library);

    impl ModuleImage for Image {
        fn address(&self, symbol: &CStr) -> Option<NonNull<c_void>> {
            // SAFETY: the symbol is read as an untyped address, never called here.
            let sym = unsafe { self.0.get::<*mut c_void>(symbol.to_bytes_with_nul()) }.ok()?;
            NonNull::new(*sym)
        }
    }

    pub fn open(path: &Path, mode: OpenMode) -> Result<Library, libloading::Error> {
        let flags = match mode {
            OpenMode::Load => libc::RTLD_LAZY | libc::RTLD_GLOBAL | libc::RTLD_NODELETE,
            OpenMode::Attach => libc::RTLD_LAZY | libc::RTLD_NOLOAD,
        };
        // SAFETY: loading runs the module's initialisers; the engine module is trusted.
        unsafe { Library::open(Some(path), flags) }
    }
}

#[cfg(windows)]
mod platform {
    use super::*;
    use libloading::os::windows::Library;

    pub struct Image(pub Library);

    impl ModuleImage for Image {
        fn address(&self, symbol: &CStr) -> Option<NonNull<c_void>> {
            // SAFETY: the symbol is read as an untyped address, never called here.
            let sym = unsafe { self.0.get::<*mut c_void>(symbol.to_bytes_with_nul()) }.ok()?;
            NonNull::new(*sym)
        }
    }

    pub fn open(path: &Path, mode: OpenMode) -> Result<Library, libloading::Error> {
        // SAFETY: loading runs the module's initialisers; the engine module is trusted.
        unsafe {
            match mode {
                OpenMode::Load => Library::new(path),
                OpenMode::Attach => Library::open_already_loaded(path),
            }
        }
    }
}

impl ModuleBackend for DynamicLoader {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Arc<dyn ModuleImage>, String> {
        let library = platform::open(path, mode).map_err(|e| e.to_string())?;
        log::debug!("opened {} ({:?})", path.display(), mode);
        Ok(Arc::new(platform::Image(library)))
    }
}
