//! Process-wide record of the loaded engine module.
//!
//! Only the command that loads a netlist maps the module. Every other command
//! attaches to the already resident module and fails if there is none.

use std::cell::RefCell;
use std::ffi::{CStr, c_void};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;

use crate::callbacks::CallbackContext;
use crate::error::{EngineError, Result};
use crate::ffi::HostCallbacks;
use crate::loader::{DynamicLoader, ModuleBackend, ModuleImage, OpenMode};

/// Hint attached to attach failures.
pub const NOT_LOADED_HINT: &str =
    "Run \"pannet('filename')\" command before reading simulation results.";

/// A resolved entry point of type `F` (an `extern "C"` fn pointer type).
///
/// Keeps the module image alive for as long as the entry point exists.
pub struct EntryPoint<F> {
    _image: Arc<dyn ModuleImage>,
    address: NonNull<c_void>,
    _marker: PhantomData<F>,
}

impl<F: Copy> EntryPoint<F> {
    /// The callable function pointer.
    pub fn get(&self) -> F {
        const { assert!(size_of::<F>() == size_of::<*mut c_void>()) };
        // SAFETY: `resolve` was asked for this symbol with this signature.
        unsafe { std::mem::transmute_copy(&self.address) }
    }
}

/// An open reference to a module.
#[derive(Clone)]
pub struct ModuleHandle {
    path: PathBuf,
    image: Arc<dyn ModuleImage>,
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ModuleHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the module exports `symbol`.
    pub fn has_symbol(&self, symbol: &CStr) -> bool {
        self.image.address(symbol).is_some()
    }

    /// Resolve `symbol` as a function of type `F`.
    ///
    /// # Safety
    ///
    /// `F` must be the exported function's exact signature.
    pub unsafe fn resolve<F: Copy>(&self, symbol: &CStr) -> Result<EntryPoint<F>> {
        let address = self.image.address(symbol).ok_or_else(|| {
            EngineError::SymbolMissing {
                symbol: symbol.to_string_lossy().into_owned(),
                path: self.path.clone(),
            }
        })?;
        log::debug!("resolved {:?} in {}", symbol, self.path.display());
        Ok(EntryPoint {
            _image: Arc::clone(&self.image),
            address,
            _marker: PhantomData,
        })
    }
}

/// Callback state registered with the loaded module.
pub(crate) struct Registration {
    pub context: Rc<CallbackContext>,
    pub table: Box<HostCallbacks>,
}

struct LoadedModule {
    handle: ModuleHandle,
    registration: Option<Registration>,
}

impl LoadedModule {
    /// Forget the module's N-port state, even if a running callback still
    /// holds the context.
    fn close(self) {
        if let Some(registration) = &self.registration {
            registration.context.bridge().clear();
        }
        log::info!("closing {}", self.handle.path().display());
    }
}

/// Loaded-module bookkeeping on top of a [`ModuleBackend`].
pub struct ModuleRegistry {
    backend: Rc<dyn ModuleBackend>,
    primary: Option<LoadedModule>,
}

thread_local! {
    static GLOBAL: RefCell<ModuleRegistry> = RefCell::new(ModuleRegistry::new(Rc::new(DynamicLoader)));
}

impl ModuleRegistry {
    pub fn new(backend: Rc<dyn ModuleBackend>) -> Self {
        Self {
            backend,
            primary: None,
        }
    }

    /// Run `f` on this thread's registry.
    ///
    /// Each thread has its own registry: a module loaded on one thread is not
    /// visible from another, which sees no loaded module.
    ///
    /// `f` must not call into the engine: the engine can re-enter the
    /// front-ends through host callbacks, which borrow the registry again.
    pub fn with_global<R>(f: impl FnOnce(&mut ModuleRegistry) -> R) -> R {
        GLOBAL.with(|registry| f(&mut registry.borrow_mut()))
    }

    /// Swap this thread's registry, returning the previous one.
    pub fn replace_global(registry: ModuleRegistry) -> ModuleRegistry {
        GLOBAL.with(|global| global.replace(registry))
    }

    /// Path of the loaded module.
    pub fn loaded_path(&self) -> Option<&Path> {
        self.primary.as_ref().map(|m| m.handle.path())
    }

    pub fn is_loaded(&self) -> bool {
        self.primary.is_some()
    }

    /// Load `path` as the primary module, closing any previous one.
    pub fn load(&mut self, path: &Path) -> Result<ModuleHandle> {
        if let Some(previous) = self.primary.take() {
            previous.close();
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                return Err(EngineError::NotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        let image = self
            .backend
            .open(path, OpenMode::Load)
            .map_err(|reason| EngineError::LoadError {
                path: path.to_path_buf(),
                reason,
            })?;
        log::info!("loaded {}", path.display());

        let handle = ModuleHandle {
            path: path.to_path_buf(),
            image,
        };
        self.primary = Some(LoadedModule {
            handle: handle.clone(),
            registration: None,
        });
        Ok(handle)
    }

    /// Reopen the loaded module without loading it.
    pub fn attach(&self, path: &Path) -> Result<ModuleHandle> {
        let not_loaded = || EngineError::NotLoaded {
            path: path.to_path_buf(),
            hint: NOT_LOADED_HINT.to_string(),
        };
        if self.loaded_path() != Some(path) {
            return Err(not_loaded());
        }
        let image = self
            .backend
            .open(path, OpenMode::Attach)
            .map_err(|reason| {
                log::debug!("attach to {} failed: {}", path.display(), reason);
                not_loaded()
            })?;
        Ok(ModuleHandle {
            path: path.to_path_buf(),
            image,
        })
    }

    /// Resolve `symbol` on the primary module, closing it on failure.
    ///
    /// # Safety
    ///
    /// `F` must be the exported function's exact signature.
    pub unsafe fn resolve<F: Copy>(&mut self, symbol: &CStr) -> Result<EntryPoint<F>> {
        let Some(primary) = &self.primary else {
            return Err(EngineError::NotLoaded {
                path: PathBuf::new(),
                hint: NOT_LOADED_HINT.to_string(),
            });
        };
        // SAFETY: forwarded to the caller.
        let resolved = unsafe { primary.handle.resolve(symbol) };
        if resolved.is_err() {
            self.unload();
        }
        resolved
    }

    /// Keep the callback state alive while the module is loaded.
    pub(crate) fn register(&mut self, registration: Registration) {
        if let Some(primary) = &mut self.primary {
            primary.registration = Some(registration);
        }
    }

    /// Callback context of the loaded module.
    pub fn callback_context(&self) -> Option<Rc<CallbackContext>> {
        self.primary
            .as_ref()
            .and_then(|m| m.registration.as_ref())
            .map(|r| Rc::clone(&r.context))
    }

    /// Close the primary module.
    pub fn unload(&mut self) {
        if let Some(module) = self.primary.take() {
            module.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panmat_core::{StructValue, Workspace};
    use panmat_nport::SetupRequest;
    use std::collections::HashMap;
    use std::ffi::c_int;

    unsafe extern "C" fn answer() -> c_int {
        42
    }

    struct FakeImage(HashMap<&'static str, usize>);

    impl ModuleImage for FakeImage {
        fn address(&self, symbol: &CStr) -> Option<NonNull<c_void>> {
            let name = symbol.to_str().ok()?;
            self.0.get(name).and_then(|&a| NonNull::new(a as *mut c_void))
        }
    }

    struct FakeBackend;

    impl ModuleBackend for FakeBackend {
        fn open(&self, path: &Path, _mode: OpenMode) -> std::result::Result<Arc<dyn ModuleImage>, String> {
            if path.ends_with("broken.so") {
                return Err("invalid ELF header".to_string());
            }
            let symbols = HashMap::from([("Answer", answer as usize)]);
            Ok(Arc::new(FakeImage(symbols)))
        }
    }

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(Rc::new(FakeBackend))
    }

    type AnswerFn = unsafe extern "C" fn() -> c_int;

    #[test]
    fn test_load_then_resolve() {
        let mut reg = registry();
        reg.load(Path::new("panMat.so")).unwrap();
        let entry = unsafe { reg.resolve::<AnswerFn>(c"Answer") }.unwrap();
        assert_eq!(unsafe { (entry.get())() }, 42);
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("panMat.so");
        let err = registry().load(&path).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_loader_reason_is_reported() {
        let err = registry().load(Path::new("broken.so")).unwrap_err();
        assert!(err.to_string().contains("invalid ELF header"));
    }

    #[test]
    fn test_attach_requires_load() {
        let mut reg = registry();
        let err = reg.attach(Path::new("panMat.so")).err().unwrap();
        assert!(err.to_string().contains(NOT_LOADED_HINT));

        reg.load(Path::new("panMat.so")).unwrap();
        assert!(reg.attach(Path::new("panMat.so")).is_ok());
        assert!(reg.attach(Path::new("other.so")).is_err());
    }

    #[test]
    fn test_missing_symbol_closes_module() {
        let mut reg = registry();
        reg.load(Path::new("panMat.so")).unwrap();
        let err = unsafe { reg.resolve::<AnswerFn>(c"InitialiseGlobals") }
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "The <InitialiseGlobals> evaluate routine is not found in <panMat.so> shared module."
        );
        assert!(!reg.is_loaded());
        assert!(matches!(
            reg.attach(Path::new("panMat.so")),
            Err(EngineError::NotLoaded { .. })
        ));
    }

    #[test]
    fn test_reload_replaces_primary() {
        let mut reg = registry();
        reg.load(Path::new("panMat.so")).unwrap();
        reg.load(Path::new("panMat2.so")).unwrap();
        assert_eq!(reg.loaded_path(), Some(Path::new("panMat2.so")));
    }

    #[test]
    fn test_unload_clears_nport_state() {
        let ws = Rc::new(Workspace::new());
        ws.register_function("ctl", |_, _, _| {
            Ok(vec![StructValue::new().with_field("g", 1.0).into()])
        });
        let mut reg = registry();
        reg.load(Path::new("panMat.so")).unwrap();

        let context = Rc::new(CallbackContext::new(ws.clone(), None));
        let request = SetupRequest {
            function: "ctl".to_string(),
            model: "m1".to_string(),
            export: true,
        };
        context.bridge().set_up(ws.as_ref(), &request).unwrap();
        let table = Box::new(context.callback_table());
        reg.register(Registration {
            context: Rc::clone(&context),
            table,
        });

        reg.unload();
        assert!(context.bridge().exported("m1").is_none());
        assert!(context.bridge().keywords("ctl").is_none());
    }
}
