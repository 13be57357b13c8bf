//! Typed calls into the engine module.
//!
//! Entry points are resolved inside a short registry borrow and called after
//! it ends, since the engine may re-enter the front-ends while it runs.

use std::ffi::{CStr, c_char, c_ulong};
use std::path::Path;
use std::ptr;
use std::rc::Rc;

use panmat_core::{EngineValue, Host, tokenize};

use crate::callbacks::CallbackContext;
use crate::config::BridgeConfig;
use crate::error::{EngineError, Result};
use crate::ffi::{
    self, CStringArgv, DeleteWaveformFn, ExecuteCommandFn, GetValueFn, InitialiseGlobalsFn,
    MatlabPanInitFn, ReadRawFileFn, RecordAllocationFn, RedrawFn, RegisterHostFn, c_string,
};
use crate::raw::{RawResult, value_from_raw};
use crate::registry::{EntryPoint, ModuleHandle, ModuleRegistry, Registration};

fn resolve_primary<F: Copy>(symbol: &CStr) -> Result<EntryPoint<F>> {
    // SAFETY: each call site names the signature declared in `ffi`.
    ModuleRegistry::with_global(|registry| unsafe { registry.resolve::<F>(symbol) })
}

/// Load the engine module and run its main entry point on `command_line`.
///
/// Returns the engine's return code. Any previously loaded module is closed
/// first.
pub fn initialise(config: &BridgeConfig, host: Rc<dyn Host>, command_line: &str) -> Result<i32> {
    let path = config.module_path();
    let handle = ModuleRegistry::with_global(|registry| registry.load(&path))?;

    let initialise_globals = resolve_primary::<InitialiseGlobalsFn>(ffi::INITIALISE_GLOBALS)?;
    // SAFETY: matches the exported signature.
    unsafe { (initialise_globals.get())() };

    let register_host = resolve_primary::<RegisterHostFn>(ffi::REGISTER_HOST)?;
    let record_allocation = if handle.has_symbol(ffi::RECORD_ALLOCATION) {
        // SAFETY: matches the exported signature.
        Some(unsafe { handle.resolve::<RecordAllocationFn>(ffi::RECORD_ALLOCATION) }?.get())
    } else {
        log::debug!("{} does not track host allocations", path.display());
        None
    };

    let context = Rc::new(CallbackContext::new(host, record_allocation));
    let table = Box::new(context.callback_table());
    // SAFETY: the table and its context stay registered until the module is unloaded.
    let accepted = unsafe { (register_host.get())(&*table) };
    ModuleRegistry::with_global(|registry| registry.register(Registration { context, table }));
    if accepted == 0 {
        log::warn!("{} rejected the host callback table", path.display());
    }

    let main = resolve_primary::<MatlabPanInitFn>(ffi::MATLAB_PAN_INIT)?;
    let mut argv = CStringArgv::for_engine(&tokenize(command_line))?;
    log::info!("starting engine with {} arguments", argv.argc());
    // SAFETY: `argv` is NULL-terminated and outlives the call.
    let code = unsafe { (main.get())(argv.argc(), argv.as_mut_ptr()) };
    Ok(code)
}

/// Close the loaded module and release its callback context.
pub fn shutdown() {
    ModuleRegistry::with_global(ModuleRegistry::unload);
}

/// A handle on the resident engine module.
pub struct Engine {
    handle: ModuleHandle,
}

impl Engine {
    /// Attach to the module loaded by [`initialise`].
    pub fn attach(config: &BridgeConfig) -> Result<Self> {
        let path = config.module_path();
        let handle = ModuleRegistry::with_global(|registry| registry.attach(&path))?;
        Ok(Self { handle })
    }

    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Run one simulator command; returns the engine code (nonzero is an error).
    pub fn execute_command(&self, command: &str) -> Result<i32> {
        // SAFETY: matches the exported signature.
        let entry = unsafe { self.handle.resolve::<ExecuteCommandFn>(ffi::EXECUTE_COMMAND) }?;
        let command = c_string(command)?;
        // SAFETY: the engine reads the command; it does not keep the pointer.
        let code = unsafe { (entry.get())(command.as_ptr() as *mut c_char) };
        Ok(code)
    }

    /// Fetch a waveform, control variable or parameter by name.
    pub fn get_value(&self, name: &str) -> Result<EngineValue> {
        // SAFETY: matches the exported signature.
        let entry = unsafe { self.handle.resolve::<GetValueFn>(ffi::GET_VALUE) }?;
        let c_name = c_string(name)?;
        let mut raw = RawResult::default();
        // SAFETY: every out slot is valid; the engine fills them or leaves them NULL.
        let found = unsafe {
            (entry.get())(
                c_name.as_ptr() as *mut c_char,
                &mut raw.real,
                &mut raw.imag,
                &mut raw.strings,
                &mut raw.rows,
                &mut raw.cols,
            )
        };
        if found == 0 {
            return Err(EngineError::ValueNotFound(name.to_string()));
        }
        // SAFETY: the engine reported success, so the slots follow its layout.
        unsafe { value_from_raw(&raw) }?.ok_or_else(|| EngineError::ValueNotFound(name.to_string()))
    }

    /// Turn host redraws on or off during long analyses.
    pub fn set_redraw(&self, on: bool) -> Result<()> {
        // SAFETY: matches the exported signature.
        let entry = unsafe { self.handle.resolve::<RedrawFn>(ffi::REDRAW) }?;
        // SAFETY: plain flag.
        unsafe { (entry.get())(c_char::from(on)) };
        Ok(())
    }

    /// Delete a memory waveform.
    pub fn delete_waveform(&self, name: &str) -> Result<()> {
        // SAFETY: matches the exported signature.
        let entry = unsafe { self.handle.resolve::<DeleteWaveformFn>(ffi::DELETE_WAVEFORM) }?;
        let c_name = c_string(name)?;
        // SAFETY: the engine reads the name only.
        let deleted = unsafe { (entry.get())(c_name.as_ptr() as *mut c_char) };
        if deleted == 0 {
            return Err(EngineError::WaveformNotDeleted(name.to_string()));
        }
        Ok(())
    }

    /// Read one real variable of a raw file.
    pub fn read_raw(&self, path: &Path, variable: &str) -> Result<Vec<f64>> {
        // SAFETY: matches the exported signature.
        let entry = unsafe { self.handle.resolve::<ReadRawFileFn>(ffi::READ_RAW_FILE) }?;
        let c_path = c_string(&path.to_string_lossy())?;
        let c_variable = c_string(variable)?;

        let mut size: c_ulong = 0;
        let mut real: *mut f64 = ptr::null_mut();
        let mut imag: *mut f64 = ptr::null_mut();
        // SAFETY: every out slot is valid.
        let ok = unsafe {
            (entry.get())(
                c_path.as_ptr() as *mut c_char,
                c_variable.as_ptr() as *mut c_char,
                &mut size,
                &mut real,
                &mut imag,
            )
        };
        if ok == 0 || real.is_null() {
            return Err(EngineError::RawRead {
                path: path.to_path_buf(),
                variable: variable.to_string(),
            });
        }
        // SAFETY: the engine hands over `size` doubles allocated with malloc.
        let values = unsafe {
            let values = std::slice::from_raw_parts(real, size as usize).to_vec();
            libc::free(real as *mut libc::c_void);
            values
        };
        Ok(values)
    }
}
