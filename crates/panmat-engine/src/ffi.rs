//! Engine entry points and the host callback table.

use std::ffi::{CStr, CString, c_char, c_int, c_uint, c_ulong, c_void};
use std::ptr;

use panmat_core::CommandArgv;

use crate::error::{EngineError, Result};

pub const INITIALISE_GLOBALS: &CStr = c"InitialiseGlobals";
pub const MATLAB_PAN_INIT: &CStr = c"MatlabPanInit";
pub const EXECUTE_COMMAND: &CStr = c"PanMatlabExecuteCommand";
pub const GET_VALUE: &CStr = c"PanMatlabGet";
pub const REDRAW: &CStr = c"PanMatlabRedraw";
pub const DELETE_WAVEFORM: &CStr = c"MemWaveformDeleteByName";
pub const READ_RAW_FILE: &CStr = c"PanMatReadRawFile";
pub const REGISTER_HOST: &CStr = c"PanMatlabRegisterHost";
pub const RECORD_ALLOCATION: &CStr = c"RecordAllocation";

pub type InitialiseGlobalsFn = unsafe extern "C" fn();
pub type MatlabPanInitFn = unsafe extern "C" fn(argc: c_int, argv: *mut *mut c_char) -> c_int;
/// Nonzero means the command failed.
pub type ExecuteCommandFn = unsafe extern "C" fn(command: *mut c_char) -> c_int;
/// Nonzero means the variable was found.
pub type GetValueFn = unsafe extern "C" fn(
    name: *mut c_char,
    real: *mut *mut f64,
    imag: *mut *mut f64,
    strings: *mut *mut c_char,
    rows: *mut c_int,
    cols: *mut c_int,
) -> c_int;
pub type RedrawFn = unsafe extern "C" fn(flag: c_char);
pub type DeleteWaveformFn = unsafe extern "C" fn(name: *mut c_char) -> c_char;
pub type ReadRawFileFn = unsafe extern "C" fn(
    path: *mut c_char,
    variable: *mut c_char,
    size: *mut c_ulong,
    real: *mut *mut f64,
    imag: *mut *mut f64,
) -> c_int;
pub type RegisterHostFn = unsafe extern "C" fn(callbacks: *const HostCallbacks) -> c_int;
/// Hands a `malloc`ed block to the engine allocation list `memory`.
pub type RecordAllocationFn = unsafe extern "C" fn(memory: *mut c_void, block: *mut c_void);

/// `RawArray::type_code` of a real scalar stored in `RawArray::scalar`.
pub const RAW_SCALAR: c_uint = 1;
/// Real vector or matrix in `RawArray::real`.
pub const RAW_REAL: c_uint = 2;
/// Complex matrix in `RawArray::real` and `RawArray::imag`.
pub const RAW_COMPLEX: c_uint = 3;

/// A host array lowered into engine memory.
///
/// Vectors are flat `double*` buffers (`ndims == 1`); matrices are line
/// pointer tables (`double**`, `ndims == 2`).
#[repr(C)]
#[derive(Debug)]
pub struct RawArray {
    pub type_code: c_uint,
    pub ndims: c_uint,
    pub dims: [c_ulong; 2],
    pub elements: c_uint,
    pub scalar: f64,
    pub real: *mut c_void,
    pub imag: *mut c_void,
}

impl Default for RawArray {
    fn default() -> Self {
        Self {
            type_code: 0,
            ndims: 0,
            dims: [0; 2],
            elements: 0,
            scalar: 0.0,
            real: ptr::null_mut(),
            imag: ptr::null_mut(),
        }
    }
}

/// In/out block of an N-port setup callback.
#[repr(C)]
#[derive(Debug)]
pub struct RawNportSetup {
    pub function: *const c_char,
    pub model: *const c_char,
    pub export: c_int,
    /// Out: parameter set handle, released with `nport_release`.
    pub params: *const c_void,
    /// Out: parameter values, valid while the handle lives.
    pub values: *const f64,
    pub param_count: c_int,
}

/// In/out block of an N-port evaluate callback.
#[repr(C)]
#[derive(Debug)]
pub struct RawNportEval {
    pub function: *const c_char,
    pub params: *const c_void,
    pub port_count: c_int,
    pub voltages: *const f64,
    pub currents: *const f64,
    /// Out: `port_count` values.
    pub rhs: *mut f64,
    /// Out: row tables `[row][col]`, `port_count` squared.
    pub c: *mut *mut f64,
    pub r: *mut *mut f64,
    pub time: f64,
    pub state_count: c_int,
}

/// Host services offered to the engine. Every callback returns nonzero on success.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostCallbacks {
    pub context: *mut c_void,
    pub get_array: Option<
        unsafe extern "C" fn(
            context: *mut c_void,
            name: *const c_char,
            memory: *mut c_void,
            out: *mut RawArray,
        ) -> c_int,
    >,
    pub print: Option<unsafe extern "C" fn(context: *mut c_void, text: *const c_char) -> c_int>,
    pub flush_output: Option<unsafe extern "C" fn(context: *mut c_void, redraw: c_char)>,
    pub nport_setup:
        Option<unsafe extern "C" fn(context: *mut c_void, setup: *mut RawNportSetup) -> c_int>,
    pub nport_evaluate:
        Option<unsafe extern "C" fn(context: *mut c_void, eval: *mut RawNportEval) -> c_int>,
    pub nport_release: Option<unsafe extern "C" fn(context: *mut c_void, params: *const c_void)>,
}

/// Owned `CString` with the error mapped to [`EngineError::InvalidString`].
pub fn c_string(text: &str) -> Result<CString> {
    CString::new(text).map_err(|_| EngineError::InvalidString(text.to_string()))
}

/// A C `argv`: owned strings plus a NULL-terminated pointer array.
#[derive(Debug)]
pub struct CStringArgv {
    _strings: Vec<CString>,
    pointers: Vec<*mut c_char>,
}

impl CStringArgv {
    pub fn new<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let strings = args
            .into_iter()
            .map(|a| c_string(a.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let pointers = strings
            .iter()
            .map(|s| s.as_ptr() as *mut c_char)
            .chain(std::iter::once(ptr::null_mut()))
            .collect();
        Ok(Self {
            _strings: strings,
            pointers,
        })
    }

    /// Argument vector for the engine main of a tokenized command line.
    pub fn for_engine(argv: &CommandArgv) -> Result<Self> {
        Self::new(argv.engine_argv())
    }

    pub fn argc(&self) -> c_int {
        (self.pointers.len() - 1) as c_int
    }

    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.pointers.as_mut_ptr()
    }
}
