//! Integration tests driving the bridge against an in-process fake engine.
//!
//! The fake module's symbols are Rust `extern "C"` functions; their state is
//! thread-local, like the registry, so tests can run in parallel.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_int, c_ulong, c_void};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::rc::Rc;
use std::sync::Arc;

use panmat_core::{EngineValue, Host, HostValue, Scope, Workspace};
use panmat_engine::ffi::{HostCallbacks, RawArray};
use panmat_engine::{
    BridgeConfig, Engine, EngineError, ModuleBackend, ModuleImage, ModuleRegistry, OpenMode,
    initialise, shutdown,
};

thread_local! {
    static INITIALISED: Cell<bool> = const { Cell::new(false) };
    static CALLBACKS: Cell<Option<HostCallbacks>> = const { Cell::new(None) };
    static ARGS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static REDRAW: Cell<i8> = const { Cell::new(-1) };
    static FETCHED: Cell<f64> = const { Cell::new(f64::NAN) };
}

static WAVE: [f64; 3] = [0.0, 0.9, 1.8];

fn callbacks() -> HostCallbacks {
    CALLBACKS.with(Cell::get).expect("host callbacks registered")
}

unsafe fn text(ptr: *const c_char) -> String {
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

unsafe extern "C" fn initialise_globals() {
    INITIALISED.with(|i| i.set(true));
}

unsafe extern "C" fn register_host(table: *const HostCallbacks) -> c_int {
    CALLBACKS.with(|c| c.set(Some(unsafe { *table })));
    1
}

unsafe extern "C" fn pan_init(argc: c_int, argv: *mut *mut c_char) -> c_int {
    let args: Vec<String> = (0..argc as usize)
        .map(|i| unsafe { text(*argv.add(i)) })
        .collect();
    let table = callbacks();
    let banner = c"netlist loaded\n";
    unsafe { (table.print.unwrap())(table.context, banner.as_ptr()) };
    ARGS.with(|a| *a.borrow_mut() = args);
    0
}

unsafe extern "C" fn execute(command: *mut c_char) -> c_int {
    match unsafe { text(command) }.as_str() {
        "fail" => 3,
        "fetch tstop" => {
            let table = callbacks();
            let mut out = RawArray::default();
            let ok = unsafe {
                (table.get_array.unwrap())(table.context, c"tstop".as_ptr(), ptr::null_mut(), &mut out)
            };
            FETCHED.with(|f| f.set(if ok != 0 { out.scalar } else { f64::NAN }));
            0
        }
        _ => 0,
    }
}

unsafe extern "C" fn get_value(
    name: *mut c_char,
    real: *mut *mut f64,
    _imag: *mut *mut f64,
    _strings: *mut *mut c_char,
    rows: *mut c_int,
    cols: *mut c_int,
) -> c_int {
    if unsafe { text(name) } != "v(out)" {
        return 0;
    }
    unsafe {
        *real = WAVE.as_ptr() as *mut f64;
        *rows = WAVE.len() as c_int;
        *cols = 1;
    }
    1
}

unsafe extern "C" fn redraw(flag: c_char) {
    REDRAW.with(|r| r.set(flag as i8));
}

unsafe extern "C" fn delete_waveform(name: *mut c_char) -> c_char {
    c_char::from(unsafe { text(name) } == "w1")
}

unsafe extern "C" fn read_raw(
    _path: *mut c_char,
    variable: *mut c_char,
    size: *mut c_ulong,
    real: *mut *mut f64,
    imag: *mut *mut f64,
) -> c_int {
    if unsafe { text(variable) } != "time" {
        return 0;
    }
    unsafe {
        let data = libc::malloc(2 * size_of::<f64>()) as *mut f64;
        *data = 0.0;
        *data.add(1) = 1e-9;
        *real = data;
        *imag = ptr::null_mut();
        *size = 2;
    }
    1
}

struct FakeImage {
    symbols: HashMap<&'static str, usize>,
}

impl ModuleImage for FakeImage {
    fn address(&self, symbol: &CStr) -> Option<NonNull<c_void>> {
        let address = *self.symbols.get(symbol.to_str().ok()?)?;
        NonNull::new(address as *mut c_void)
    }
}

/// Serves the fake module at any path, omitting `missing` symbols.
struct FakeBackend {
    missing: &'static [&'static str],
}

impl ModuleBackend for FakeBackend {
    fn open(&self, _path: &Path, _mode: OpenMode) -> Result<Arc<dyn ModuleImage>, String> {
        let mut symbols = HashMap::from([
            ("InitialiseGlobals", initialise_globals as usize),
            ("PanMatlabRegisterHost", register_host as usize),
            ("MatlabPanInit", pan_init as usize),
            ("PanMatlabExecuteCommand", execute as usize),
            ("PanMatlabGet", get_value as usize),
            ("PanMatlabRedraw", redraw as usize),
            ("MemWaveformDeleteByName", delete_waveform as usize),
            ("PanMatReadRawFile", read_raw as usize),
        ]);
        for name in self.missing {
            symbols.remove(name);
        }
        Ok(Arc::new(FakeImage { symbols }))
    }
}

fn install(missing: &'static [&'static str]) -> Rc<Workspace> {
    ModuleRegistry::replace_global(ModuleRegistry::new(Rc::new(FakeBackend { missing })));
    Rc::new(Workspace::new())
}

#[test]
fn test_initialise_runs_engine_main() {
    let ws = install(&[]);
    let code = initialise(&BridgeConfig::default(), ws.clone(), "  deck.pan  -o out ").unwrap();

    assert_eq!(code, 0);
    assert!(INITIALISED.with(Cell::get));
    assert_eq!(ARGS.with(|a| a.borrow().clone()), vec!["", "deck.pan", "-o", "out"]);
    assert_eq!(ws.output(), "netlist loaded\n");
}

#[test]
fn test_attached_engine_calls() {
    let ws = install(&[]);
    let config = BridgeConfig::default();
    initialise(&config, ws.clone(), "deck.pan").unwrap();

    let engine = Engine::attach(&config).unwrap();
    assert_eq!(engine.execute_command("tran 1n 10n").unwrap(), 0);
    assert_eq!(engine.execute_command("fail").unwrap(), 3);

    assert_eq!(
        engine.get_value("v(out)").unwrap(),
        EngineValue::RealVector(WAVE.to_vec())
    );
    assert!(matches!(
        engine.get_value("v(nope)"),
        Err(EngineError::ValueNotFound(_))
    ));

    engine.set_redraw(true).unwrap();
    assert_eq!(REDRAW.with(Cell::get), 1);

    engine.delete_waveform("w1").unwrap();
    let err = engine.delete_waveform("w2").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error: the <w2> memwaveform was not found and thus it is not deleted."
    );

    assert_eq!(engine.read_raw(Path::new("run.raw"), "time").unwrap(), vec![0.0, 1e-9]);
    assert!(engine.read_raw(Path::new("run.raw"), "v(9)").is_err());
}

#[test]
fn test_engine_reads_host_variables_through_callbacks() {
    let ws = install(&[]);
    let config = BridgeConfig::default();
    initialise(&config, ws.clone(), "deck.pan").unwrap();

    ws.put_variable(Scope::Caller, "tstop", HostValue::from(2e-6)).unwrap();
    Engine::attach(&config)
        .unwrap()
        .execute_command("fetch tstop")
        .unwrap();
    assert_eq!(FETCHED.with(Cell::get), 2e-6);
}

#[test]
fn test_missing_entry_point_closes_module() {
    let ws = install(&["MatlabPanInit"]);
    let config = BridgeConfig::default();

    let err = initialise(&config, ws, "deck.pan").unwrap_err();
    assert_eq!(
        err.to_string(),
        "The <MatlabPanInit> evaluate routine is not found in <panMat.so> shared module."
    );
    assert!(matches!(
        Engine::attach(&config),
        Err(EngineError::NotLoaded { .. })
    ));
}

#[test]
fn test_attach_without_load_fails() {
    install(&[]);
    shutdown();
    let err = Engine::attach(&BridgeConfig::default()).err().unwrap();
    assert!(err.to_string().contains("Run \"pannet('filename')\" command"));
}
