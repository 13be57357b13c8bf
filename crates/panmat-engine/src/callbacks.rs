//! Host callbacks handed to the engine.
//!
//! Each trampoline takes its own strong reference to the context, so a
//! callback that reloads the module (and drops the registry's reference) keeps
//! running on a live context. Panics and errors never cross into the engine:
//! they are logged, printed on the host console and reported as 0.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::slice;
use std::sync::Arc;

use panmat_core::{AllocationLog, Error, Host, Scope, to_engine};
use panmat_nport::{EvalRequest, NportBridge, NportError, ParameterSet, SetupRequest, evaluate};

use crate::error::{EngineError, Result};
use crate::ffi::{HostCallbacks, RawArray, RawNportEval, RawNportSetup, RecordAllocationFn};
use crate::raw::{AllocationTracker, lower};

/// State reachable from the engine through the callback table.
pub struct CallbackContext {
    host: Rc<dyn Host>,
    bridge: NportBridge,
    record_allocation: Option<RecordAllocationFn>,
}

impl CallbackContext {
    pub fn new(host: Rc<dyn Host>, record_allocation: Option<RecordAllocationFn>) -> Self {
        Self {
            host,
            bridge: NportBridge::new(),
            record_allocation,
        }
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    pub fn bridge(&self) -> &NportBridge {
        &self.bridge
    }

    /// Callback table pointing at this context.
    ///
    /// The table is only valid while `self` is alive.
    pub fn callback_table(self: &Rc<Self>) -> HostCallbacks {
        HostCallbacks {
            context: Rc::as_ptr(self) as *mut c_void,
            get_array: Some(get_array),
            print: Some(print),
            flush_output: Some(flush_output),
            nport_setup: Some(nport_setup),
            nport_evaluate: Some(nport_evaluate),
            nport_release: Some(nport_release),
        }
    }

    /// Copy a caller-scope host variable into engine memory.
    pub fn get_array(&self, name: &str, memory: *mut c_void) -> Result<RawArray> {
        let value = self
            .host
            .get_variable(Scope::Caller, name)
            .ok_or_else(|| Error::VariableNotFound {
                name: name.to_string(),
                scope: Scope::Caller.to_string(),
            })?;

        let engine = to_engine(value, None)?;
        let tracker = match (self.record_allocation, memory.is_null()) {
            (Some(record), false) => Some(AllocationTracker { record, memory }),
            _ => None,
        };
        let mut log = AllocationLog::new();
        let raw = lower(&engine, tracker, Some(&mut log))?;
        log::debug!(
            "{} marshaled as {} in {} blocks",
            name,
            engine.type_name(),
            log.allocations.len()
        );
        Ok(raw)
    }

    fn set_up(&self, raw: &mut RawNportSetup) -> Result<()> {
        // SAFETY: the engine passes NUL-terminated names.
        let request = unsafe {
            SetupRequest {
                function: c_str(raw.function)?,
                model: c_str(raw.model)?,
                export: raw.export != 0,
            }
        };
        let set = self.bridge.set_up(self.host(), &request)?;
        raw.values = set.values().as_ptr();
        raw.param_count = set.len() as c_int;
        raw.params = Arc::into_raw(set) as *const c_void;
        Ok(())
    }

    fn evaluate(&self, raw: &mut RawNportEval) -> Result<()> {
        if raw.params.is_null() {
            return Err(NportError::InvalidRequest("no parameter set".to_string()).into());
        }
        let n = usize::try_from(raw.port_count)
            .map_err(|_| NportError::InvalidRequest(format!("{} ports", raw.port_count)))?;
        if n == 0 {
            log::debug!("nothing to evaluate for a device without ports");
            return Ok(());
        }
        // SAFETY: `c` and `r` are only read when non-null, as `n`-entry row tables.
        let rows_missing = |table: *mut *mut f64| {
            table.is_null() || (0..n).any(|row| unsafe { (*table.add(row)).is_null() })
        };
        if raw.rhs.is_null() || rows_missing(raw.c) || rows_missing(raw.r) {
            return Err(NportError::InvalidRequest(format!(
                "missing output storage for a {}-port device",
                n
            ))
            .into());
        }

        // SAFETY: the engine passes a handle from `set_up` and `n`-element port vectors.
        let (params, request) = unsafe {
            let params = &*(raw.params as *const ParameterSet);
            let request = EvalRequest {
                function: c_str(raw.function)?,
                port_count: n,
                voltages: port_vector(raw.voltages, n),
                currents: port_vector(raw.currents, n),
                time: raw.time,
                state_count: usize::try_from(raw.state_count).unwrap_or(0),
            };
            (params, request)
        };

        let response = evaluate(self.host(), params, &request)?;

        // SAFETY: `rhs` holds `n` values; `c` and `r` hold `n` rows of `n`.
        unsafe {
            slice::from_raw_parts_mut(raw.rhs, n).copy_from_slice(&response.rhs);
            for (row, line) in response.c.lines().iter().enumerate() {
                slice::from_raw_parts_mut(*raw.c.add(row), n).copy_from_slice(line);
            }
            for (row, line) in response.r.lines().iter().enumerate() {
                slice::from_raw_parts_mut(*raw.r.add(row), n).copy_from_slice(line);
            }
        }
        Ok(())
    }
}

unsafe fn c_str(text: *const c_char) -> Result<String> {
    if text.is_null() {
        return Err(EngineError::InvalidString("(null)".to_string()));
    }
    let s = unsafe { CStr::from_ptr(text) };
    s.to_str()
        .map(str::to_string)
        .map_err(|_| EngineError::InvalidString(s.to_string_lossy().into_owned()))
}

unsafe fn port_vector(data: *const f64, n: usize) -> Vec<f64> {
    if n == 0 || data.is_null() {
        return vec![0.0; n];
    }
    unsafe { slice::from_raw_parts(data, n) }.to_vec()
}

/// Run `f` on the context behind `context`, mapping the outcome to 1 or 0.
fn guarded<F>(what: &str, context: *mut c_void, f: F) -> c_int
where
    F: FnOnce(&CallbackContext) -> Result<()>,
{
    if context.is_null() {
        log::error!("{} callback invoked without a context", what);
        return 0;
    }
    // SAFETY: `context` came from `callback_table` and its owner is still
    // registered; the extra strong reference keeps it alive for this call.
    let context = unsafe {
        let ptr = context as *const CallbackContext;
        Rc::increment_strong_count(ptr);
        Rc::from_raw(ptr)
    };

    match panic::catch_unwind(AssertUnwindSafe(|| f(&context))) {
        Ok(Ok(())) => 1,
        Ok(Err(e)) => {
            log::error!("{} callback failed: {}", what, e);
            context.host().print(&format!("{}\n", e));
            0
        }
        Err(_) => {
            log::error!("{} callback panicked", what);
            0
        }
    }
}

unsafe extern "C" fn get_array(
    context: *mut c_void,
    name: *const c_char,
    memory: *mut c_void,
    out: *mut RawArray,
) -> c_int {
    guarded("get_array", context, |ctx| {
        // SAFETY: the engine passes a NUL-terminated name.
        let name = unsafe { c_str(name)? };
        let raw = ctx.get_array(&name, memory)?;
        if !out.is_null() {
            // SAFETY: `out` points to a writable RawArray.
            unsafe { out.write(raw) };
        }
        Ok(())
    })
}

unsafe extern "C" fn print(context: *mut c_void, text: *const c_char) -> c_int {
    guarded("print", context, |ctx| {
        if !text.is_null() {
            // SAFETY: the engine passes a NUL-terminated message.
            let text = unsafe { CStr::from_ptr(text) }.to_string_lossy();
            ctx.host().print(&text);
        }
        Ok(())
    })
}

unsafe extern "C" fn flush_output(context: *mut c_void, redraw: c_char) {
    guarded("flush_output", context, |ctx| {
        if redraw != 0 {
            ctx.host().eval_string("drawnow;")?;
        }
        // Console flush failures are not worth reporting to the engine.
        let _ = std::io::stdout().flush();
        Ok(())
    });
}

unsafe extern "C" fn nport_setup(context: *mut c_void, setup: *mut RawNportSetup) -> c_int {
    guarded("nport_setup", context, |ctx| {
        // SAFETY: the engine passes a writable setup block.
        let setup = unsafe { setup.as_mut() }
            .ok_or_else(|| NportError::InvalidRequest("no setup block".to_string()))?;
        ctx.set_up(setup)
    })
}

unsafe extern "C" fn nport_evaluate(context: *mut c_void, eval: *mut RawNportEval) -> c_int {
    guarded("nport_evaluate", context, |ctx| {
        // SAFETY: the engine passes a writable evaluate block.
        let eval = unsafe { eval.as_mut() }
            .ok_or_else(|| NportError::InvalidRequest("no evaluate block".to_string()))?;
        ctx.evaluate(eval)
    })
}

unsafe extern "C" fn nport_release(context: *mut c_void, params: *const c_void) {
    guarded("nport_release", context, |_| {
        if !params.is_null() {
            // SAFETY: `params` came from `Arc::into_raw` in `set_up`.
            drop(unsafe { Arc::from_raw(params as *const ParameterSet) });
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use panmat_core::{HostArray, HostValue, StructValue, Workspace};
    use std::ffi::CString;
    use std::ptr;

    fn context(ws: Rc<Workspace>) -> Rc<CallbackContext> {
        Rc::new(CallbackContext::new(ws, None))
    }

    #[test]
    fn test_get_array_reads_caller_scope() {
        let ws = Rc::new(Workspace::new().with_variable(Scope::Caller, "vdd", 1.8));
        let ctx = context(Rc::clone(&ws));
        let table = ctx.callback_table();

        let name = CString::new("vdd").unwrap();
        let mut out = RawArray::default();
        let ok = unsafe {
            (table.get_array.unwrap())(table.context, name.as_ptr(), ptr::null_mut(), &mut out)
        };
        assert_eq!(ok, 1);
        assert_eq!(out.scalar, 1.8);
    }

    #[test]
    fn test_failures_are_printed_and_return_zero() {
        let ws = Rc::new(Workspace::new());
        let ctx = context(Rc::clone(&ws));
        let table = ctx.callback_table();

        let name = CString::new("missing").unwrap();
        let mut out = RawArray::default();
        let ok = unsafe {
            (table.get_array.unwrap())(table.context, name.as_ptr(), ptr::null_mut(), &mut out)
        };
        assert_eq!(ok, 0);
        assert!(ws.output().contains("<missing>"));
        assert_eq!(Rc::strong_count(&ctx), 1);
    }

    #[test]
    fn test_print_and_flush() {
        let ws = Rc::new(Workspace::new());
        let ctx = context(Rc::clone(&ws));
        let table = ctx.callback_table();

        let text = CString::new("tran done\n").unwrap();
        unsafe {
            (table.print.unwrap())(table.context, text.as_ptr());
            (table.flush_output.unwrap())(table.context, 0);
            (table.flush_output.unwrap())(table.context, 1);
        }
        assert_eq!(ws.output(), "tran done\n");
        assert_eq!(ws.evaluated(), vec!["drawnow;".to_string()]);
    }

    #[test]
    fn test_nport_setup_evaluate_release() {
        let ws = Rc::new(Workspace::new());
        ws.register_function("res", |_, args, nargout| {
            if nargout == 1 {
                return Ok(vec![StructValue::new().with_field("g", 0.5).into()]);
            }
            let g = args[0]
                .as_struct()
                .and_then(|s| s.get("g"))
                .and_then(HostValue::as_array)
                .and_then(HostArray::scalar_value)
                .unwrap_or(0.0);
            let v = args[2].as_array().map(|a| a.real_part()[0]).unwrap_or(0.0);
            Ok(vec![
                HostArray::column(vec![g * v]).into(),
                HostArray::scalar(g).into(),
                HostArray::scalar(0.0).into(),
            ])
        });
        let ctx = context(Rc::clone(&ws));
        let table = ctx.callback_table();

        let function = CString::new("res").unwrap();
        let model = CString::new("rmod").unwrap();
        let mut setup = RawNportSetup {
            function: function.as_ptr(),
            model: model.as_ptr(),
            export: 1,
            params: ptr::null(),
            values: ptr::null(),
            param_count: 0,
        };
        assert_eq!(unsafe { (table.nport_setup.unwrap())(table.context, &mut setup) }, 1);
        assert_eq!(setup.param_count, 1);
        assert_eq!(unsafe { *setup.values }, 0.5);

        let voltages = [4.0];
        let currents = [0.0];
        let mut rhs = [0.0];
        let mut c_row = [0.0];
        let mut r_row = [0.0];
        let mut c_table = [c_row.as_mut_ptr()];
        let mut r_table = [r_row.as_mut_ptr()];
        let mut eval = RawNportEval {
            function: function.as_ptr(),
            params: setup.params,
            port_count: 1,
            voltages: voltages.as_ptr(),
            currents: currents.as_ptr(),
            rhs: rhs.as_mut_ptr(),
            c: c_table.as_mut_ptr(),
            r: r_table.as_mut_ptr(),
            time: 0.0,
            state_count: 0,
        };
        assert_eq!(unsafe { (table.nport_evaluate.unwrap())(table.context, &mut eval) }, 1);
        assert_eq!(rhs, [2.0]);
        assert_eq!(c_row, [0.5]);

        // one reference in the bridge, one handed to the engine
        let exported = ctx.bridge().exported("rmod").unwrap();
        assert_eq!(Arc::strong_count(&exported), 3);
        unsafe { (table.nport_release.unwrap())(table.context, setup.params) };
        assert_eq!(Arc::strong_count(&exported), 2);
    }

    #[test]
    fn test_nport_evaluate_without_output_storage() {
        let ws = Rc::new(Workspace::new());
        ws.register_function("open_ctl", |_, _, _| {
            Ok(vec![StructValue::new().with_field("g", 1.0).into()])
        });
        let ctx = context(Rc::clone(&ws));
        let table = ctx.callback_table();

        let function = CString::new("open_ctl").unwrap();
        let model = CString::new("omod").unwrap();
        let mut setup = RawNportSetup {
            function: function.as_ptr(),
            model: model.as_ptr(),
            export: 0,
            params: ptr::null(),
            values: ptr::null(),
            param_count: 0,
        };
        assert_eq!(unsafe { (table.nport_setup.unwrap())(table.context, &mut setup) }, 1);

        // no ports: nothing to compute and nothing to write
        let mut eval = RawNportEval {
            function: function.as_ptr(),
            params: setup.params,
            port_count: 0,
            voltages: ptr::null(),
            currents: ptr::null(),
            rhs: ptr::null_mut(),
            c: ptr::null_mut(),
            r: ptr::null_mut(),
            time: 0.0,
            state_count: 0,
        };
        assert_eq!(unsafe { (table.nport_evaluate.unwrap())(table.context, &mut eval) }, 1);
        assert_eq!(ws.call_count("open_ctl"), 1);

        eval.port_count = 1;
        assert_eq!(unsafe { (table.nport_evaluate.unwrap())(table.context, &mut eval) }, 0);
        assert!(ws.output().contains("missing output storage for a 1-port device"));
        assert_eq!(ws.call_count("open_ctl"), 1);

        unsafe { (table.nport_release.unwrap())(table.context, setup.params) };
    }
}
