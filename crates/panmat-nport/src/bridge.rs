//! Setup and evaluation of N-port devices through host control functions.
//!
//! A control function called with no arguments returns a struct of real
//! parameters (setup). Called with the parameter struct, the port count, port
//! voltages and currents, state information and time, it returns
//! `[f, C, R]`: the port equations and their derivatives with respect to port
//! voltages and currents (evaluate).

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use panmat_core::{
    EngineMatrix, Host, HostArray, HostValue, NumericClass, Orientation, Scope, StructValue,
};

use crate::error::{NportError, OutputPosition, Result};
use crate::params::ParameterSet;

/// Inputs of a setup call.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    /// Host control function.
    pub function: String,
    /// Model name the parameters are exported under.
    pub model: String,
    /// Share one parameter set per model and publish it to the caller scope.
    pub export: bool,
}

/// Inputs of an evaluate call.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub function: String,
    pub port_count: usize,
    pub voltages: Vec<f64>,
    pub currents: Vec<f64>,
    pub time: f64,
    pub state_count: usize,
}

/// Outputs of an evaluate call.
#[derive(Debug, Clone, PartialEq)]
pub struct NportResponse {
    /// `f(v, i)`, one value per port.
    pub rhs: Vec<f64>,
    /// `df/dv`, row oriented.
    pub c: EngineMatrix<f64>,
    /// `df/di`, row oriented.
    pub r: EngineMatrix<f64>,
}

/// State shared by all N-ports of a loaded module.
///
/// Borrows are never held across host calls, so a control function may
/// re-enter the engine and reach the bridge again.
#[derive(Debug, Default)]
pub struct NportBridge {
    keywords: RefCell<HashMap<String, Arc<[String]>>>,
    exported: RefCell<HashMap<String, Arc<ParameterSet>>>,
}

impl NportBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyword order fixed for `function`, if it has been set up before.
    pub fn keywords(&self, function: &str) -> Option<Arc<[String]>> {
        self.keywords.borrow().get(function).cloned()
    }

    /// Exported parameter set of `model`.
    pub fn exported(&self, model: &str) -> Option<Arc<ParameterSet>> {
        self.exported.borrow().get(model).cloned()
    }

    /// Drop all cached keywords and exported sets.
    pub fn clear(&self) {
        self.keywords.borrow_mut().clear();
        self.exported.borrow_mut().clear();
    }

    /// Discover the parameters of one N-port instance.
    pub fn set_up(&self, host: &dyn Host, request: &SetupRequest) -> Result<Arc<ParameterSet>> {
        if request.export {
            if let Some(set) = self.exported(&request.model) {
                log::debug!("reusing exported parameters of model {}", request.model);
                return Ok(set);
            }
        }

        let outputs = host.call_function(&request.function, Vec::new(), 1)?;
        let found = outputs.len();
        let Some(first) = outputs.into_iter().next() else {
            return Err(NportError::MissingOutputs {
                function: request.function.clone(),
                expected: 1,
                found,
            });
        };
        let HostValue::Struct(fields) = first else {
            return Err(NportError::NotAStruct {
                function: request.function.clone(),
            });
        };

        let keywords = self.keywords(&request.function).unwrap_or_else(|| {
            let discovered: Arc<[String]> = fields.field_names().map(str::to_string).collect();
            log::debug!(
                "control function {} declares parameters {:?}",
                request.function,
                discovered
            );
            self.keywords
                .borrow_mut()
                .insert(request.function.clone(), Arc::clone(&discovered));
            discovered
        });

        let values = read_parameters(&fields, &keywords, &request.function)?;
        let set = Arc::new(ParameterSet::new(keywords, values)?);

        if request.export {
            if let Err(e) = host.put_variable(Scope::Caller, &request.model, HostValue::Struct(fields)) {
                let message = format!(
                    "Unable to export the parameter 'struct' of the <{}> control function: {}",
                    request.function, e
                );
                log::warn!("{}", message);
                host.print(&format!("{}\n", message));
            }
            self.exported
                .borrow_mut()
                .insert(request.model.clone(), Arc::clone(&set));
        }
        Ok(set)
    }
}

fn read_parameters(fields: &StructValue, keywords: &[String], function: &str) -> Result<Vec<f64>> {
    keywords
        .iter()
        .map(|name| {
            fields
                .get(name)
                .and_then(HostValue::as_array)
                .and_then(HostArray::scalar_value)
                .ok_or_else(|| NportError::InvalidParameterField {
                    field: name.clone(),
                    function: function.to_string(),
                })
        })
        .collect()
}

/// Evaluate an N-port through its control function.
///
/// All three outputs are checked before any of them is used.
pub fn evaluate(
    host: &dyn Host,
    params: &ParameterSet,
    request: &EvalRequest,
) -> Result<NportResponse> {
    let n = request.port_count;
    if request.voltages.len() != n || request.currents.len() != n {
        return Err(NportError::InvalidRequest(format!(
            "{} ports but {} voltages and {} currents",
            n,
            request.voltages.len(),
            request.currents.len()
        )));
    }

    let args = vec![
        HostValue::Struct(params.to_struct()),
        HostValue::from(n as f64),
        HostArray::column(request.voltages.clone()).into(),
        HostArray::column(request.currents.clone()).into(),
        HostValue::from(request.state_count as f64),
        HostArray::zeros(request.state_count, 1).into(),
        HostArray::zeros(request.state_count, 1).into(),
        HostValue::from(request.time),
    ];
    let outputs = host.call_function(&request.function, args, 3)?;
    if outputs.len() < 3 {
        return Err(NportError::MissingOutputs {
            function: request.function.clone(),
            expected: 3,
            found: outputs.len(),
        });
    }

    let rhs = checked_output(&outputs[0], OutputPosition::First, n, &request.function)?;
    let c = checked_output(&outputs[1], OutputPosition::Second, n * n, &request.function)?;
    let r = checked_output(&outputs[2], OutputPosition::Third, n * n, &request.function)?;

    // [row][col] = flat[col * n + row]
    Ok(NportResponse {
        rhs: rhs[..n].to_vec(),
        c: EngineMatrix::from_column_major(n, n, &c[..n * n], Orientation::Rows)?,
        r: EngineMatrix::from_column_major(n, n, &r[..n * n], Orientation::Rows)?,
    })
}

fn checked_output<'a>(
    value: &'a HostValue,
    position: OutputPosition,
    expected: usize,
    function: &str,
) -> Result<&'a [f64]> {
    let array = value
        .as_array()
        .filter(|a| a.class() == NumericClass::Double && !a.is_complex())
        .ok_or_else(|| NportError::InvalidReturnType {
            position,
            function: function.to_string(),
        })?;
    if array.numel() < expected {
        return Err(NportError::InvalidReturnShape {
            position,
            function: function.to_string(),
            expected,
            found: array.numel(),
        });
    }
    Ok(array.real_part())
}
