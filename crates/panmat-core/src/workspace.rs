//! In-memory host used by the CLI and by tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::host::{Host, Scope};
use crate::value::HostValue;

/// Signature of a function registered with a [`Workspace`].
///
/// Receives the workspace, the input arguments and the requested output count.
pub type HostFunction = dyn Fn(&Workspace, &[HostValue], usize) -> Result<Vec<HostValue>>;

/// A self-contained host: scoped variables, named functions, captured output.
#[derive(Default)]
pub struct Workspace {
    variables: RefCell<HashMap<(Scope, String), HostValue>>,
    functions: RefCell<HashMap<String, Rc<HostFunction>>>,
    calls: RefCell<HashMap<String, usize>>,
    evaluated: RefCell<Vec<String>>,
    output: RefCell<String>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a callable host function.
    pub fn register_function<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&Workspace, &[HostValue], usize) -> Result<Vec<HostValue>> + 'static,
    {
        self.functions
            .borrow_mut()
            .insert(name.into(), Rc::new(function));
    }

    /// Set a variable, builder style.
    pub fn with_variable(self, scope: Scope, name: &str, value: impl Into<HostValue>) -> Self {
        self.variables
            .borrow_mut()
            .insert((scope, name.to_string()), value.into());
        self
    }

    pub fn remove_variable(&self, scope: Scope, name: &str) -> Option<HostValue> {
        self.variables
            .borrow_mut()
            .remove(&(scope, name.to_string()))
    }

    /// How many times `name` has been called.
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.borrow().get(name).copied().unwrap_or(0)
    }

    /// Code strings passed to `eval_string`, in order.
    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.borrow().clone()
    }

    /// Everything printed so far.
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    /// Drain the captured output.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.output.borrow_mut())
    }
}

impl Host for Workspace {
    fn get_variable(&self, scope: Scope, name: &str) -> Option<HostValue> {
        self.variables
            .borrow()
            .get(&(scope, name.to_string()))
            .cloned()
    }

    fn put_variable(&self, scope: Scope, name: &str, value: HostValue) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "variable name must not be empty".to_string(),
            ));
        }
        self.variables
            .borrow_mut()
            .insert((scope, name.to_string()), value);
        Ok(())
    }

    fn call_function(
        &self,
        name: &str,
        args: Vec<HostValue>,
        nargout: usize,
    ) -> Result<Vec<HostValue>> {
        // Clone the handle so no borrow is held while user code runs.
        let function = self
            .functions
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::HostCall {
                function: name.to_string(),
                message: "undefined function".to_string(),
            })?;
        *self.calls.borrow_mut().entry(name.to_string()).or_insert(0) += 1;

        let mut outputs = function(self, &args, nargout)?;
        if outputs.len() < nargout {
            return Err(Error::HostCall {
                function: name.to_string(),
                message: format!(
                    "{} outputs requested but only {} returned",
                    nargout,
                    outputs.len()
                ),
            });
        }
        if nargout > 0 {
            outputs.truncate(nargout);
        }
        Ok(outputs)
    }

    fn eval_string(&self, code: &str) -> Result<()> {
        self.evaluated.borrow_mut().push(code.to_string());
        Ok(())
    }

    fn print(&self, text: &str) {
        self.output.borrow_mut().push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::HostArray;

    #[test]
    fn test_variables_are_scoped() {
        let ws = Workspace::new().with_variable(Scope::Global, "x", 1.0);
        assert!(ws.get_variable(Scope::Global, "x").is_some());
        assert!(ws.get_variable(Scope::Caller, "x").is_none());
    }

    #[test]
    fn test_call_function_counts_and_checks_outputs() {
        let ws = Workspace::new();
        ws.register_function("two", |_, _, _| {
            Ok(vec![HostValue::from(1.0), HostValue::from(2.0)])
        });

        let out = ws.call_function("two", vec![], 1).unwrap();
        assert_eq!(out.len(), 1);
        assert!(ws.call_function("two", vec![], 3).is_err());
        assert_eq!(ws.call_count("two"), 2);
        assert!(matches!(
            ws.call_function("missing", vec![], 0),
            Err(Error::HostCall { .. })
        ));
    }

    #[test]
    fn test_function_can_touch_workspace() {
        let ws = Workspace::new();
        ws.register_function("store", |ws, args, _| {
            ws.put_variable(Scope::Base, "last", args[0].clone())?;
            Ok(vec![])
        });
        ws.call_function("store", vec![HostArray::row(vec![1.0, 2.0]).into()], 0)
            .unwrap();
        assert_eq!(
            ws.get_variable(Scope::Base, "last"),
            Some(HostArray::row(vec![1.0, 2.0]).into())
        );
    }
}
