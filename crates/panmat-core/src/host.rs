//! The host environment seen from the bridge.
//!
//! Every method takes `&self`: the engine can call back into the host while a
//! front-end is still inside an engine call, and the host callback may in turn
//! reach the engine again. Implementations keep their own interior mutability
//! and must not hold borrows across `call_function`.

use std::fmt;

use crate::error::Result;
use crate::value::HostValue;

/// Variable namespace in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Workspace of the function that invoked the front-end.
    Caller,
    /// Global variables.
    Global,
    /// Base (top-level) workspace.
    Base,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Caller => write!(f, "caller"),
            Scope::Global => write!(f, "global"),
            Scope::Base => write!(f, "base"),
        }
    }
}

/// Capabilities the bridge needs from the numeric host.
pub trait Host {
    /// Copy of a variable, if it exists.
    fn get_variable(&self, scope: Scope, name: &str) -> Option<HostValue>;

    /// Create or overwrite a variable.
    fn put_variable(&self, scope: Scope, name: &str, value: HostValue) -> Result<()>;

    /// Call a host function by name, requesting `nargout` outputs.
    fn call_function(&self, name: &str, args: Vec<HostValue>, nargout: usize)
    -> Result<Vec<HostValue>>;

    /// Evaluate a code string (used for `drawnow;`).
    fn eval_string(&self, code: &str) -> Result<()>;

    /// Write text to the host console.
    fn print(&self, text: &str);
}
