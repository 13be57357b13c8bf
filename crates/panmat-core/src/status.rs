//! Propagation of engine return codes into the host error channel.
//!
//! The host may declare a global one-element double named [`ERROR_CELL`].
//! When it exists, engine codes are written there and the command returns
//! normally; when it does not, a nonzero code becomes an error.

use crate::error::{Error, Result};
use crate::host::{Host, Scope};
use crate::value::{HostArray, HostValue};

/// Name of the global variable that receives engine return codes.
pub const ERROR_CELL: &str = "MPanerror";

/// How a new code combines with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Always overwrite (netlist loading).
    Replace,
    /// Keep the largest code seen (command execution).
    Accumulate,
}

impl StatusPolicy {
    /// Message raised when there is no error channel and the code is nonzero.
    pub fn failure_message(self) -> &'static str {
        match self {
            StatusPolicy::Replace => "A severe error blocked the command execution.",
            StatusPolicy::Accumulate => "An error blocked the command execution.",
        }
    }
}

/// What [`propagate_status`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusOutcome {
    /// The error channel now holds this value.
    Stored(f64),
    /// The channel exists and was left alone.
    Kept(f64),
    /// The channel exists but is not a one-element double.
    Ignored,
    /// No channel and the code was zero.
    Clean,
}

/// Current value of the error channel, if it is a one-element double.
pub fn read_status(host: &dyn Host) -> Option<f64> {
    host.get_variable(Scope::Global, ERROR_CELL)
        .as_ref()
        .and_then(HostValue::as_array)
        .and_then(HostArray::scalar_value)
}

/// Fold an engine return code into the host error channel.
pub fn propagate_status(host: &dyn Host, code: i32, policy: StatusPolicy) -> Result<StatusOutcome> {
    let Some(cell) = host.get_variable(Scope::Global, ERROR_CELL) else {
        if code != 0 {
            log::debug!("engine returned {} and no {} channel exists", code, ERROR_CELL);
            return Err(Error::CommandFailed(policy.failure_message().to_string()));
        }
        return Ok(StatusOutcome::Clean);
    };

    let Some(stored) = cell.as_array().and_then(HostArray::scalar_value) else {
        log::warn!(
            "{} is a {} with {} elements; engine code {} not stored",
            ERROR_CELL,
            cell.class_name(),
            cell.numel(),
            code
        );
        return Ok(StatusOutcome::Ignored);
    };

    let code = f64::from(code);
    let store = match policy {
        StatusPolicy::Replace => true,
        StatusPolicy::Accumulate => code > stored,
    };
    if !store {
        return Ok(StatusOutcome::Kept(stored));
    }
    host.put_variable(Scope::Global, ERROR_CELL, HostValue::from(code))?;
    Ok(StatusOutcome::Stored(code))
}
