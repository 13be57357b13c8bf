//! Error types for N-port callbacks.

use std::fmt;

use thiserror::Error;

/// Which output of a control function is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPosition {
    First,
    Second,
    Third,
}

impl fmt::Display for OutputPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPosition::First => write!(f, "first"),
            OutputPosition::Second => write!(f, "second"),
            OutputPosition::Third => write!(f, "third"),
        }
    }
}

/// Errors raised while setting up or evaluating an N-port.
#[derive(Debug, Error)]
pub enum NportError {
    /// The setup call did not return a struct.
    #[error("The returned variable of the <{function}> control function must be a 'struct'.")]
    NotAStruct { function: String },

    /// A parameter field is missing or is not a real scalar.
    #[error(
        "The <{field}> item of the 'struct' of the <{function}> control function must be a real number."
    )]
    InvalidParameterField { field: String, function: String },

    /// An evaluate output is not a real double array.
    #[error(
        "The {position} returned variable of the <{function}> control function must be an array of real numbers."
    )]
    InvalidReturnType {
        position: OutputPosition,
        function: String,
    },

    /// An evaluate output holds too few elements.
    #[error(
        "The {position} returned variable of the <{function}> control function holds {found} elements, at least {expected} expected."
    )]
    InvalidReturnShape {
        position: OutputPosition,
        function: String,
        expected: usize,
        found: usize,
    },

    /// The control function returned fewer values than requested.
    #[error("The <{function}> control function returned {found} values, {expected} expected.")]
    MissingOutputs {
        function: String,
        expected: usize,
        found: usize,
    },

    /// The engine passed inconsistent inputs.
    #[error("Invalid N-port request: {0}")]
    InvalidRequest(String),

    /// Host call or marshaling failure.
    #[error(transparent)]
    Host(#[from] panmat_core::Error),
}

/// Result type for N-port operations.
pub type Result<T> = std::result::Result<T, NportError>;
