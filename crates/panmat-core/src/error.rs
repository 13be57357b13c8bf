//! Error types for marshaling, host access and status propagation.

use thiserror::Error;

/// Errors raised while converting values or talking to the host.
#[derive(Debug, Error)]
pub enum Error {
    /// The element class, rank or shape combination has no engine counterpart.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A buffer for the engine could not be allocated.
    #[error("Unable to allocate memory: {0}")]
    AllocationFailure(String),

    /// Declared shape and element count disagree.
    #[error("Shape mismatch: {what} declares {expected} elements but holds {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    /// A host variable was looked up but does not exist.
    #[error("The <{name}> variable does not exist in the {scope} workspace")]
    VariableNotFound { name: String, scope: String },

    /// A host function call failed.
    #[error("Call to the <{function}> function failed: {message}")]
    HostCall { function: String, message: String },

    /// The engine reported an error and no structured error channel exists.
    #[error("{0}")]
    CommandFailed(String),

    /// An argument did not satisfy a call contract.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Shorthand for a shape mismatch on a named object.
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Error::ShapeMismatch {
            what: what.into(),
            expected,
            found,
        }
    }
}

/// Result type for panmat-core operations.
pub type Result<T> = std::result::Result<T, Error>;
