//! Error types for the front-end commands.

use thiserror::Error;

/// Errors raised by a front-end command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Wrong number or type of arguments, or wrong output count.
    #[error("{0}")]
    Usage(String),

    /// Module loading or engine call failure.
    #[error(transparent)]
    Engine(#[from] panmat_engine::EngineError),

    /// Marshaling or status failure.
    #[error(transparent)]
    Core(#[from] panmat_core::Error),
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        CommandError::Usage(message.into())
    }
}

/// Result type for front-end commands.
pub type Result<T> = std::result::Result<T, CommandError>;
