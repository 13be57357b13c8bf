//! Error types for loading and driving the engine module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the engine bridge.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The directory of the module path does not exist.
    #[error("The <{}> shared library can not be found.", path.display())]
    NotFound { path: PathBuf },

    /// The dynamic loader refused the module.
    #[error("The <{}> shared library can not be loaded. Reason: {reason}", path.display())]
    LoadError { path: PathBuf, reason: String },

    /// An entry point is missing from the module.
    #[error("The <{symbol}> evaluate routine is not found in <{}> shared module.", path.display())]
    SymbolMissing { symbol: String, path: PathBuf },

    /// The module is not resident in this process.
    #[error("The <{}> shared library can not be loaded.\n{hint}", path.display())]
    NotLoaded { path: PathBuf, hint: String },

    /// A string handed to the engine contains a NUL byte.
    #[error("The <{0}> string can not be passed to the simulator")]
    InvalidString(String),

    /// The engine does not know the requested variable.
    #[error("The <{0}> variable can not be found in the simulator data-bases.")]
    ValueNotFound(String),

    /// The engine could not delete a memory waveform.
    #[error("Error: the <{0}> memwaveform was not found and thus it is not deleted.")]
    WaveformNotDeleted(String),

    /// A raw file variable could not be read.
    #[error("The <{variable}> variable can not be read from the <{}> raw file.", path.display())]
    RawRead { path: PathBuf, variable: String },

    /// Marshaling or host access failed.
    #[error(transparent)]
    Core(#[from] panmat_core::Error),

    /// An N-port callback failed.
    #[error(transparent)]
    Nport(#[from] panmat_nport::NportError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
