//! N-port device callbacks for panmat.
//!
//! The simulator delegates N-port devices to host control functions: one call
//! at setup to obtain named real parameters, then one call per evaluation to
//! obtain the port equations and their derivative matrices.

pub mod bridge;
pub mod error;
pub mod params;

pub use bridge::{EvalRequest, NportBridge, NportResponse, SetupRequest, evaluate};
pub use error::{NportError, OutputPosition, Result};
pub use params::ParameterSet;
