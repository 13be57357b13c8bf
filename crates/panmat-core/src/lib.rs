//! Core value model for the panmat bridge.
//!
//! This crate provides:
//! - Host values (numeric arrays, strings, cells, structs) and the [`Host`] trait
//! - Engine values built on `nalgebra` matrices with row/column line orientation
//! - Marshaling in both directions with allocation recording
//! - Command-line tokenizing for the engine main
//! - Return-code propagation into the `MPanerror` channel
//! - An in-memory [`Workspace`] host

pub mod argv;
pub mod engine;
pub mod error;
pub mod host;
pub mod marshal;
pub mod status;
pub mod value;
pub mod workspace;

pub use argv::{CommandArgv, tokenize};
pub use engine::{EngineMatrix, EngineValue, Orientation};
pub use error::{Error, Result};
pub use host::{Host, Scope};
pub use marshal::{
    Allocation, AllocationKind, AllocationLog, AllocationRecorder, Conversion, array_to_engine,
    to_engine, to_host,
};
pub use status::{ERROR_CELL, StatusOutcome, StatusPolicy, propagate_status, read_status};
pub use value::{ArrayKind, CellArray, HostArray, HostValue, NumericClass, StructValue};
pub use workspace::{HostFunction, Workspace};
