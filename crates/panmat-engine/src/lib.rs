//! Dynamic loading of the panMat engine for panmat.
//!
//! This crate provides:
//! - Module discovery (`PAN_MAT_SHL_PATH`) and a loader seam over `libloading`
//! - A thread-local registry of the loaded module, with attach-only access for
//!   commands that read results
//! - The engine entry points and the host callback table
//! - Conversion between engine memory layouts and owned values

pub mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod loader;
pub mod raw;
pub mod registry;

pub use callbacks::CallbackContext;
pub use config::{BridgeConfig, MODULE_NAME, SHL_PATH_VAR};
pub use engine::{Engine, initialise, shutdown};
pub use error::{EngineError, Result};
pub use loader::{DynamicLoader, ModuleBackend, ModuleImage, OpenMode};
pub use registry::{EntryPoint, ModuleHandle, ModuleRegistry, NOT_LOADED_HINT};
