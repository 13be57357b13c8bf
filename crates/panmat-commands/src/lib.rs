//! Front-end commands for panmat.
//!
//! `pannet` loads the engine and runs a netlist; `pansimc`, `panget`,
//! `panredraw`, `panclearwav` and `panraw` attach to the loaded engine.

pub mod error;
pub mod frontend;
pub mod usage;

pub use error::{CommandError, Result};
pub use frontend::Frontend;
pub use usage::{COMMANDS, Usage};
