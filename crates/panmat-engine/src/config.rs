//! Location of the engine module.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable naming the directory that holds the engine module.
pub const SHL_PATH_VAR: &str = "PAN_MAT_SHL_PATH";

/// Default engine module file name.
pub const MODULE_NAME: &str = "panMat.so";

/// Where to find the engine module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Directory of the module; `None` lets the dynamic loader search.
    pub module_dir: Option<PathBuf>,
    /// Module file name.
    pub module_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module_dir: None,
            module_name: MODULE_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Configuration taken from `PAN_MAT_SHL_PATH`.
    pub fn from_env() -> Self {
        Self::from_shl_path(std::env::var_os(SHL_PATH_VAR))
    }

    /// Configuration for a given `PAN_MAT_SHL_PATH` value.
    pub fn from_shl_path(value: Option<OsString>) -> Self {
        Self {
            module_dir: value.filter(|v| !v.is_empty()).map(PathBuf::from),
            ..Default::default()
        }
    }

    /// Set the module directory.
    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = Some(dir.into());
        self
    }

    /// Set the module file name.
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    /// Full path handed to the loader.
    pub fn module_path(&self) -> PathBuf {
        match &self.module_dir {
            Some(dir) => dir.join(&self.module_name),
            None => PathBuf::from(&self.module_name),
        }
    }
}
