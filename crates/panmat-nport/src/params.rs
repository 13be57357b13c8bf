//! Parameter sets returned by control-function setup calls.

use std::sync::Arc;

use panmat_core::{HostValue, StructValue};

use crate::error::{NportError, Result};

/// Parameter values of one N-port instance, in keyword order.
///
/// Keywords are shared between every set discovered from the same control
/// function.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    keywords: Arc<[String]>,
    values: Vec<f64>,
}

impl ParameterSet {
    pub fn new(keywords: Arc<[String]>, values: Vec<f64>) -> Result<Self> {
        if keywords.len() != values.len() {
            return Err(NportError::InvalidRequest(format!(
                "{} keywords but {} parameter values",
                keywords.len(),
                values.len()
            )));
        }
        Ok(Self { keywords, values })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Shared keyword list.
    pub fn shared_keywords(&self) -> Arc<[String]> {
        Arc::clone(&self.keywords)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.keywords
            .iter()
            .position(|k| k == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.keywords
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// The set as a host struct, fields in keyword order.
    pub fn to_struct(&self) -> StructValue {
        self.iter().fold(StructValue::new(), |s, (name, value)| {
            s.with_field(name, HostValue::from(value))
        })
    }
}
