//! Host-side value model.
//!
//! Host arrays are tagged by element class and stored column-major, the way the
//! numeric environment keeps them. Structs keep their field order, which the
//! N-port bridge relies on when it fixes parameter keyword order.

use std::fmt;

use indexmap::IndexMap;
use num_complex::Complex64;
use serde::Serialize;

use crate::error::{Error, Result};

/// Element class of a host numeric array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericClass {
    Double,
    Single,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

impl NumericClass {
    /// Host class name (`double`, `int32`, ...).
    pub fn name(self) -> &'static str {
        match self {
            NumericClass::Double => "double",
            NumericClass::Single => "single",
            NumericClass::Int8 => "int8",
            NumericClass::UInt8 => "uint8",
            NumericClass::Int16 => "int16",
            NumericClass::UInt16 => "uint16",
            NumericClass::Int32 => "int32",
            NumericClass::UInt32 => "uint32",
            NumericClass::Int64 => "int64",
            NumericClass::UInt64 => "uint64",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, NumericClass::Double | NumericClass::Single)
    }
}

impl fmt::Display for NumericClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse shape category of a host array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Scalar,
    Vector,
    Matrix,
    /// Rank three or higher.
    Array,
}

/// A host numeric array (the array descriptor handed to the marshaler).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostArray {
    class: NumericClass,
    shape: Vec<usize>,
    real: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imag: Option<Vec<f64>>,
}

impl HostArray {
    /// Create an array, checking buffer lengths against the shape.
    pub fn new(
        class: NumericClass,
        shape: Vec<usize>,
        real: Vec<f64>,
        imag: Option<Vec<f64>>,
    ) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if real.len() != expected {
            return Err(Error::shape_mismatch(
                format!("real part of a {:?} array", shape),
                expected,
                real.len(),
            ));
        }
        if let Some(im) = &imag {
            if im.len() != expected {
                return Err(Error::shape_mismatch(
                    format!("imaginary part of a {:?} array", shape),
                    expected,
                    im.len(),
                ));
            }
        }
        Ok(Self {
            class,
            shape,
            real,
            imag,
        })
    }

    /// Real double array of the given shape.
    pub fn from_real(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        Self::new(NumericClass::Double, shape, data, None)
    }

    /// Complex double array of the given shape.
    pub fn from_complex(shape: Vec<usize>, re: Vec<f64>, im: Vec<f64>) -> Result<Self> {
        Self::new(NumericClass::Double, shape, re, Some(im))
    }

    /// Real `rows x cols` matrix from column-major data.
    pub fn matrix(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        Self::from_real(vec![rows, cols], data)
    }

    /// `1 x 1` real double.
    pub fn scalar(value: f64) -> Self {
        Self {
            class: NumericClass::Double,
            shape: vec![1, 1],
            real: vec![value],
            imag: None,
        }
    }

    /// `n x 1` real double column.
    pub fn column(data: Vec<f64>) -> Self {
        Self {
            class: NumericClass::Double,
            shape: vec![data.len(), 1],
            real: data,
            imag: None,
        }
    }

    /// `1 x n` real double row.
    pub fn row(data: Vec<f64>) -> Self {
        Self {
            class: NumericClass::Double,
            shape: vec![1, data.len()],
            real: data,
            imag: None,
        }
    }

    /// `rows x cols` real double zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            class: NumericClass::Double,
            shape: vec![rows, cols],
            real: vec![0.0; rows * cols],
            imag: None,
        }
    }

    /// Retag the element class, keeping the data.
    pub fn with_class(mut self, class: NumericClass) -> Self {
        self.class = class;
        self
    }

    pub fn class(&self) -> NumericClass {
        self.class
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.real.len()
    }

    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    pub fn cols(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    pub fn is_complex(&self) -> bool {
        self.imag.is_some()
    }

    pub fn real_part(&self) -> &[f64] {
        &self.real
    }

    pub fn imag_part(&self) -> Option<&[f64]> {
        self.imag.as_deref()
    }

    pub fn kind(&self) -> ArrayKind {
        if self.numel() == 1 {
            return ArrayKind::Scalar;
        }
        match self.shape.as_slice() {
            [_] => ArrayKind::Vector,
            [1, _] | [_, 1] => ArrayKind::Vector,
            [_, _] => ArrayKind::Matrix,
            _ => ArrayKind::Array,
        }
    }

    /// Real element at `(row, col)` (column-major).
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        self.real.get(row + col * self.rows()).copied()
    }

    /// Complex element at `(row, col)`; the imaginary part is zero for real arrays.
    pub fn complex_at(&self, row: usize, col: usize) -> Option<Complex64> {
        let re = self.get(row, col)?;
        let im = match &self.imag {
            Some(im) => im[row + col * self.rows()],
            None => 0.0,
        };
        Some(Complex64::new(re, im))
    }

    /// The value of a one-element real double array.
    pub fn scalar_value(&self) -> Option<f64> {
        if self.class == NumericClass::Double && !self.is_complex() && self.numel() == 1 {
            Some(self.real[0])
        } else {
            None
        }
    }

    /// Split into class, shape, real and imaginary buffers.
    pub fn into_parts(self) -> (NumericClass, Vec<usize>, Vec<f64>, Option<Vec<f64>>) {
        (self.class, self.shape, self.real, self.imag)
    }
}

/// A 2-D cell array, stored column-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellArray {
    rows: usize,
    cols: usize,
    data: Vec<HostValue>,
}

impl CellArray {
    pub fn new(rows: usize, cols: usize, data: Vec<HostValue>) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(Error::shape_mismatch(
                format!("{}x{} cell array", rows, cols),
                rows * cols,
                data.len(),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cell at linear (column-major) index.
    pub fn get_linear(&self, index: usize) -> Option<&HostValue> {
        self.data.get(index)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&HostValue> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(col * self.rows + row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostValue> {
        self.data.iter()
    }
}

/// A scalar struct with ordered fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructValue {
    fields: IndexMap<String, HostValue>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<HostValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.fields.get(name)
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Any value living in the host namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostValue {
    Numeric(HostArray),
    Char(String),
    Cell(CellArray),
    Struct(StructValue),
}

impl HostValue {
    /// Host class name, for messages.
    pub fn class_name(&self) -> &'static str {
        match self {
            HostValue::Numeric(a) => a.class().name(),
            HostValue::Char(_) => "char",
            HostValue::Cell(_) => "cell",
            HostValue::Struct(_) => "struct",
        }
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            HostValue::Numeric(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Char(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            HostValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&CellArray> {
        match self {
            HostValue::Cell(c) => Some(c),
            _ => None,
        }
    }

    /// Number of elements as the host counts them.
    pub fn numel(&self) -> usize {
        match self {
            HostValue::Numeric(a) => a.numel(),
            HostValue::Char(s) => s.chars().count(),
            HostValue::Cell(c) => c.len(),
            HostValue::Struct(_) => 1,
        }
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Numeric(HostArray::scalar(value))
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Char(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Char(value)
    }
}

impl From<HostArray> for HostValue {
    fn from(value: HostArray) -> Self {
        HostValue::Numeric(value)
    }
}

impl From<CellArray> for HostValue {
    fn from(value: CellArray) -> Self {
        HostValue::Cell(value)
    }
}

impl From<StructValue> for HostValue {
    fn from(value: StructValue) -> Self {
        HostValue::Struct(value)
    }
}
