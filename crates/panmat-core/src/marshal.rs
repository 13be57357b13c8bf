//! Conversion between host arrays and engine values.
//!
//! Host to engine consumes the host value: once the engine copy exists the host
//! buffers are gone. Every engine buffer the value needs is reported to an
//! optional [`AllocationRecorder`]; lowering into engine memory reports the
//! blocks it hands over in the same form.

use crate::engine::{EngineMatrix, EngineValue, Orientation};
use crate::error::{Error, Result};
use crate::value::{CellArray, HostArray, HostValue, NumericClass};

/// What kind of engine buffer was allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    /// Flat element buffer (vectors).
    Buffer,
    /// Table of line pointers of a matrix.
    LineTable,
    /// One row or column of a matrix.
    Line,
}

/// One engine buffer created while marshaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub kind: AllocationKind,
    /// Number of slots (elements or pointers).
    pub len: usize,
}

/// Receives every buffer the marshaler allocates for the engine.
pub trait AllocationRecorder {
    fn record(&mut self, allocation: Allocation);
}

/// Recorder that simply keeps the allocations.
#[derive(Debug, Default, Clone)]
pub struct AllocationLog {
    pub allocations: Vec<Allocation>,
}

impl AllocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: AllocationKind) -> usize {
        self.allocations.iter().filter(|a| a.kind == kind).count()
    }
}

impl AllocationRecorder for AllocationLog {
    fn record(&mut self, allocation: Allocation) {
        self.allocations.push(allocation);
    }
}

/// Shape/type combination of a host array, as seen by [`to_engine`].
///
/// Combinations without an engine counterpart have their own variants so that
/// they fail loudly instead of falling through to a neighbouring case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Integer or single-precision classes.
    UnsupportedClass(NumericClass),
    RealScalar,
    ComplexScalar,
    RealVector,
    ComplexVector,
    /// `1 x n`.
    RealRow,
    ComplexRow,
    /// `n x 1`, not handled by this version.
    Column,
    RealMatrix,
    ComplexMatrix,
    HigherRank(usize),
}

impl Conversion {
    /// Classify a host array.
    pub fn of(array: &HostArray) -> Self {
        if array.class() != NumericClass::Double {
            return Conversion::UnsupportedClass(array.class());
        }
        let complex = array.is_complex();
        let shape = array.shape();

        if array.numel() == 1 {
            return if complex {
                Conversion::ComplexScalar
            } else {
                Conversion::RealScalar
            };
        }
        match shape.len() {
            1 if complex => Conversion::ComplexVector,
            1 => Conversion::RealVector,
            2 if shape[0] == 1 && complex => Conversion::ComplexRow,
            2 if shape[0] == 1 => Conversion::RealRow,
            2 if shape[1] == 1 => Conversion::Column,
            2 if complex => Conversion::ComplexMatrix,
            2 => Conversion::RealMatrix,
            rank => Conversion::HigherRank(rank),
        }
    }

    fn unsupported(self) -> Option<String> {
        match self {
            Conversion::UnsupportedClass(class) => {
                Some(format!("{} arrays can not be passed to the simulator", class))
            }
            Conversion::ComplexScalar => Some("complex scalars are not implemented".to_string()),
            Conversion::ComplexVector => Some("complex vectors are not implemented".to_string()),
            Conversion::ComplexRow => Some("complex row vectors are not implemented".to_string()),
            Conversion::Column => Some("column vectors are not implemented".to_string()),
            Conversion::HigherRank(rank) => {
                Some(format!("arrays with {} dimensions are not implemented", rank))
            }
            _ => None,
        }
    }
}

fn record(recorder: &mut Option<&mut dyn AllocationRecorder>, kind: AllocationKind, len: usize) {
    if let Some(r) = recorder.as_deref_mut() {
        r.record(Allocation { kind, len });
    }
}

/// Convert a host value into an engine value, consuming it.
pub fn to_engine(
    value: HostValue,
    recorder: Option<&mut dyn AllocationRecorder>,
) -> Result<EngineValue> {
    match value {
        HostValue::Numeric(array) => array_to_engine(array, recorder),
        other => Err(Error::UnsupportedType(format!(
            "{} values can not be passed to the simulator",
            other.class_name()
        ))),
    }
}

/// Convert a host numeric array into an engine value, consuming it.
pub fn array_to_engine(
    array: HostArray,
    mut recorder: Option<&mut dyn AllocationRecorder>,
) -> Result<EngineValue> {
    let conversion = Conversion::of(&array);
    if let Some(reason) = conversion.unsupported() {
        return Err(Error::UnsupportedType(reason));
    }
    log::debug!(
        "marshaling {:?} {} array as {:?}",
        array.shape(),
        array.class(),
        conversion
    );

    let rows = array.rows();
    let cols = array.cols();
    let (_, _, real, imag) = array.into_parts();

    match conversion {
        Conversion::RealScalar => Ok(EngineValue::RealScalar(real[0])),
        Conversion::RealVector => {
            record(&mut recorder, AllocationKind::Buffer, real.len());
            Ok(EngineValue::RealVector(real))
        }
        Conversion::RealRow => {
            record(&mut recorder, AllocationKind::LineTable, 1);
            record(&mut recorder, AllocationKind::Line, cols);
            let m = EngineMatrix::from_column_major(1, cols, &real, Orientation::Rows)?;
            Ok(EngineValue::RealMatrix(m))
        }
        Conversion::RealMatrix => {
            let m = columns_to_engine(rows, cols, &real, &mut recorder)?;
            Ok(EngineValue::RealMatrix(m))
        }
        Conversion::ComplexMatrix => {
            let im = imag.ok_or_else(|| {
                Error::UnsupportedType("complex matrix without imaginary part".to_string())
            })?;
            let re = columns_to_engine(rows, cols, &real, &mut recorder)?;
            let im = columns_to_engine(rows, cols, &im, &mut recorder)?;
            EngineValue::complex_matrix(re, im)
        }
        other => Err(Error::UnsupportedType(format!("{:?}", other))),
    }
}

/// Column `j` of the flat buffer is `[j * rows, j * rows + rows)` and becomes one line.
fn columns_to_engine(
    rows: usize,
    cols: usize,
    flat: &[f64],
    recorder: &mut Option<&mut dyn AllocationRecorder>,
) -> Result<EngineMatrix<f64>> {
    record(recorder, AllocationKind::LineTable, cols);
    let lines: Vec<Vec<f64>> = (0..cols)
        .map(|j| {
            record(recorder, AllocationKind::Line, rows);
            flat[j * rows..j * rows + rows].to_vec()
        })
        .collect();
    if lines.is_empty() {
        return EngineMatrix::from_column_major(rows, 0, &[], Orientation::Columns);
    }
    EngineMatrix::from_lines(lines, Orientation::Columns)
}

/// Convert an engine value into a host value.
///
/// Numeric values become `rows x cols` double arrays with host element
/// `i + j * rows` taken from engine `(i, j)`. Strings become cell arrays:
/// a string vector maps to a `1 x rows` cell, a string matrix to a
/// `rows x cols` cell indexed `col * rows + row`.
pub fn to_host(value: &EngineValue) -> Result<HostValue> {
    let array = match value {
        EngineValue::RealScalar(v) => HostArray::scalar(*v),
        EngineValue::RealVector(v) => HostArray::matrix(v.len(), 1, v.clone())?,
        EngineValue::ComplexVector { re, im } => {
            HostArray::from_complex(vec![re.len(), 1], re.clone(), im.clone())?
        }
        EngineValue::RealMatrix(m) => {
            HostArray::matrix(m.rows(), m.cols(), m.to_column_major())?
        }
        EngineValue::ComplexMatrix { re, im } => HostArray::from_complex(
            vec![re.rows(), re.cols()],
            re.to_column_major(),
            im.to_column_major(),
        )?,
        EngineValue::StringVector(names) => {
            let cells = names.iter().map(|s| HostValue::Char(s.clone())).collect();
            return Ok(HostValue::Cell(CellArray::new(1, names.len(), cells)?));
        }
        EngineValue::StringMatrix(m) => {
            let cells = m.to_column_major().into_iter().map(HostValue::Char).collect();
            return Ok(HostValue::Cell(CellArray::new(m.rows(), m.cols(), cells)?));
        }
    };
    Ok(HostValue::Numeric(array))
}
