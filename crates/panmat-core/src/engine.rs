//! Engine-side value representation.
//!
//! The engine keeps matrices as tables of line pointers (one pointer per row or
//! per column). On the Rust side a matrix is an owned 2-D container indexed by
//! `(row, col)`; the line orientation is carried along so the FFI layer knows
//! which pointer table to build. Flat column-major buffers only appear at the
//! host boundary, through [`EngineMatrix::from_column_major`] and
//! [`EngineMatrix::to_column_major`].

use std::ops::Index;

use nalgebra::{DMatrix, Scalar};
use num_complex::Complex64;

use crate::error::{Error, Result};

/// Which lines of a matrix the engine stores as separate buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// One buffer per row: `table[row][col]`.
    Rows,
    /// One buffer per column: `table[col][row]`.
    Columns,
}

/// Owned engine matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMatrix<T: Scalar> {
    data: DMatrix<T>,
    orientation: Orientation,
}

impl<T: Scalar> EngineMatrix<T> {
    /// Build from a host column-major buffer: element `(i, j)` is `data[i + j * rows]`.
    pub fn from_column_major(
        rows: usize,
        cols: usize,
        data: &[T],
        orientation: Orientation,
    ) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::shape_mismatch(
                format!("{}x{} matrix", rows, cols),
                rows * cols,
                data.len(),
            ));
        }
        Ok(Self {
            data: DMatrix::from_column_slice(rows, cols, data),
            orientation,
        })
    }

    /// Build from engine line buffers (rows or columns, per `orientation`).
    pub fn from_lines(lines: Vec<Vec<T>>, orientation: Orientation) -> Result<Self> {
        let count = lines.len();
        let len = lines.first().map_or(0, Vec::len);
        if let Some(bad) = lines.iter().find(|l| l.len() != len) {
            return Err(Error::shape_mismatch("matrix line", len, bad.len()));
        }
        let data = match orientation {
            Orientation::Rows => DMatrix::from_fn(count, len, |r, c| lines[r][c].clone()),
            Orientation::Columns => DMatrix::from_fn(len, count, |r, c| lines[c][r].clone()),
        };
        Ok(Self { data, orientation })
    }

    pub fn from_dmatrix(data: DMatrix<T>, orientation: Orientation) -> Self {
        Self { data, orientation }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.data.get((row, col))
    }

    /// Flat column-major copy for the host side.
    pub fn to_column_major(&self) -> Vec<T> {
        self.data.as_slice().to_vec()
    }

    /// The line buffers the engine stores, in table order.
    pub fn lines(&self) -> Vec<Vec<T>> {
        match self.orientation {
            Orientation::Rows => self
                .data
                .row_iter()
                .map(|row| row.iter().cloned().collect())
                .collect(),
            Orientation::Columns => self
                .data
                .column_iter()
                .map(|col| col.iter().cloned().collect())
                .collect(),
        }
    }

    pub fn as_dmatrix(&self) -> &DMatrix<T> {
        &self.data
    }
}

impl<T: Scalar> Index<(usize, usize)> for EngineMatrix<T> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &T {
        &self.data[index]
    }
}

/// A value as the engine stores it.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    RealScalar(f64),
    RealVector(Vec<f64>),
    RealMatrix(EngineMatrix<f64>),
    ComplexVector { re: Vec<f64>, im: Vec<f64> },
    ComplexMatrix {
        re: EngineMatrix<f64>,
        im: EngineMatrix<f64>,
    },
    StringVector(Vec<String>),
    StringMatrix(EngineMatrix<String>),
}

impl EngineValue {
    /// Complex vector with matching part lengths.
    pub fn complex_vector(re: Vec<f64>, im: Vec<f64>) -> Result<Self> {
        if re.len() != im.len() {
            return Err(Error::shape_mismatch(
                "imaginary part of a complex vector",
                re.len(),
                im.len(),
            ));
        }
        Ok(EngineValue::ComplexVector { re, im })
    }

    /// Complex matrix with matching part shapes.
    pub fn complex_matrix(re: EngineMatrix<f64>, im: EngineMatrix<f64>) -> Result<Self> {
        if re.rows() != im.rows() || re.cols() != im.cols() {
            return Err(Error::shape_mismatch(
                format!("imaginary part of a {}x{} complex matrix", re.rows(), re.cols()),
                re.len(),
                im.len(),
            ));
        }
        Ok(EngineValue::ComplexMatrix { re, im })
    }

    pub fn rows(&self) -> usize {
        match self {
            EngineValue::RealScalar(_) => 1,
            EngineValue::RealVector(v) => v.len(),
            EngineValue::ComplexVector { re, .. } => re.len(),
            EngineValue::StringVector(v) => v.len(),
            EngineValue::RealMatrix(m) => m.rows(),
            EngineValue::ComplexMatrix { re, .. } => re.rows(),
            EngineValue::StringMatrix(m) => m.rows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            EngineValue::RealScalar(_)
            | EngineValue::RealVector(_)
            | EngineValue::ComplexVector { .. }
            | EngineValue::StringVector(_) => 1,
            EngineValue::RealMatrix(m) => m.cols(),
            EngineValue::ComplexMatrix { re, .. } => re.cols(),
            EngineValue::StringMatrix(m) => m.cols(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            EngineValue::ComplexVector { .. } | EngineValue::ComplexMatrix { .. }
        )
    }

    /// Short type name, for logs and messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            EngineValue::RealScalar(_) => "real scalar",
            EngineValue::RealVector(_) => "real vector",
            EngineValue::RealMatrix(_) => "real matrix",
            EngineValue::ComplexVector { .. } => "complex vector",
            EngineValue::ComplexMatrix { .. } => "complex matrix",
            EngineValue::StringVector(_) => "string vector",
            EngineValue::StringMatrix(_) => "string matrix",
        }
    }

    /// Numeric element at `(row, col)`; `None` for strings or out of range.
    pub fn complex_at(&self, row: usize, col: usize) -> Option<Complex64> {
        match self {
            EngineValue::RealScalar(v) if row == 0 && col == 0 => Some(Complex64::new(*v, 0.0)),
            EngineValue::RealVector(v) if col == 0 => v.get(row).map(|&r| Complex64::new(r, 0.0)),
            EngineValue::ComplexVector { re, im } if col == 0 => {
                Some(Complex64::new(*re.get(row)?, *im.get(row)?))
            }
            EngineValue::RealMatrix(m) => m.get(row, col).map(|&r| Complex64::new(r, 0.0)),
            EngineValue::ComplexMatrix { re, im } => {
                Some(Complex64::new(*re.get(row, col)?, *im.get(row, col)?))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_roundtrip() {
        // [1 3 5; 2 4 6]
        let flat = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let m = EngineMatrix::from_column_major(2, 3, &flat, Orientation::Columns).unwrap();
        assert_eq!(m[(0, 2)], 5.0);
        assert_eq!(m[(1, 0)], 2.0);
        assert_eq!(m.to_column_major(), flat.to_vec());
    }

    #[test]
    fn test_lines_follow_orientation() {
        let flat = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let cols = EngineMatrix::from_column_major(2, 3, &flat, Orientation::Columns).unwrap();
        assert_eq!(
            cols.lines(),
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]
        );

        let rows = EngineMatrix::from_column_major(2, 3, &flat, Orientation::Rows).unwrap();
        assert_eq!(rows.lines(), vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
    }

    #[test]
    fn test_from_lines_matches_column_major() {
        let rows = EngineMatrix::from_lines(
            vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]],
            Orientation::Rows,
        )
        .unwrap();
        let cols = EngineMatrix::from_lines(
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            Orientation::Columns,
        )
        .unwrap();
        assert_eq!(rows.as_dmatrix(), cols.as_dmatrix());
        assert!(EngineMatrix::from_lines(vec![vec![1.0], vec![1.0, 2.0]], Orientation::Rows).is_err());
    }

    #[test]
    fn test_string_matrix() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let m = EngineMatrix::from_column_major(2, 2, &names, Orientation::Rows).unwrap();
        assert_eq!(m[(0, 1)], "c");
    }

    #[test]
    fn test_complex_shapes_checked() {
        assert!(EngineValue::complex_vector(vec![1.0, 2.0], vec![0.0]).is_err());
        let re = EngineMatrix::from_column_major(1, 2, &[1.0, 2.0], Orientation::Columns).unwrap();
        let im = EngineMatrix::from_column_major(2, 1, &[1.0, 2.0], Orientation::Columns).unwrap();
        assert!(EngineValue::complex_matrix(re, im).is_err());
    }
}
