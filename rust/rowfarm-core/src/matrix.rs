//! Flat, row-major storage for square matrices.
//!
//! A [`Matrix`] owns `n * n` coefficients in a single `Vec<f64>`. Rows are
//! the unit of work in every strategy, so the API is row-oriented: borrow a
//! row, overwrite a row, borrow a contiguous block of rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while building or indexing a [`Matrix`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("matrix size must be at least 1")]
    EmptyMatrix,
    #[error("expected {expected} coefficients but found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("{row} is out of range for a {size}x{size} matrix")]
    RowOutOfRange { row: RowIndex, size: usize },
    #[error("row has {found} coefficients, expected {expected}")]
    RowLength { expected: usize, found: usize },
    #[error("cannot allocate {bytes} bytes of matrix storage")]
    Allocation { bytes: usize },
}

// ---------------------------------------------------------------------------
// RowIndex
// ---------------------------------------------------------------------------

/// Zero-based index of a row of A (and, by mirror, of C).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowIndex(usize);

impl RowIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the raw zero-based value.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowIndex({})", self.0)
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row:{}", self.0)
    }
}

impl From<usize> for RowIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Allocate `len` zeroed coefficients, reporting failure instead of aborting.
pub(crate) fn alloc_zeroed(len: usize) -> Result<Vec<f64>, ShapeError> {
    let bytes = len.saturating_mul(std::mem::size_of::<f64>());
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| ShapeError::Allocation { bytes })?;
    data.resize(len, 0.0);
    Ok(data)
}

/// `n * n`, or an allocation error when it does not fit in `usize`.
pub(crate) fn square_len(n: usize) -> Result<usize, ShapeError> {
    n.checked_mul(n).ok_or(ShapeError::Allocation { bytes: usize::MAX })
}

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

/// An N×N matrix of `f64` coefficients stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    /// Number of rows (and columns).
    n: usize,
    /// Flat storage, `data[i * n + j]` is row `i`, column `j`.
    data: Vec<f64>,
}

impl Matrix {
    /// Create an N×N matrix of zeros.
    pub fn zeros(n: usize) -> Result<Self, ShapeError> {
        if n == 0 {
            return Err(ShapeError::EmptyMatrix);
        }
        let data = alloc_zeroed(square_len(n)?)?;
        Ok(Self { n, data })
    }

    /// Wrap an existing flat row-major buffer.
    ///
    /// Returns `Err` if `data.len() != n * n`.
    pub fn from_vec(n: usize, data: Vec<f64>) -> Result<Self, ShapeError> {
        if n == 0 {
            return Err(ShapeError::EmptyMatrix);
        }
        let expected = square_len(n)?;
        if data.len() != expected {
            return Err(ShapeError::LengthMismatch {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { n, data })
    }

    /// Materialize a matrix with the deterministic fill generator.
    pub fn filled(n: usize, seed: u32, tag: crate::fill::MatrixTag) -> Result<Self, ShapeError> {
        if n == 0 {
            return Err(ShapeError::EmptyMatrix);
        }
        let data = crate::fill::fill_rows(n, 0, n, seed, tag)?;
        Ok(Self { n, data })
    }

    /// Number of rows (equal to the number of columns).
    pub fn size(&self) -> usize {
        self.n
    }

    /// Borrow row `row`.
    pub fn row(&self, row: RowIndex) -> Result<&[f64], ShapeError> {
        let range = self.row_range(row)?;
        Ok(&self.data[range])
    }

    /// Overwrite row `row` with `values`.
    pub fn set_row(&mut self, row: RowIndex, values: &[f64]) -> Result<(), ShapeError> {
        if values.len() != self.n {
            return Err(ShapeError::RowLength {
                expected: self.n,
                found: values.len(),
            });
        }
        let range = self.row_range(row)?;
        self.data[range].copy_from_slice(values);
        Ok(())
    }

    /// Borrow the contiguous block of rows `rows.start..rows.end`.
    pub fn rows(&self, rows: Range<usize>) -> Result<&[f64], ShapeError> {
        if rows.end > self.n || rows.start > rows.end {
            return Err(ShapeError::RowOutOfRange {
                row: RowIndex(rows.end.max(rows.start)),
                size: self.n,
            });
        }
        Ok(&self.data[rows.start * self.n..rows.end * self.n])
    }

    /// Coefficient at row `i`, column `j`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "({i}, {j}) out of range for n={}", self.n);
        self.data[i * self.n + j]
    }

    /// The full row-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    fn row_range(&self, row: RowIndex) -> Result<Range<usize>, ShapeError> {
        let i = row.get();
        if i >= self.n {
            return Err(ShapeError::RowOutOfRange { row, size: self.n });
        }
        Ok(i * self.n..(i + 1) * self.n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_n_squared_entries() {
        let m = Matrix::zeros(3).unwrap();
        assert_eq!(m.size(), 3);
        assert_eq!(m.as_slice().len(), 9);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn zero_size_is_rejected() {
        assert_eq!(Matrix::zeros(0), Err(ShapeError::EmptyMatrix));
        assert_eq!(Matrix::from_vec(0, vec![]), Err(ShapeError::EmptyMatrix));
    }

    #[test]
    fn from_vec_checks_length() {
        let err = Matrix::from_vec(2, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::LengthMismatch {
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn rows_are_row_major() {
        let m = Matrix::from_vec(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.row(RowIndex::new(0)).unwrap(), &[1.0, 2.0]);
        assert_eq!(m.row(RowIndex::new(1)).unwrap(), &[3.0, 4.0]);
        assert_eq!(m.get(1, 0), 3.0);
    }

    #[test]
    fn set_row_overwrites_only_that_row() {
        let mut m = Matrix::zeros(3).unwrap();
        m.set_row(RowIndex::new(1), &[7.0, 8.0, 9.0]).unwrap();
        assert_eq!(
            m.as_slice(),
            &[0.0, 0.0, 0.0, 7.0, 8.0, 9.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn set_row_rejects_bad_length_and_index() {
        let mut m = Matrix::zeros(2).unwrap();
        assert_eq!(
            m.set_row(RowIndex::new(0), &[1.0]),
            Err(ShapeError::RowLength {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            m.set_row(RowIndex::new(2), &[1.0, 2.0]),
            Err(ShapeError::RowOutOfRange {
                row: RowIndex::new(2),
                size: 2
            })
        );
    }

    #[test]
    fn rows_block_slice() {
        let m = Matrix::from_vec(3, (0..9).map(f64::from).collect()).unwrap();
        assert_eq!(m.rows(1..3).unwrap(), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(m.rows(0..0).unwrap().is_empty());
        assert!(m.rows(2..4).is_err());
    }

    #[test]
    fn row_index_display() {
        assert_eq!(RowIndex::new(4).to_string(), "row:4");
        assert_eq!(format!("{:?}", RowIndex::new(4)), "RowIndex(4)");
    }

    #[test]
    fn oversized_matrix_reports_allocation_failure() {
        assert!(matches!(
            Matrix::zeros(usize::MAX),
            Err(ShapeError::Allocation { .. })
        ));
    }
}
