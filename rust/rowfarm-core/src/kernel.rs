//! Row kernel and single-process reference product.
//!
//! Every strategy computes output rows through [`row_times_matrix`], which
//! accumulates each entry in ascending `k` from `0.0`. Because the order of
//! additions is fixed per entry, the dynamic, static and reference paths
//! agree bit-for-bit, not just within a tolerance.

use crate::matrix::{Matrix, RowIndex, ShapeError};

/// `out[j] = Σ_k row[k] * b[k][j]` for every column `j`.
///
/// Plain floating-point accumulation; NaN and overflow propagate untouched.
pub fn row_times_matrix(row: &[f64], b: &Matrix, out: &mut [f64]) -> Result<(), ShapeError> {
    let n = b.size();
    if row.len() != n {
        return Err(ShapeError::RowLength {
            expected: n,
            found: row.len(),
        });
    }
    if out.len() != n {
        return Err(ShapeError::RowLength {
            expected: n,
            found: out.len(),
        });
    }
    out.fill(0.0);
    let b = b.as_slice();
    for (k, &a_k) in row.iter().enumerate() {
        let b_row = &b[k * n..(k + 1) * n];
        for (acc, &b_kj) in out.iter_mut().zip(b_row) {
            *acc += a_k * b_kj;
        }
    }
    Ok(())
}

/// Reference product `a · b` computed in a single process.
pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix, ShapeError> {
    if a.size() != b.size() {
        return Err(ShapeError::LengthMismatch {
            expected: b.size() * b.size(),
            found: a.as_slice().len(),
        });
    }
    let mut c = Matrix::zeros(a.size())?;
    let mut scratch = vec![0.0; a.size()];
    for i in 0..a.size() {
        let row = RowIndex::new(i);
        row_times_matrix(a.row(row)?, b, &mut scratch)?;
        c.set_row(row, &scratch)?;
    }
    Ok(c)
}

/// Sum of every entry, row-major.
pub fn checksum(m: &Matrix) -> f64 {
    m.as_slice().iter().fold(0.0, |acc, &v| acc + v)
}
