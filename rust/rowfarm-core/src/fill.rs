//! Deterministic coefficient generator.
//!
//! Every coefficient of A and B is a pure function of its position, the run
//! seed and a matrix tag, so any participant can materialize any block of
//! either operand without reading it from storage, and two runs with the
//! same seed see identical operands.
//!
//! The generator seeds a single xorshift64* step from the decimal
//! concatenation of the row and column indices.

use crate::matrix::{alloc_zeroed, ShapeError};
use serde::{Deserialize, Serialize};

/// Multiplier of the xorshift64* output scramble.
const XORSHIFT_STAR_MULT: u64 = 0x2545_F491_4F6C_DD1D;

/// Selects which operand a coefficient belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixTag {
    A = 0,
    B = 1,
}

impl MatrixTag {
    fn offset(self) -> u32 {
        self as u32
    }
}

/// Decimal concatenation of `x` and `y` (`concatenate(12, 3) == 123`),
/// wrapping at 32 bits.
pub fn concatenate(x: u32, y: u32) -> u32 {
    let mut pow: u32 = 10;
    while y >= pow {
        // Past 10^9 the wrapped power can cycle below `y` forever.
        match pow.checked_mul(10) {
            Some(next) => pow = next,
            None => {
                pow = pow.wrapping_mul(10);
                break;
            }
        }
    }
    x.wrapping_mul(pow).wrapping_add(y)
}

/// One xorshift64* step mapped onto `[0, 1)` with 53 bits of precision.
fn xorshift_unit(mut state: u64) -> f64 {
    state ^= state >> 12;
    state ^= state << 25;
    state ^= state >> 27;
    let x = state.wrapping_mul(XORSHIFT_STAR_MULT);
    let inv = 1.0 / (1u64 << 53) as f64;
    (x >> 11) as f64 * inv
}

/// The coefficient at (`row`, `col`) of the matrix identified by `tag`.
///
/// Pure and deterministic; the result is always in `[0, 1)`.
pub fn fill(row: usize, col: usize, seed: u32, tag: MatrixTag) -> f64 {
    let state = concatenate(row as u32, col as u32)
        .wrapping_add(seed)
        .wrapping_add(tag.offset());
    xorshift_unit(u64::from(state))
}

/// Materialize `count` consecutive rows of an `n`-column matrix starting at
/// global row `start`, row-major.
pub fn fill_rows(
    n: usize,
    start: usize,
    count: usize,
    seed: u32,
    tag: MatrixTag,
) -> Result<Vec<f64>, ShapeError> {
    let len = count
        .checked_mul(n)
        .ok_or(ShapeError::Allocation { bytes: usize::MAX })?;
    let mut data = alloc_zeroed(len)?;
    for (i, row) in data.chunks_exact_mut(n.max(1)).enumerate() {
        let global = start + i;
        for (j, value) in row.iter_mut().enumerate() {
            *value = fill(global, j, seed, tag);
        }
    }
    Ok(data)
}
