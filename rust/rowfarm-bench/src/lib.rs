//! Shared fixtures for the rowfarm benchmarks.

use rowfarm_core::{Matrix, MatrixTag, ShapeError};
use rowfarm_runtime::{RunConfig, Strategy};

/// Matrix sides exercised by every group.
pub const SIZES: [usize; 3] = [32, 128, 256];

pub const SEED: u32 = 42;

/// Worker count used by the strategy comparison, independent of the host.
pub const WORKERS: usize = 4;

pub fn config(n: usize, strategy: Strategy) -> RunConfig {
    RunConfig::new(n, SEED, WORKERS).with_strategy(strategy)
}

/// A and B for a run of side `n`.
pub fn operands(n: usize) -> Result<(Matrix, Matrix), ShapeError> {
    Ok((
        Matrix::filled(n, SEED, MatrixTag::A)?,
        Matrix::filled(n, SEED, MatrixTag::B)?,
    ))
}
