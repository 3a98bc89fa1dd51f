//! Rowfarm Core
//!
//! Dense N×N matrix storage, the deterministic coefficient generator used to
//! materialize the operands, and the row kernel shared by every
//! multiplication strategy.

pub mod fill;
pub mod kernel;
pub mod matrix;

pub use fill::{fill, MatrixTag};
pub use kernel::{checksum, multiply, row_times_matrix};
pub use matrix::{Matrix, RowIndex, ShapeError};
