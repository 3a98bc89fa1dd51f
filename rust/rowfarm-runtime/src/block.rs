//! Static row-block strategy.
//!
//! The rows of C are split up front into one contiguous block per rank
//! (the coordinator included). Every rank materializes only its own rows of
//! A plus all of B from the fill generator, computes its block, and the
//! blocks are gathered at rank 0. There is no queue and no load balancing;
//! this is the baseline the dynamic strategy is measured against, and it
//! must produce the same C.

use crate::topology::{Endpoint, Rank, Topology, TransportError};
use crate::worker::{WorkerError, WorkerSummary};
use rowfarm_core::fill::fill_rows;
use rowfarm_core::{row_times_matrix, Matrix, MatrixTag, RowIndex, ShapeError};
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("coordinator: {0}")]
    Transport(#[from] TransportError),
    #[error("coordinator: {0}")]
    Shape(#[from] ShapeError),
    #[error("{rank} sent rows {got:?}, expected {expected:?}")]
    Misplaced {
        rank: Rank,
        expected: Range<usize>,
        got: Range<usize>,
    },
}

/// One rank's contribution to the gather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub start: usize,
    /// `rows * n` coefficients, row-major.
    pub data: Vec<f64>,
}

/// Split `n` rows over `parts` ranks.
///
/// The first `n % parts` ranks get one extra row; blocks are contiguous and
/// in rank order.
pub fn partition(n: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let base = n / parts;
    let rem = n % parts;
    (0..parts)
        .map(|r| {
            let rows = base + usize::from(r < rem);
            let start = r * base + r.min(rem);
            start..start + rows
        })
        .collect()
}

/// Compute rows `rows` of C for operands of size `n` generated from `seed`.
pub fn compute_block(n: usize, rows: Range<usize>, seed: u32) -> Result<Vec<f64>, ShapeError> {
    let a = fill_rows(n, rows.start, rows.len(), seed, MatrixTag::A)?;
    let b = Matrix::filled(n, seed, MatrixTag::B)?;
    let mut out = vec![0.0; a.len()];
    for (a_row, c_row) in a.chunks_exact(n).zip(out.chunks_exact_mut(n)) {
        row_times_matrix(a_row, &b, c_row)?;
    }
    Ok(out)
}

/// Worker body for the static strategy.
pub fn block_worker(
    endpoint: Endpoint,
    n: usize,
    seed: u32,
    parts: usize,
) -> Result<WorkerSummary, WorkerError> {
    let rank = endpoint.rank();
    let rows = partition(n, parts)
        .get(rank.get())
        .cloned()
        .ok_or_else(|| WorkerError::transport(rank, TransportError::UnknownRank(rank)))?;

    let data = compute_block(n, rows.clone(), seed).map_err(|e| WorkerError::shape(rank, e))?;
    endpoint
        .send(&Block {
            start: rows.start,
            data,
        })
        .map_err(|e| WorkerError::transport(rank, e))?;

    tracing::trace!(%rank, ?rows, "block sent");
    Ok(WorkerSummary {
        rank,
        rows_computed: rows.len(),
    })
}

/// Collect every worker's block (in arrival order) around the coordinator's
/// own block, returning C and the order rows were written.
pub fn gather(
    topology: &Topology<WorkerSummary>,
    n: usize,
    ranges: &[Range<usize>],
    own: Block,
) -> Result<(Matrix, Vec<RowIndex>), BlockError> {
    let mut c = Matrix::zeros(n)?;
    let mut write_order = Vec::with_capacity(n);

    place(&mut c, &mut write_order, Rank::COORDINATOR, ranges, own)?;

    let mut pending: Vec<Rank> = topology.ranks().collect();
    while !pending.is_empty() {
        let (rank, block): (Rank, Block) = topology.recv_decoded(&pending)?;
        pending.retain(|&r| r != rank);
        place(&mut c, &mut write_order, rank, ranges, block)?;
    }
    Ok((c, write_order))
}

fn place(
    c: &mut Matrix,
    write_order: &mut Vec<RowIndex>,
    rank: Rank,
    ranges: &[Range<usize>],
    block: Block,
) -> Result<(), BlockError> {
    let n = c.size();
    let expected = ranges.get(rank.get()).cloned().unwrap_or(0..0);
    let rows = block.data.len() / n;
    let got = block.start..block.start + rows;
    if got != expected || block.data.len() % n != 0 {
        return Err(BlockError::Misplaced {
            rank,
            expected,
            got,
        });
    }
    for (i, values) in block.data.chunks_exact(n).enumerate() {
        let row = RowIndex::new(block.start + i);
        c.set_row(row, values)?;
        write_order.push(row);
    }
    Ok(())
}
