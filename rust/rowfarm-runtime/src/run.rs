//! Entry points: wire up a topology, run one strategy, report.

use crate::block::{self, Block, BlockError};
use crate::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
use crate::report::RunReport;
use crate::topology::{Rank, Topology, TransportError};
use crate::worker::{self, WorkerError, WorkerOptions, WorkerSummary};
use rowfarm_core::{Matrix, MatrixTag, RowIndex, ShapeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Rows handed out on demand by a coordinator.
    #[default]
    Dynamic,
    /// Contiguous row blocks fixed up front, gathered at rank 0.
    Static,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Dynamic => write!(f, "dynamic"),
            Strategy::Static => write!(f, "static"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Strategy::Dynamic),
            "static" => Ok(Strategy::Static),
            other => Err(format!("unknown strategy '{other}' (expected dynamic or static)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Any failure that aborts a run. There is no partial result.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("coordinator: {0}")]
    Shape(#[from] ShapeError),
    #[error("coordinator: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Block(#[from] BlockError),
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// N, the side of every matrix.
    pub size: usize,
    pub seed: u32,
    /// Worker participants, excluding the coordinator. `0` means one per CPU.
    pub workers: usize,
    pub strategy: Strategy,
    /// Abort when no worker replies for this long. `None` waits forever.
    pub recv_timeout: Option<Duration>,
    /// Per-rank artificial delay for every row a worker computes.
    pub throttles: BTreeMap<usize, Duration>,
}

impl RunConfig {
    pub fn new(size: usize, seed: u32, workers: usize) -> Self {
        Self {
            size,
            seed,
            workers,
            strategy: Strategy::Dynamic,
            recv_timeout: None,
            throttles: BTreeMap::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Slow down worker `rank` by `delay` per row.
    pub fn with_throttle(mut self, rank: usize, delay: Duration) -> Self {
        self.throttles.insert(rank, delay);
        self
    }

    /// Worker count after resolving `0` to the number of CPUs.
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    fn validate(&self) -> Result<(usize, usize), RunError> {
        if self.size == 0 {
            return Err(RunError::InvalidConfig("matrix size must be at least 1".into()));
        }
        if self.throttles.contains_key(&0) {
            return Err(RunError::InvalidConfig(
                "rank 0 is the coordinator and cannot be throttled".into(),
            ));
        }
        Ok((self.size, self.resolved_workers()))
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run whichever strategy `config` selects.
pub fn run(config: &RunConfig) -> Result<RunReport, RunError> {
    match config.strategy {
        Strategy::Dynamic => run_dynamic(config),
        Strategy::Static => run_static(config),
    }
}

/// Master/worker run: rows of A handed out on demand.
pub fn run_dynamic(config: &RunConfig) -> Result<RunReport, RunError> {
    let (n, workers) = config.validate()?;
    let started = Instant::now();

    let a = Matrix::filled(n, config.seed, MatrixTag::A)?;
    let b = Matrix::filled(n, config.seed, MatrixTag::B)?;

    let throttles = config.throttles.clone();
    let topology = Topology::spawn(workers, move |endpoint| {
        let options = WorkerOptions {
            throttle: throttles.get(&endpoint.rank().get()).copied(),
        };
        worker::serve(endpoint, options)
    })?
    .with_recv_timeout(config.recv_timeout);

    let outcome = match dispatch(a, &b, &topology) {
        Ok(outcome) => outcome,
        Err(DispatchError::WorkerLost { rank, row }) => {
            return Err(match cause_of_loss(topology, rank) {
                Some(err) => err.into(),
                None => DispatchError::WorkerLost { rank, row }.into(),
            });
        }
        Err(err) => return Err(err.into()),
    };
    let worker_summaries = topology.join()?;
    let elapsed = started.elapsed();

    tracing::info!(n, workers, ?elapsed, "dynamic run finished");
    Ok(RunReport {
        strategy: Strategy::Dynamic,
        size: n,
        seed: config.seed,
        workers,
        c: outcome.c,
        assignments: outcome.assignments,
        write_order: outcome.write_order,
        events: outcome.events,
        worker_summaries,
        elapsed,
    })
}

fn dispatch(
    a: Matrix,
    b: &Matrix,
    topology: &Topology<WorkerSummary>,
) -> Result<DispatchOutcome, DispatchError> {
    let mut dispatcher = Dispatcher::new(a, topology)?;
    dispatcher.start(b)?;
    dispatcher.run_to_completion()
}

/// Row-block run: every rank computes a fixed slice, gathered at rank 0.
pub fn run_static(config: &RunConfig) -> Result<RunReport, RunError> {
    let (n, workers) = config.validate()?;
    let seed = config.seed;
    let parts = workers + 1;
    let started = Instant::now();

    let topology = Topology::spawn(workers, move |endpoint| {
        block::block_worker(endpoint, n, seed, parts)
    })?
    .with_recv_timeout(config.recv_timeout);

    let ranges = block::partition(n, parts);
    let own_rows = ranges[0].clone();
    let own = Block {
        start: own_rows.start,
        data: block::compute_block(n, own_rows, seed)?,
    };
    let (c, write_order, worker_summaries) = collect_blocks(topology, n, &ranges, own)?;
    let elapsed = started.elapsed();

    tracing::info!(n, workers, ?elapsed, "static run finished");
    Ok(RunReport {
        strategy: Strategy::Static,
        size: n,
        seed,
        workers,
        c,
        assignments: ranges.iter().map(|r| r.len()).collect(),
        write_order,
        events: Vec::new(),
        worker_summaries,
        elapsed,
    })
}

/// Gather every block, then join. A worker that hung up is reported by its
/// own error when it left one.
fn collect_blocks(
    topology: Topology<WorkerSummary>,
    n: usize,
    ranges: &[Range<usize>],
    own: Block,
) -> Result<(Matrix, Vec<RowIndex>, Vec<WorkerSummary>), RunError> {
    match block::gather(&topology, n, ranges, own) {
        Ok((c, write_order)) => Ok((c, write_order, topology.join()?)),
        Err(BlockError::Transport(TransportError::Disconnected(rank))) => {
            Err(match cause_of_loss(topology, rank) {
                Some(err) => err.into(),
                None => BlockError::Transport(TransportError::Disconnected(rank)).into(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// Join every worker and return `rank`'s own error, if it left one.
fn cause_of_loss<S: Send + 'static>(topology: Topology<S>, rank: Rank) -> Option<WorkerError> {
    topology
        .join_all()
        .into_iter()
        .find_map(|(r, result)| (r == rank).then(|| result.err()).flatten())
}
