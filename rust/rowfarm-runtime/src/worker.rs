//! Compute worker.
//!
//! A worker receives B once through the broadcast channel and keeps it for
//! its whole life. It then serves assignments one at a time: each
//! [`Message::Assign`] yields exactly one [`Message::Result`] carrying the
//! same row identity, until a [`Message::Terminate`] arrives.

use crate::protocol::{Message, ProtocolError};
use crate::topology::{Endpoint, Rank, TransportError};
use rowfarm_core::{row_times_matrix, Matrix, ShapeError};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failure inside a worker. Every variant names the failing rank.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("{rank}: {source}")]
    Transport {
        rank: Rank,
        #[source]
        source: TransportError,
    },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("{rank}: {source}")]
    Shape {
        rank: Rank,
        #[source]
        source: ShapeError,
    },
    #[error("{rank}: worker thread panicked")]
    Panicked { rank: Rank },
}

impl WorkerError {
    pub fn transport(rank: Rank, source: TransportError) -> Self {
        WorkerError::Transport { rank, source }
    }

    pub fn shape(rank: Rank, source: ShapeError) -> Self {
        WorkerError::Shape { rank, source }
    }
}

// ---------------------------------------------------------------------------
// Options / summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Artificial delay added to every row, to model a slower participant.
    pub throttle: Option<Duration>,
}

/// What a worker reports when it stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub rank: Rank,
    pub rows_computed: usize,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Worker {
    endpoint: Endpoint,
    b: Matrix,
    options: WorkerOptions,
    rows_computed: usize,
}

impl Worker {
    /// Block for the broadcast of B and build a worker around it.
    pub fn receive_broadcast(endpoint: Endpoint, options: WorkerOptions) -> Result<Self, WorkerError> {
        let rank = endpoint.rank();
        let b: Matrix = endpoint
            .recv_broadcast()
            .map_err(|e| WorkerError::transport(rank, e))?;
        // Decoding bypasses the constructor's shape check.
        let b = Matrix::from_vec(b.size(), b.into_vec()).map_err(|e| WorkerError::shape(rank, e))?;
        tracing::trace!(%rank, n = b.size(), "received broadcast");
        Ok(Self {
            endpoint,
            b,
            options,
            rows_computed: 0,
        })
    }

    pub fn rank(&self) -> Rank {
        self.endpoint.rank()
    }

    /// Serve assignments until told to stop.
    pub fn run(mut self) -> Result<WorkerSummary, WorkerError> {
        let rank = self.rank();
        loop {
            let message: Message = self
                .endpoint
                .recv()
                .map_err(|e| WorkerError::transport(rank, e))?;

            match message {
                Message::Assign { row, data } => {
                    let result = self.compute(&data)?;
                    self.endpoint
                        .send(&Message::Result { row, data: result })
                        .map_err(|e| WorkerError::transport(rank, e))?;
                    self.rows_computed += 1;
                }
                Message::Terminate => break,
                other => {
                    return Err(ProtocolError::Unexpected {
                        rank,
                        expected: "Assign or Terminate",
                        found: other.kind(),
                    }
                    .into())
                }
            }
        }

        tracing::trace!(rank = %rank, rows = self.rows_computed, "worker stopped");
        Ok(WorkerSummary {
            rank,
            rows_computed: self.rows_computed,
        })
    }

    fn compute(&self, row: &[f64]) -> Result<Vec<f64>, WorkerError> {
        if let Some(delay) = self.options.throttle {
            thread::sleep(delay);
        }
        let mut out = vec![0.0; self.b.size()];
        row_times_matrix(row, &self.b, &mut out).map_err(|e| WorkerError::shape(self.rank(), e))?;
        Ok(out)
    }
}

/// Worker body for the dynamic strategy: broadcast, then serve.
pub fn serve(endpoint: Endpoint, options: WorkerOptions) -> Result<WorkerSummary, WorkerError> {
    Worker::receive_broadcast(endpoint, options)?.run()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
