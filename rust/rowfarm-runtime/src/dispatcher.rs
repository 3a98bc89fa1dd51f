//! Task dispatcher (the coordinator).
//!
//! The dispatcher owns A, C and the queue of rows not yet handed out. After
//! broadcasting B it gives every worker one row (or, when there are more
//! workers than rows, an immediate `Terminate`). From then on it services
//! results first-come first-served: whichever worker replies first has its
//! row written into C and is handed the next row, or told to stop once the
//! queue is exhausted. Faster workers therefore come back more often and
//! receive more rows.
//!
//! Per-worker state is tracked explicitly, which is what enforces "at most
//! one outstanding row per worker" and "terminate only after the last
//! result".

use crate::protocol::{Message, ProtocolError};
use crate::queue::TaskQueue;
use crate::report::Event;
use crate::topology::{Rank, Transport, TransportError};
use rowfarm_core::{Matrix, RowIndex, ShapeError};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("coordinator: at least one worker is required")]
    NoWorkers,
    #[error("coordinator: start() has not been called")]
    NotStarted,
    #[error("coordinator: start() was already called")]
    AlreadyStarted,
    #[error("coordinator: {0}")]
    Shape(#[from] ShapeError),
    #[error("coordinator: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("{rank} hung up while computing {row}")]
    WorkerLost { rank: Rank, row: RowIndex },
    #[error("coordinator: no result within {timeout:?}; outstanding: {}", describe(.outstanding))]
    Timeout {
        timeout: Duration,
        outstanding: Vec<(Rank, RowIndex)>,
    },
}

fn describe(outstanding: &[(Rank, RowIndex)]) -> String {
    outstanding
        .iter()
        .map(|(rank, row)| format!("{rank} holds {row}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Worker state
// ---------------------------------------------------------------------------

/// The coordinator's view of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Awaiting(RowIndex),
    Terminated,
}

/// Everything the dispatcher produced.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub c: Matrix,
    /// Rows handed to each worker, indexed by `rank - 1`.
    pub assignments: Vec<usize>,
    pub write_order: Vec<RowIndex>,
    pub events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<'t, T: Transport> {
    transport: &'t T,
    a: Matrix,
    c: Matrix,
    queue: TaskQueue,
    states: Vec<WorkerState>,
    recorded: Vec<bool>,
    recorded_count: usize,
    assignments: Vec<usize>,
    write_order: Vec<RowIndex>,
    events: Vec<Event>,
    started: bool,
}

impl<'t, T: Transport> Dispatcher<'t, T> {
    pub fn new(a: Matrix, transport: &'t T) -> Result<Self, DispatchError> {
        let workers = transport.workers();
        if workers == 0 {
            return Err(DispatchError::NoWorkers);
        }
        let n = a.size();
        Ok(Self {
            transport,
            c: Matrix::zeros(n)?,
            a,
            queue: TaskQueue::new(n),
            states: vec![WorkerState::Idle; workers],
            recorded: vec![false; n],
            recorded_count: 0,
            assignments: vec![0; workers],
            write_order: Vec::with_capacity(n),
            events: Vec::new(),
            started: false,
        })
    }

    /// Current state of worker `rank`, if it exists.
    pub fn state(&self, rank: Rank) -> Option<WorkerState> {
        self.slot(rank).map(|i| self.states[i])
    }

    /// Broadcast B, then give every worker its first row or, if none is
    /// left, its termination.
    pub fn start(&mut self, b: &Matrix) -> Result<(), DispatchError> {
        if self.started {
            return Err(DispatchError::AlreadyStarted);
        }
        if b.size() != self.a.size() {
            return Err(ShapeError::LengthMismatch {
                expected: self.a.as_slice().len(),
                found: b.as_slice().len(),
            }
            .into());
        }

        self.transport.broadcast(b)?;
        tracing::info!(
            n = self.a.size(),
            workers = self.states.len(),
            "broadcast complete, dispatching first rows"
        );

        for r in 1..=self.states.len() {
            self.assign_or_terminate(Rank::new(r))?;
        }
        self.started = true;
        Ok(())
    }

    /// Service results until every row of C has been recorded.
    pub fn run_to_completion(mut self) -> Result<DispatchOutcome, DispatchError> {
        if !self.started {
            return Err(DispatchError::NotStarted);
        }

        while self.recorded_count < self.recorded.len() {
            let awaiting = self.awaiting();
            let (rank, message) = self
                .transport
                .recv_any(&awaiting)
                .map_err(|e| self.classify(e))?;

            match message {
                Message::Result { row, data } => {
                    self.record(rank, row, &data)?;
                    self.assign_or_terminate(rank)?;
                }
                other => {
                    return Err(ProtocolError::Unexpected {
                        rank,
                        expected: "Result",
                        found: other.kind(),
                    }
                    .into())
                }
            }
        }

        debug_assert!(self.states.iter().all(|s| *s == WorkerState::Terminated));
        tracing::info!(
            rows = self.recorded_count,
            dispatched = self.queue.dispatched(),
            "all rows recorded"
        );

        Ok(DispatchOutcome {
            c: self.c,
            assignments: self.assignments,
            write_order: self.write_order,
            events: self.events,
        })
    }

    fn assign_or_terminate(&mut self, rank: Rank) -> Result<(), DispatchError> {
        let slot = self.slot(rank).ok_or(TransportError::UnknownRank(rank))?;
        match self.queue.take_next() {
            Some(row) => {
                let data = self.a.row(row)?.to_vec();
                self.transport.send(rank, &Message::Assign { row, data })?;
                self.states[slot] = WorkerState::Awaiting(row);
                self.assignments[slot] += 1;
                self.events.push(Event::Dispatched { rank, row });
                tracing::debug!(%rank, %row, remaining = self.queue.remaining(), "dispatched");
            }
            None => {
                self.transport.send(rank, &Message::Terminate)?;
                self.states[slot] = WorkerState::Terminated;
                self.events.push(Event::Terminated { rank });
                tracing::debug!(%rank, "terminated");
            }
        }
        Ok(())
    }

    fn record(&mut self, rank: Rank, row: RowIndex, data: &[f64]) -> Result<(), DispatchError> {
        let slot = self.slot(rank).ok_or(TransportError::UnknownRank(rank))?;
        let state = self.states[slot];
        if state != WorkerState::Awaiting(row) {
            let assigned = match state {
                WorkerState::Awaiting(held) => Some(held),
                _ => None,
            };
            return Err(ProtocolError::UnassignedResult { rank, row, assigned }.into());
        }
        if self.recorded[row.get()] {
            return Err(ProtocolError::DuplicateResult { rank, row }.into());
        }

        self.c.set_row(row, data)?;
        self.recorded[row.get()] = true;
        self.recorded_count += 1;
        self.write_order.push(row);
        self.states[slot] = WorkerState::Idle;
        self.events.push(Event::Recorded { rank, row });
        tracing::debug!(%rank, %row, "recorded");
        Ok(())
    }

    fn awaiting(&self) -> Vec<Rank> {
        self.outstanding().into_iter().map(|(rank, _)| rank).collect()
    }

    fn outstanding(&self) -> Vec<(Rank, RowIndex)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(i, state)| match state {
                WorkerState::Awaiting(row) => Some((Rank::new(i + 1), *row)),
                _ => None,
            })
            .collect()
    }

    fn classify(&self, err: TransportError) -> DispatchError {
        match err {
            TransportError::Timeout(timeout) => DispatchError::Timeout {
                timeout,
                outstanding: self.outstanding(),
            },
            TransportError::Disconnected(rank) => match self.state(rank) {
                Some(WorkerState::Awaiting(row)) => DispatchError::WorkerLost { rank, row },
                _ => DispatchError::Transport(TransportError::Disconnected(rank)),
            },
            other => DispatchError::Transport(other),
        }
    }

    fn slot(&self, rank: Rank) -> Option<usize> {
        rank.get()
            .checked_sub(1)
            .filter(|&i| i < self.states.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
