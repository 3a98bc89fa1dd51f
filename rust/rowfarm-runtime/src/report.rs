//! What a finished run hands back to its caller.

use crate::run::Strategy;
use crate::topology::Rank;
use crate::worker::WorkerSummary;
use rowfarm_core::{checksum, Matrix, RowIndex};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One step of the coordinator's protocol log, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Dispatched { rank: Rank, row: RowIndex },
    Recorded { rank: Rank, row: RowIndex },
    Terminated { rank: Rank },
}

impl Event {
    pub fn rank(&self) -> Rank {
        match *self {
            Event::Dispatched { rank, .. } | Event::Recorded { rank, .. } | Event::Terminated { rank } => rank,
        }
    }
}

/// The product plus everything observable about how it was scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub strategy: Strategy,
    pub size: usize,
    pub seed: u32,
    /// Worker participants, excluding the coordinator.
    pub workers: usize,
    pub c: Matrix,
    /// Rows handed to each participant. Dynamic runs index worker ranks
    /// `1..=workers` at `rank - 1`; static runs index ranks `0..=workers`.
    pub assignments: Vec<usize>,
    /// Row indices in the order their results were written into C.
    pub write_order: Vec<RowIndex>,
    /// Coordinator protocol log; empty for static runs.
    pub events: Vec<Event>,
    pub worker_summaries: Vec<WorkerSummary>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Sum of every entry of C.
    pub fn checksum(&self) -> f64 {
        checksum(&self.c)
    }

    /// Number of `Terminated` events addressed to `rank`.
    pub fn terminations(&self, rank: Rank) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Terminated { rank: r } if *r == rank))
            .count()
    }

    /// The protocol log restricted to one participant.
    pub fn events_for(&self, rank: Rank) -> Vec<Event> {
        self.events.iter().copied().filter(|e| e.rank() == rank).collect()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            strategy: self.strategy,
            size: self.size,
            seed: self.seed,
            workers: self.workers,
            checksum: self.checksum(),
            elapsed_secs: self.elapsed.as_secs_f64(),
            assignments: self.assignments.clone(),
        }
    }
}

/// Compact, serializable view of a report for machine-readable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub strategy: Strategy,
    pub size: usize,
    pub seed: u32,
    pub workers: usize,
    pub checksum: f64,
    pub elapsed_secs: f64,
    pub assignments: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport {
            strategy: Strategy::Dynamic,
            size: 2,
            seed: 0,
            workers: 1,
            c: Matrix::from_vec(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
            assignments: vec![2],
            write_order: vec![RowIndex::new(0), RowIndex::new(1)],
            events: vec![
                Event::Dispatched {
                    rank: Rank::new(1),
                    row: RowIndex::new(0),
                },
                Event::Recorded {
                    rank: Rank::new(1),
                    row: RowIndex::new(0),
                },
                Event::Terminated { rank: Rank::new(1) },
            ],
            worker_summaries: vec![],
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn checksum_and_counts() {
        let r = report();
        assert_eq!(r.checksum(), 10.0);
        assert_eq!(r.terminations(Rank::new(1)), 1);
        assert_eq!(r.terminations(Rank::new(2)), 0);
        assert_eq!(r.events_for(Rank::new(1)).len(), 3);
    }

    #[test]
    fn summary_serializes_to_json() {
        let json = serde_json::to_value(report().summary()).unwrap();
        assert_eq!(json["strategy"], "dynamic");
        assert_eq!(json["checksum"], 10.0);
        assert_eq!(json["elapsed_secs"], 1.5);
        assert_eq!(json["assignments"], serde_json::json!([2]));
    }

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_value(Event::Terminated { rank: Rank::new(3) }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "terminated", "rank": 3}));
    }
}
