//! End-to-end runs over real worker threads.

use rowfarm_core::{multiply, Matrix, MatrixTag, RowIndex};
use rowfarm_runtime::topology::Endpoint;
use rowfarm_runtime::{
    run, run_dynamic, run_static, DispatchError, Dispatcher, Event, Message, Rank, RunConfig,
    RunError, Strategy, Topology, WorkerError, WorkerSummary,
};
use std::time::Duration;

fn reference(n: usize, seed: u32) -> Matrix {
    let a = Matrix::filled(n, seed, MatrixTag::A).unwrap();
    let b = Matrix::filled(n, seed, MatrixTag::B).unwrap();
    multiply(&a, &b).unwrap()
}

// =============================================================================
// Correctness
// =============================================================================

#[test]
fn small_product_matches_reference() {
    let report = run_dynamic(&RunConfig::new(3, 0, 2)).unwrap();
    assert_eq!(report.c, reference(3, 0));
    assert_eq!(report.c.get(0, 0), 0.31933007838043154);
    assert_eq!(report.c.get(2, 2), 0.828852928817593);
    assert_eq!(report.checksum(), 7.637618701009778);
}

#[test]
fn known_checksum_for_seed_42() {
    let report = run_dynamic(&RunConfig::new(4, 42, 3)).unwrap();
    assert_eq!(report.checksum(), 17.502886815390376);
    assert_eq!(format!("{:.6}", report.checksum()), "17.502887");
}

#[test]
fn single_row_single_worker() {
    let report = run_dynamic(&RunConfig::new(1, 42, 1)).unwrap();
    assert_eq!(report.checksum(), 0.21020584335057227);
    assert_eq!(report.assignments, vec![1]);
    assert_eq!(report.terminations(Rank::new(1)), 1);
}

#[test]
fn single_row_with_surplus_workers() {
    let report = run_dynamic(&RunConfig::new(1, 42, 4)).unwrap();
    assert_eq!(report.checksum(), 0.21020584335057227);
    assert_eq!(report.assignments, vec![1, 0, 0, 0]);
    for r in 1..=4 {
        assert_eq!(report.terminations(Rank::new(r)), 1, "rank {r}");
    }
    let first = Rank::new(1);
    assert_eq!(
        report.events_for(first),
        vec![
            Event::Dispatched {
                rank: first,
                row: RowIndex::new(0)
            },
            Event::Recorded {
                rank: first,
                row: RowIndex::new(0)
            },
            Event::Terminated { rank: first },
        ]
    );
}

#[test]
fn every_row_written_exactly_once() {
    let n = 25;
    let report = run_dynamic(&RunConfig::new(n, 7, 4)).unwrap();
    let mut rows: Vec<usize> = report.write_order.iter().map(|r| r.get()).collect();
    rows.sort_unstable();
    assert_eq!(rows, (0..n).collect::<Vec<_>>());
    assert_eq!(report.assignments.iter().sum::<usize>(), n);
}

#[test]
fn result_does_not_depend_on_worker_count() {
    let n = 10;
    let expected = reference(n, 42);
    for workers in [1, 2, 3, 5, 9, 16] {
        let report = run_dynamic(&RunConfig::new(n, 42, workers)).unwrap();
        assert_eq!(report.c, expected, "workers = {workers}");
        assert_eq!(report.checksum(), 223.908771530808);
    }
}

#[test]
fn static_and_dynamic_agree() {
    for (n, workers) in [(1, 1), (4, 3), (10, 4), (17, 2)] {
        let dynamic = run(&RunConfig::new(n, 0, workers)).unwrap();
        let fixed = run(&RunConfig::new(n, 0, workers).with_strategy(Strategy::Static)).unwrap();
        assert_eq!(dynamic.c, fixed.c, "n = {n}, workers = {workers}");
        assert_eq!(dynamic.checksum(), fixed.checksum());
    }
}

#[test]
fn static_strategy_gives_every_rank_a_block() {
    let report = run_static(&RunConfig::new(10, 42, 2)).unwrap();
    assert_eq!(report.assignments, vec![4, 3, 3]);
    assert!(report.events.is_empty());
    let computed: Vec<usize> = report
        .worker_summaries
        .iter()
        .map(|s| s.rows_computed)
        .collect();
    assert_eq!(computed, vec![3, 3]);
}

// =============================================================================
// Protocol shape
// =============================================================================

#[test]
fn each_worker_terminated_once_after_its_last_result() {
    let report = run_dynamic(&RunConfig::new(12, 3, 4)).unwrap();
    for r in 1..=4 {
        let rank = Rank::new(r);
        assert_eq!(report.terminations(rank), 1, "{rank}");
        let events = report.events_for(rank);
        assert_eq!(events.last(), Some(&Event::Terminated { rank }));
        // Strict alternation: every dispatch is recorded before the next one.
        let mut outstanding = false;
        for event in &events[..events.len() - 1] {
            match event {
                Event::Dispatched { .. } => {
                    assert!(!outstanding, "{rank} held two rows");
                    outstanding = true;
                }
                Event::Recorded { .. } => {
                    assert!(outstanding);
                    outstanding = false;
                }
                Event::Terminated { .. } => panic!("{rank} terminated twice"),
            }
        }
        assert!(!outstanding);
    }
}

#[test]
fn surplus_workers_are_released_without_work() {
    let report = run_dynamic(&RunConfig::new(3, 0, 5)).unwrap();
    assert_eq!(report.c, reference(3, 0));
    let idle = report.assignments.iter().filter(|&&n| n == 0).count();
    assert_eq!(idle, 2);
    for r in 1..=5 {
        assert_eq!(report.terminations(Rank::new(r)), 1);
    }
    let summaries: usize = report.worker_summaries.iter().map(|s| s.rows_computed).sum();
    assert_eq!(summaries, 3);
}

#[test]
fn summaries_match_assignments() {
    let report = run_dynamic(&RunConfig::new(20, 1, 3)).unwrap();
    let computed: Vec<usize> = report
        .worker_summaries
        .iter()
        .map(|s| s.rows_computed)
        .collect();
    assert_eq!(computed, report.assignments);
}

// =============================================================================
// Load balancing
// =============================================================================

#[test]
fn slow_worker_receives_fewer_rows() {
    // The fast workers sleep too, so they interleave even on a single core.
    let cfg = RunConfig::new(40, 42, 3)
        .with_throttle(1, Duration::from_millis(25))
        .with_throttle(2, Duration::from_millis(1))
        .with_throttle(3, Duration::from_millis(1));
    let report = run_dynamic(&cfg).unwrap();
    assert_eq!(report.c, reference(40, 42));

    let slow = report.assignments[0];
    let fast = &report.assignments[1..];
    assert!(
        fast.iter().all(|&rows| rows > slow),
        "assignments: {:?}",
        report.assignments
    );
}

// =============================================================================
// Failure
// =============================================================================

#[test]
fn silent_worker_trips_the_timeout() {
    let cfg = RunConfig::new(2, 0, 1)
        .with_throttle(1, Duration::from_millis(500))
        .with_recv_timeout(Some(Duration::from_millis(20)));
    match run_dynamic(&cfg) {
        Err(RunError::Dispatch(DispatchError::Timeout { outstanding, .. })) => {
            assert_eq!(outstanding, vec![(Rank::new(1), RowIndex::new(0))]);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

/// Takes B and one assignment, then walks away.
fn deserter(endpoint: Endpoint) -> Result<WorkerSummary, WorkerError> {
    let rank = endpoint.rank();
    let _b: Matrix = endpoint
        .recv_broadcast()
        .map_err(|e| WorkerError::transport(rank, e))?;
    let _first: Message = endpoint
        .recv()
        .map_err(|e| WorkerError::transport(rank, e))?;
    Ok(WorkerSummary {
        rank,
        rows_computed: 0,
    })
}

#[test]
fn vanished_worker_is_reported_with_its_row() {
    let a = Matrix::filled(3, 0, MatrixTag::A).unwrap();
    let b = Matrix::filled(3, 0, MatrixTag::B).unwrap();
    let topology = Topology::spawn(1, deserter).unwrap();

    let mut dispatcher = Dispatcher::new(a, &topology).unwrap();
    dispatcher.start(&b).unwrap();
    match dispatcher.run_to_completion() {
        Err(DispatchError::WorkerLost { rank, row }) => {
            assert_eq!(rank, Rank::new(1));
            assert_eq!(row, RowIndex::new(0));
        }
        other => panic!("expected a lost worker, got {other:?}"),
    }
    assert!(topology.join().is_ok());
}
