//! Rowfarm Runtime
//!
//! Coordinator/worker message passing for row-parallel matrix
//! multiplication. Participants run as isolated threads that exchange only
//! encoded frames over channels: a coordinator hands out rows of A on demand
//! ([`dispatcher`]) to workers that hold a broadcast copy of B ([`worker`]).
//! The static row-block alternative lives in [`block`].

pub mod block;
pub mod channel;
pub mod codec;
pub mod dispatcher;
pub mod protocol;
pub mod queue;
pub mod report;
pub mod run;
pub mod select;
pub mod topology;
pub mod worker;

pub use dispatcher::{DispatchError, Dispatcher, WorkerState};
pub use protocol::{Message, MessageKind, ProtocolError};
pub use queue::TaskQueue;
pub use report::{Event, ReportSummary, RunReport};
pub use run::{run, run_dynamic, run_static, RunConfig, RunError, Strategy};
pub use topology::{Rank, Topology, Transport, TransportError};
pub use worker::{Worker, WorkerError, WorkerOptions, WorkerSummary};
