//! Process topology: one coordinator (rank 0) and a fixed set of workers.
//!
//! Each worker runs on its own named OS thread and is connected to the
//! coordinator by three channels of encoded [`Frame`]s:
//!
//! - a broadcast channel, used once to deliver B before any other traffic;
//! - a down channel (coordinator → worker) for assignments and termination;
//! - an up channel (worker → coordinator) for results.
//!
//! Nothing else is shared. The coordinator's "receive from any worker" is a
//! genuine wait-any over the up channels of the workers it names, built on
//! [`Selector`].

use crate::channel::{self, Receiver, Sender};
use crate::codec::{self, CodecError, Frame};
use crate::protocol::Message;
use crate::select::{SelectError, Selector};
use crate::worker::WorkerError;
use rowfarm_core::Matrix;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

/// Identity of a participant. Rank 0 is the coordinator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rank(usize);

impl Rank {
    pub const COORDINATOR: Rank = Rank(0);

    pub fn new(rank: usize) -> Self {
        Self(rank)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank({})", self.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0} hung up")]
    Disconnected(Rank),
    #[error("no message within {0:?}")]
    Timeout(Duration),
    #[error("{0} is not part of this topology")]
    UnknownRank(Rank),
    #[error("receive from any worker with no worker named")]
    NothingOutstanding,
    #[error("cannot start {rank}: {source}")]
    Spawn {
        rank: Rank,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Link / Endpoint
// ---------------------------------------------------------------------------

/// Coordinator-side ends of one worker's channels.
#[derive(Debug)]
pub struct Link {
    rank: Rank,
    bcast: Sender<Frame>,
    down: Sender<Frame>,
    up: Receiver<Frame>,
}

impl Link {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Deliver an already-encoded broadcast frame.
    pub fn send_broadcast(&self, frame: Frame) -> Result<(), TransportError> {
        self.bcast
            .send(frame)
            .map_err(|_| TransportError::Disconnected(self.rank))
    }

    pub fn send<T: Serialize>(&self, value: &T) -> Result<(), TransportError> {
        self.down
            .send(codec::encode(value)?)
            .map_err(|_| TransportError::Disconnected(self.rank))
    }

    /// Block for the next frame from this worker only.
    pub fn recv<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        let frame = self
            .up
            .recv()
            .map_err(|_| TransportError::Disconnected(self.rank))?;
        Ok(codec::decode(&frame)?)
    }
}

/// Worker-side ends of its channels to the coordinator.
#[derive(Debug)]
pub struct Endpoint {
    rank: Rank,
    bcast: Receiver<Frame>,
    down: Receiver<Frame>,
    up: Sender<Frame>,
}

impl Endpoint {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Block until the coordinator's broadcast arrives.
    pub fn recv_broadcast<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        let frame = self
            .bcast
            .recv()
            .map_err(|_| TransportError::Disconnected(Rank::COORDINATOR))?;
        Ok(codec::decode(&frame)?)
    }

    /// Block until the coordinator sends the next point-to-point message.
    pub fn recv<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        let frame = self
            .down
            .recv()
            .map_err(|_| TransportError::Disconnected(Rank::COORDINATOR))?;
        Ok(codec::decode(&frame)?)
    }

    pub fn send<T: Serialize>(&self, value: &T) -> Result<(), TransportError> {
        self.up
            .send(codec::encode(value)?)
            .map_err(|_| TransportError::Disconnected(Rank::COORDINATOR))
    }
}

/// Create the three channels joining the coordinator to worker `rank`.
pub fn link(rank: Rank) -> (Link, Endpoint) {
    let (bcast_tx, bcast_rx) = channel::bounded(1);
    let (down_tx, down_rx) = channel::unbounded();
    let (up_tx, up_rx) = channel::unbounded();
    (
        Link {
            rank,
            bcast: bcast_tx,
            down: down_tx,
            up: up_rx,
        },
        Endpoint {
            rank,
            bcast: bcast_rx,
            down: down_rx,
            up: up_tx,
        },
    )
}

// ---------------------------------------------------------------------------
// Transport (coordinator seam)
// ---------------------------------------------------------------------------

/// What the coordinator needs from the world around it.
pub trait Transport {
    /// Number of worker participants (ranks `1..=workers()`).
    fn workers(&self) -> usize;

    /// Deliver an identical copy of `b` to every worker.
    fn broadcast(&self, b: &Matrix) -> Result<(), TransportError>;

    fn send(&self, to: Rank, message: &Message) -> Result<(), TransportError>;

    /// Block until any worker in `among` replies and return who replied.
    fn recv_any(&self, among: &[Rank]) -> Result<(Rank, Message), TransportError>;
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

type WorkerHandle<S> = thread::JoinHandle<Result<S, WorkerError>>;

/// A running set of worker threads plus the coordinator's links to them.
///
/// `S` is what each worker body returns when it finishes.
pub struct Topology<S> {
    links: Vec<Link>,
    handles: Vec<(Rank, WorkerHandle<S>)>,
    recv_timeout: Option<Duration>,
}

impl<S: Send + 'static> Topology<S> {
    /// Start `workers` worker threads, each running `body` on its endpoint.
    pub fn spawn<F>(workers: usize, body: F) -> Result<Self, TransportError>
    where
        F: Fn(Endpoint) -> Result<S, WorkerError> + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        let mut links = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for r in 1..=workers {
            let rank = Rank::new(r);
            let (link, endpoint) = link(rank);
            let body = Arc::clone(&body);
            let handle = thread::Builder::new()
                .name(format!("rowfarm-worker-{r}"))
                .spawn(move || body(endpoint))
                .map_err(|source| TransportError::Spawn { rank, source })?;
            links.push(link);
            handles.push((rank, handle));
        }

        tracing::debug!(workers, "topology started");
        Ok(Self {
            links,
            handles,
            recv_timeout: None,
        })
    }

    /// Bound every wait-any receive by `timeout`.
    pub fn with_recv_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn ranks(&self) -> impl Iterator<Item = Rank> + '_ {
        self.links.iter().map(Link::rank)
    }

    /// Encode `value` once and hand the same frame to every worker.
    pub fn broadcast_encoded<T: Serialize>(&self, value: &T) -> Result<(), TransportError> {
        let frame = codec::encode(value)?;
        for link in &self.links {
            link.send_broadcast(frame.clone())?;
        }
        Ok(())
    }

    pub fn send_encoded<T: Serialize>(&self, to: Rank, value: &T) -> Result<(), TransportError> {
        self.link(to)?.send(value)
    }

    /// Wait-any over the up channels of `among`.
    pub fn recv_decoded<T: DeserializeOwned>(
        &self,
        among: &[Rank],
    ) -> Result<(Rank, T), TransportError> {
        let mut selector = Selector::new().timeout(self.recv_timeout);
        for &rank in among {
            selector = selector.recv(&self.link(rank)?.up);
        }
        let (arm, frame) = selector.select().map_err(|e| match e {
            SelectError::NoArms => TransportError::NothingOutstanding,
            SelectError::Timeout(d) => TransportError::Timeout(d),
            SelectError::Disconnected(arm) => TransportError::Disconnected(among[arm]),
        })?;
        Ok((among[arm], codec::decode(&frame)?))
    }

    /// Close every link and wait for all workers to return.
    ///
    /// The first failing worker (in rank order) is reported.
    pub fn join(self) -> Result<Vec<S>, WorkerError> {
        self.join_all().into_iter().map(|(_, result)| result).collect()
    }

    /// Like [`join`](Self::join), but keeps every worker's outcome.
    pub fn join_all(self) -> Vec<(Rank, Result<S, WorkerError>)> {
        let Topology { links, handles, .. } = self;
        // Workers still blocked on a receive observe the hang-up and return.
        drop(links);

        handles
            .into_iter()
            .map(|(rank, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(WorkerError::Panicked { rank }));
                (rank, result)
            })
            .collect()
    }

    fn link(&self, rank: Rank) -> Result<&Link, TransportError> {
        rank.get()
            .checked_sub(1)
            .and_then(|i| self.links.get(i))
            .ok_or(TransportError::UnknownRank(rank))
    }
}

impl<S: Send + 'static> Transport for Topology<S> {
    fn workers(&self) -> usize {
        self.links.len()
    }

    fn broadcast(&self, b: &Matrix) -> Result<(), TransportError> {
        self.broadcast_encoded(b)
    }

    fn send(&self, to: Rank, message: &Message) -> Result<(), TransportError> {
        self.send_encoded(to, message)
    }

    fn recv_any(&self, among: &[Rank]) -> Result<(Rank, Message), TransportError> {
        self.recv_decoded(among)
    }
}

impl<S> fmt::Debug for Topology<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("workers", &self.links.len())
            .field("recv_timeout", &self.recv_timeout)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rowfarm_core::MatrixTag;

    #[test]
    fn rank_formatting() {
        assert_eq!(Rank::new(3).to_string(), "rank 3");
        assert_eq!(format!("{:?}", Rank::COORDINATOR), "Rank(0)");
    }

    #[test]
    fn broadcast_reaches_every_worker_identically() {
        let topo = Topology::spawn(3, |ep: Endpoint| {
            let b: Matrix = ep.recv_broadcast().map_err(|e| WorkerError::transport(ep.rank(), e))?;
            ep.send(&b).map_err(|e| WorkerError::transport(ep.rank(), e))?;
            Ok(ep.rank())
        })
        .unwrap();

        let b = Matrix::filled(4, 7, MatrixTag::B).unwrap();
        topo.broadcast_encoded(&b).unwrap();

        let ranks: Vec<Rank> = topo.ranks().collect();
        let mut pending = ranks.clone();
        while !pending.is_empty() {
            let (from, copy): (Rank, Matrix) = topo.recv_decoded(&pending).unwrap();
            assert_eq!(copy, b);
            pending.retain(|&r| r != from);
        }

        let mut joined = topo.join().unwrap();
        joined.sort();
        assert_eq!(joined, ranks);
    }

    #[test]
    fn unknown_rank_is_rejected() {
        let topo = Topology::spawn(1, |_ep: Endpoint| Ok(())).unwrap();
        assert!(matches!(
            topo.send_encoded(Rank::new(2), &Message::Terminate),
            Err(TransportError::UnknownRank(_))
        ));
        assert!(matches!(
            topo.send_encoded(Rank::COORDINATOR, &Message::Terminate),
            Err(TransportError::UnknownRank(_))
        ));
        topo.join().unwrap();
    }

    #[test]
    fn recv_any_with_no_ranks_is_an_error() {
        let topo = Topology::spawn(1, |_ep: Endpoint| Ok(())).unwrap();
        assert!(matches!(
            topo.recv_decoded::<Message>(&[]),
            Err(TransportError::NothingOutstanding)
        ));
        topo.join().unwrap();
    }

    #[test]
    fn recv_any_times_out_on_silent_workers() {
        let topo = Topology::spawn(1, |ep: Endpoint| {
            // Stay silent until the coordinator closes the link.
            let _ = ep.recv::<Message>();
            Ok(())
        })
        .unwrap()
        .with_recv_timeout(Some(Duration::from_millis(30)));

        assert!(matches!(
            topo.recv_decoded::<Message>(&[Rank::new(1)]),
            Err(TransportError::Timeout(_))
        ));
        topo.join().unwrap();
    }

    #[test]
    fn worker_exit_is_seen_as_disconnect() {
        let topo = Topology::spawn(1, |_ep: Endpoint| Ok(())).unwrap();
        let err = topo.recv_decoded::<Message>(&[Rank::new(1)]).unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(r) if r == Rank::new(1)));
        topo.join().unwrap();
    }

    #[test]
    fn panicking_worker_is_reported_by_join() {
        let topo = Topology::spawn(1, |_ep: Endpoint| -> Result<(), WorkerError> {
            panic!("boom");
        })
        .unwrap();
        let err = topo.join().unwrap_err();
        assert!(matches!(err, WorkerError::Panicked { rank } if rank == Rank::new(1)));
    }
}
