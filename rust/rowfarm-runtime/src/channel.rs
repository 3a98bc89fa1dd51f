//! Typed point-to-point channels between participants.
//!
//! A thin layer over [`crossbeam_channel`]: a [`Sender`] / [`Receiver`] pair
//! is created by [`bounded()`] or [`unbounded()`]. A channel closes when
//! every sender (or every receiver) has been dropped, which is how a
//! participant observes that its peer has gone away.

use crossbeam_channel::{self as cb};
use std::fmt;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error returned when sending on a closed channel. Carries the unsent value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendError<T>(pub T);

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send failed: receiving side is gone")
    }
}

impl<T: fmt::Debug> std::error::Error for SendError<T> {}

/// Error returned by [`Receiver::recv`] when the channel is closed and
/// drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("recv failed: channel is closed and empty")]
pub struct RecvError;

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// The sending half of a channel.
pub struct Sender<T> {
    inner: cb::Sender<T>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("pending", &self.inner.len())
            .finish()
    }
}

impl<T> Sender<T> {
    /// Send a value into the channel.
    ///
    /// For bounded channels this blocks while the buffer is full.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        self.inner.send(value).map_err(|e| SendError(e.0))
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// The receiving half of a channel.
pub struct Receiver<T> {
    pub(crate) inner: cb::Receiver<T>,
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("pending", &self.inner.len())
            .finish()
    }
}

impl<T> Receiver<T> {
    /// Block until a message is available or the channel is closed.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.inner.recv().map_err(|_| RecvError)
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Create a bounded channel with the given capacity.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = cb::bounded(capacity);
    (Sender { inner: tx }, Receiver { inner: rx })
}

/// Create an unbounded channel. The sender never blocks.
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = cb::unbounded();
    (Sender { inner: tx }, Receiver { inner: rx })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
