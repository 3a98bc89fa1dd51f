//! Wait-any receive across several channels.
//!
//! [`Selector`] registers a set of [`Receiver`]s and blocks until any one of
//! them has a message, returning the arm index together with the value.
//! Readiness is raced by [`crossbeam_channel::Select`]; when several arms
//! are ready at once the winner is picked at random, so no arm is favoured
//! by its registration order.
//!
//! ```
//! use rowfarm_runtime::channel;
//! use rowfarm_runtime::select::Selector;
//!
//! let (_tx0, rx0) = channel::unbounded::<u32>();
//! let (tx1, rx1) = channel::unbounded::<u32>();
//! tx1.send(7).unwrap();
//!
//! let (arm, value) = Selector::new().recv(&rx0).recv(&rx1).select().unwrap();
//! assert_eq!((arm, value), (1, 7));
//! ```

use crate::channel::Receiver;
use crossbeam_channel::{self as cb};
use std::time::{Duration, Instant};

/// Why a [`Selector::select`] call returned without a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("no channel registered")]
    NoArms,
    #[error("no channel became ready within {0:?}")]
    Timeout(Duration),
    /// The arm at this index closed with nothing buffered.
    #[error("arm {0} disconnected")]
    Disconnected(usize),
}

/// A wait-any receive over receivers of the same message type.
pub struct Selector<'a, T> {
    arms: Vec<&'a Receiver<T>>,
    timeout: Option<Duration>,
}

impl<'a, T> Selector<'a, T> {
    pub fn new() -> Self {
        Self {
            arms: Vec::new(),
            timeout: None,
        }
    }

    /// Register a channel. Arms are numbered in registration order.
    pub fn recv(mut self, rx: &'a Receiver<T>) -> Self {
        self.arms.push(rx);
        self
    }

    /// Give up after `duration` instead of blocking indefinitely.
    pub fn timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout = duration;
        self
    }

    /// Block until one arm yields a message.
    ///
    /// A closed arm is reported as soon as it is observed rather than being
    /// skipped: for the caller a hung-up peer is a failure, not an absence.
    pub fn select(&self) -> Result<(usize, T), SelectError> {
        if self.arms.is_empty() {
            return Err(SelectError::NoArms);
        }

        let deadline = self.timeout.map(|d| (Instant::now() + d, d));

        let mut sel = cb::Select::new();
        for rx in &self.arms {
            sel.recv(&rx.inner);
        }

        loop {
            // `ready` only reports readiness; the message is taken below, and
            // another consumer may win the race in between.
            let arm = match deadline {
                Some((at, d)) => sel
                    .ready_deadline(at)
                    .map_err(|_| SelectError::Timeout(d))?,
                None => sel.ready(),
            };

            match self.arms[arm].inner.try_recv() {
                Ok(value) => return Ok((arm, value)),
                Err(cb::TryRecvError::Disconnected) => return Err(SelectError::Disconnected(arm)),
                Err(cb::TryRecvError::Empty) => continue,
            }
        }
    }
}

impl<'a, T> Default for Selector<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn single_ready_arm() {
        let (tx, rx) = channel::unbounded::<i32>();
        tx.send(42).unwrap();
        assert_eq!(Selector::new().recv(&rx).select(), Ok((0, 42)));
    }

    #[test]
    fn picks_whichever_arm_is_ready() {
        let (_tx0, rx0) = channel::unbounded::<i32>();
        let (tx1, rx1) = channel::unbounded::<i32>();
        let (_tx2, rx2) = channel::unbounded::<i32>();
        tx1.send(5).unwrap();

        let result = Selector::new().recv(&rx0).recv(&rx1).recv(&rx2).select();
        assert_eq!(result, Ok((1, 5)));
    }

    #[test]
    fn blocks_until_a_late_message() {
        let (_tx0, rx0) = channel::unbounded::<i32>();
        let (tx1, rx1) = channel::unbounded::<i32>();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            tx1.send(99).unwrap();
            tx1
        });

        let start = Instant::now();
        let result = Selector::new().recv(&rx0).recv(&rx1).select();
        assert_eq!(result, Ok((1, 99)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        handle.join().unwrap();
    }

    #[test]
    fn timeout_fires_when_nothing_arrives() {
        let (_tx, rx) = channel::unbounded::<i32>();
        let start = Instant::now();
        let result = Selector::new()
            .recv(&rx)
            .timeout(Some(Duration::from_millis(40)))
            .select();
        assert_eq!(result, Err(SelectError::Timeout(Duration::from_millis(40))));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn disconnected_arm_is_reported() {
        let (_tx0, rx0) = channel::unbounded::<i32>();
        let (tx1, rx1) = channel::unbounded::<i32>();
        drop(tx1);
        let result = Selector::new().recv(&rx0).recv(&rx1).select();
        assert_eq!(result, Err(SelectError::Disconnected(1)));
    }

    #[test]
    fn buffered_message_wins_over_disconnect() {
        let (tx, rx) = channel::unbounded::<i32>();
        tx.send(3).unwrap();
        drop(tx);
        assert_eq!(Selector::new().recv(&rx).select(), Ok((0, 3)));
    }

    #[test]
    fn no_arms_is_an_error() {
        let selector: Selector<'_, i32> = Selector::new();
        assert_eq!(selector.select(), Err(SelectError::NoArms));
    }

    #[test]
    fn ready_arms_are_not_served_in_registration_order() {
        let (tx0, rx0) = channel::unbounded::<i32>();
        let (tx1, rx1) = channel::unbounded::<i32>();
        let mut winners = HashSet::new();

        for _ in 0..200 {
            tx0.send(0).unwrap();
            tx1.send(1).unwrap();
            let (arm, _) = Selector::new().recv(&rx0).recv(&rx1).select().unwrap();
            winners.insert(arm);
            // Drain the loser so both arms start the next round ready.
            let _ = rx0.inner.try_recv();
            let _ = rx1.inner.try_recv();
        }

        assert_eq!(winners.len(), 2, "both arms should win at least once");
    }
}
