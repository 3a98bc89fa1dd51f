//! The coordinator's queue of rows not yet dispatched.

use rowfarm_core::RowIndex;

/// Rows `0..len`, handed out strictly in ascending order.
///
/// A row leaves the queue exactly once and never re-enters it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQueue {
    next: usize,
    len: usize,
}

impl TaskQueue {
    pub fn new(len: usize) -> Self {
        Self { next: 0, len }
    }

    /// Take the lowest row not yet dispatched.
    pub fn take_next(&mut self) -> Option<RowIndex> {
        if self.is_exhausted() {
            return None;
        }
        let row = RowIndex::new(self.next);
        self.next += 1;
        Some(row)
    }

    /// True once every row has been taken.
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.len
    }

    pub fn remaining(&self) -> usize {
        self.len - self.next
    }

    pub fn dispatched(&self) -> usize {
        self.next
    }
}
