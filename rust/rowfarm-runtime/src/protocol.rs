//! Messages exchanged between the coordinator and its workers.
//!
//! Row identity is an explicit, named, zero-based field in both directions,
//! and termination is its own variant, so no numeric value can be mistaken
//! for another class of message.
//!
//! Per worker, as seen by the coordinator:
//!
//! ```text
//! Idle --Assign(i)--> Awaiting(i) --Result(i)--> Idle --Assign(j)--> ...
//!                                           \--> Terminated (queue exhausted)
//! ```
//!
//! and as seen by the worker:
//!
//! ```text
//! Waiting --Assign--> Computing --Result--> Waiting
//! Waiting --Terminate--> Stopped
//! ```

use crate::topology::Rank;
use rowfarm_core::RowIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point-to-point protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Coordinator → worker: compute row `row` of C from this row of A.
    Assign { row: RowIndex, data: Vec<f64> },
    /// Worker → coordinator: row `row` of C.
    Result { row: RowIndex, data: Vec<f64> },
    /// Coordinator → worker: no more rows will be assigned.
    Terminate,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Assign { .. } => MessageKind::Assign,
            Message::Result { .. } => MessageKind::Result,
            Message::Terminate => MessageKind::Terminate,
        }
    }
}

/// The class of a [`Message`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Assign,
    Result,
    Terminate,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Assign => write!(f, "Assign"),
            MessageKind::Result => write!(f, "Result"),
            MessageKind::Terminate => write!(f, "Terminate"),
        }
    }
}

/// A participant broke the message protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("{rank}: expected {expected}, received {found}")]
    Unexpected {
        rank: Rank,
        expected: &'static str,
        found: MessageKind,
    },
    #[error("{rank} returned {row} while holding {assigned:?}")]
    UnassignedResult {
        rank: Rank,
        row: RowIndex,
        assigned: Option<RowIndex>,
    },
    #[error("{rank} returned {row}, which was already recorded")]
    DuplicateResult { rank: Rank, row: RowIndex },
}
