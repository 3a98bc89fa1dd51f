//! Wire encoding for everything that crosses a participant boundary.
//!
//! Participants never share in-memory values: a message is serialized into
//! a [`Frame`] with `bincode`, moved through a channel, and decoded by the
//! receiver into its own copy.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// One encoded message.
pub type Frame = Vec<u8>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[source] bincode::Error),
    #[error("decode failed: {0}")]
    Decode(#[source] bincode::Error),
}

pub fn encode<T: Serialize>(value: &T) -> Result<Frame, CodecError> {
    bincode::serialize(value).map_err(CodecError::Encode)
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(frame).map_err(CodecError::Decode)
}
