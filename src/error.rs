use std::io;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced on the producer's path.
///
/// Failures in a single subscriber's delivery never show up here: the
/// broadcaster resolves them internally by dropping that subscriber.
#[derive(Debug, Error)]
pub enum Error {
    /// A durable write, flush, bind or accept failed.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The compressor or serializer ran out of memory.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// An operation was attempted on an already-closed resource.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Indexed access to a record that was already evicted or never produced.
    #[error("index {index} out of range for {len} retained record(s)")]
    OutOfRange { index: i64, len: usize },

    /// A record could not be serialized or deserialized.
    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    /// A loaded or received line was valid JSON but not a record object.
    #[error("malformed record line: {0}")]
    Malformed(String),
}
