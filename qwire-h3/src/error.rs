//! HTTP/3 encoder error types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures the frame encoder can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// PRIORITY_UPDATE is only implemented for request streams.
    #[error("PRIORITY_UPDATE for push streams is not implemented")]
    PushStreamPriorityUpdate,

    /// The writer did not end exactly full; the size query and the write
    /// path disagree, which is a bug in the encoder.
    #[error("serialized {written} bytes where {expected} were sized")]
    LengthMismatch { written: usize, expected: usize },

    /// A varint or writer operation failed.
    #[error(transparent)]
    Write(#[from] qwire_quic::Error),
}
