//! Transport layer error types.
//!
//! Per-datagram errors never stop the inbound listener: the datagram is
//! dropped and the error is logged.

use std::io;

use thiserror::Error;

use crate::core::{DecodeError, EncodeError, MalformedSegmentError};

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Datagram shorter than a segment header.
    #[error("{0}")]
    MalformedSegment(#[from] MalformedSegmentError),

    /// Segment payload is not a known message.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

impl TransportError {
    /// Check if this error only affects a single datagram.
    ///
    /// The datagram is dropped and processing continues.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            TransportError::MalformedSegment(_) | TransportError::Decode(_)
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_drop_errors() {
        let malformed = MalformedSegmentError {
            expected: 9,
            actual: 0,
        };
        assert!(TransportError::from(malformed).is_silent_drop());
        assert!(TransportError::from(DecodeError::Empty).is_silent_drop());

        assert!(!TransportError::Io(io::Error::other("test")).is_silent_drop());
        assert!(!TransportError::from(EncodeError("x".into())).is_silent_drop());
    }
}
