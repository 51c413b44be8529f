//! Error types for chat-tree.

use thiserror::Error;

/// Errors that can occur when decoding a message envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload did not match any known message variant.
    #[error("invalid message envelope: {0}")]
    InvalidEnvelope(String),

    /// Nothing to decode.
    #[error("empty message payload")]
    Empty,
}

/// Errors that can occur when encoding a message envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to encode message: {0}")]
pub struct EncodeError(pub String);

/// Segment buffer shorter than the fixed header.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("malformed segment: expected at least {expected} bytes, got {actual}")]
pub struct MalformedSegmentError {
    /// Minimum size (the header length).
    pub expected: usize,
    /// Actual buffer size.
    pub actual: usize,
}

/// Why a reliable send did not complete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No matching acknowledgment arrived within the retry budget.
    #[error("no acknowledgment after {attempts} attempts")]
    RetriesExhausted {
        /// Total transmissions made (first attempt plus retries).
        attempts: u32,
    },

    /// The channel was detached before the send completed.
    #[error("neighbor channel detached")]
    Detached,

    /// The message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Top-level chat-tree errors.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Encode error.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Segment error.
    #[error("segment error: {0}")]
    Segment(#[from] MalformedSegmentError),

    /// Delivery error.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Membership error: the peer could not join or is not in the tree.
    #[error("membership error: {0}")]
    Membership(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
