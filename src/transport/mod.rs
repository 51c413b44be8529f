//! chat-tree - Transport Layer
//!
//! This module provides acknowledged delivery over UDP:
//!
//! - **Segment encoding/decoding**: [`Segment`] with its fixed 9-byte header
//! - **Async sockets**: [`PeerSocket`] wrapper for tokio UDP
//! - **Reliable channels**: [`Neighbor`], one per parent or child, with
//!   timeout, retransmission and exactly-once completion
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Client (topology, state)         │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   segments, neighbor channels           │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod error;
mod neighbor;
mod segment;
mod socket;

pub use error::*;
pub use neighbor::*;
pub use segment::*;
pub use socket::*;
