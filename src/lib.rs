//! # chat-tree
//!
//! A tree-shaped peer overlay over UDP. Every peer has at most one parent and
//! any number of children; chat lines typed at any peer flood the whole tree.
//!
//! - **Messages**: Join, Leave and Text, carried in a JSON envelope
//! - **Reliability**: every message travels as a sequenced segment and is
//!   retransmitted until the neighbor acknowledges it
//! - **Membership**: a peer started with a parent joins the tree and runs
//!   once its join is acknowledged; a peer without a parent is a new root
//!
//! ## Feature Flags
//!
//! - `transport` (default): segments, sockets and reliable neighbor channels
//! - `client` (default): topology, inbound listener and peer state machine
//!
//! ## Modules
//!
//! - [`core`]: constants, error types and handler traits (always included)
//! - [`message`]: the message model and its wire envelope (always included)
//! - [`event`]: publish/subscribe dispatcher and UI events (always included)
//! - [`transport`]: transport layer (requires `transport` feature)
//! - [`client`]: peer client (requires `client` feature)
//!
//! ## Example Usage
//!
//! ```no_run
//! use chat_tree::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let config = PeerConfigBuilder::new()
//!     .name("alice")
//!     .port(20001)
//!     .parent_addr("127.0.0.1:20000".parse().unwrap())
//!     .build()?;
//!
//! let peer = Client::start(config).await?;
//! peer.joined().await?;
//! peer.on_text_entered("hello, tree");
//! peer.leave().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod event;
pub mod message;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::event::*;
    pub use crate::message::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        Delivery, DeliveryConfig, Neighbor, PeerSocket, Segment, SegmentFlags, SegmentType,
        TransportError, TransportResult,
    };

    #[cfg(feature = "client")]
    pub use crate::client::*;
}

// Re-export commonly used items at crate root
pub use core::{ChatError, DecodeError, DeliveryError, MessageHandler, MessageRenderer};
pub use message::{Message, MessageBody, MessageKind};

#[cfg(feature = "client")]
pub use client::{Client, ClientError, PeerConfig, PeerConfigBuilder, PeerState};
