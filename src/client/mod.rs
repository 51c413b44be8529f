//! chat-tree - Peer Client
//!
//! A peer in the overlay tree: configuration, topology, the inbound
//! listener and the membership state machine.

#[allow(clippy::module_inception)]
mod client;
mod config;
mod listener;
mod node;

pub use client::*;
pub use config::*;
pub use listener::PacketLoss;
pub use node::*;
