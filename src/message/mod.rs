//! chat-tree - Message Model
//!
//! The closed set of overlay messages (Join, Leave, Text) and their wire
//! envelope. Dispatch to handling logic goes through
//! [`Message::handle`](message::Message::handle) and the
//! [`MessageHandler`](crate::core::MessageHandler) trait.

mod envelope;
#[allow(clippy::module_inception)]
mod message;

pub use message::*;
