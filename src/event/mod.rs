//! chat-tree - Events
//!
//! A generic publish/subscribe registry that decouples state changes from
//! presentation, plus the UI-originated events a [`Client`](crate::client::Client)
//! listens to.

mod dispatcher;
mod ui;

pub use dispatcher::*;
pub use ui::*;
