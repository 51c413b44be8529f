//! Core traits for chat-tree.
//!
//! These traits are the seams between the protocol and the code that reacts
//! to it: message handling on the inbound path and rendering for a UI.

use crate::message::Message;

/// Handling logic for the closed set of message variants.
///
/// [`Message::handle`] routes a message to exactly one of these methods, so
/// implementors never inspect the variant themselves.
///
/// # Example
///
/// ```
/// use chat_tree::core::MessageHandler;
/// use chat_tree::message::Message;
///
/// struct Printer;
///
/// impl MessageHandler for Printer {
///     fn on_join(&self, _message: &Message, name: &str) {
///         println!("{name} joined");
///     }
///
///     fn on_leave(&self, _message: &Message) {
///         println!("someone left");
///     }
///
///     fn on_text(&self, _message: &Message, text: &str, author: &str) {
///         println!("<{author}> {text}");
///     }
/// }
///
/// Message::join("alice").handle(&Printer);
/// ```
pub trait MessageHandler {
    /// A peer asks to become a child of this peer.
    fn on_join(&self, message: &Message, name: &str);

    /// A neighbor leaves the tree.
    fn on_leave(&self, message: &Message);

    /// A chat line authored by `author`.
    fn on_text(&self, message: &Message, text: &str, author: &str);
}

/// Render callback invoked with every received text message.
pub trait MessageRenderer: Send + Sync {
    /// Present `message` to the user.
    ///
    /// Only called for text messages; `text` and `author` are extracted for
    /// convenience.
    fn render(&self, message: &Message, text: &str, author: &str);
}
