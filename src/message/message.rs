//! Typed overlay messages.

use std::fmt;
use std::net::SocketAddr;

use uuid::Uuid;

use super::envelope::Envelope;
use crate::core::{DecodeError, EncodeError, MessageHandler};

/// Variant-specific message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Request to become a child of the receiving peer.
    Join {
        /// Name of the joining peer.
        name: String,
    },
    /// Notification that the sending neighbor leaves the tree.
    Leave,
    /// A chat line.
    Text {
        /// Message body.
        text: String,
        /// Name of the peer that authored the line.
        author: String,
    },
}

/// Discriminant of [`MessageBody`], used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// [`MessageBody::Join`].
    Join,
    /// [`MessageBody::Leave`].
    Leave,
    /// [`MessageBody::Text`].
    Text,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join => "Join",
            Self::Leave => "Leave",
            Self::Text => "Text",
        };
        f.write_str(name)
    }
}

/// A message exchanged between neighbors.
///
/// The identity is fixed at creation. The sender address is filled in by the
/// inbound listener when the message is received and is never part of the
/// wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: Uuid,
    body: MessageBody,
    sender: Option<SocketAddr>,
}

impl Message {
    /// Create a message with a fresh identity.
    pub fn new(body: MessageBody) -> Self {
        Self::with_id(Uuid::new_v4(), body)
    }

    /// Create a message with a known identity.
    pub fn with_id(id: Uuid, body: MessageBody) -> Self {
        Self {
            id,
            body,
            sender: None,
        }
    }

    /// Create a join request for a peer called `name`.
    pub fn join(name: impl Into<String>) -> Self {
        Self::new(MessageBody::Join { name: name.into() })
    }

    /// Create a leave notification.
    pub fn leave() -> Self {
        Self::new(MessageBody::Leave)
    }

    /// Create a chat line.
    pub fn text(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self::new(MessageBody::Text {
            text: text.into(),
            author: author.into(),
        })
    }

    /// Globally unique identity.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Variant-specific content.
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Which variant this message is.
    pub fn kind(&self) -> MessageKind {
        match self.body {
            MessageBody::Join { .. } => MessageKind::Join,
            MessageBody::Leave => MessageKind::Leave,
            MessageBody::Text { .. } => MessageKind::Text,
        }
    }

    /// Address of the neighbor this message was received from.
    ///
    /// `None` for locally created messages.
    pub fn sender(&self) -> Option<SocketAddr> {
        self.sender
    }

    /// Record the address this message was received from.
    pub fn set_sender(&mut self, sender: SocketAddr) {
        self.sender = Some(sender);
    }

    /// Builder-style variant of [`Message::set_sender`].
    pub fn with_sender(mut self, sender: SocketAddr) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Route this message to the matching handler method.
    pub fn handle<H: MessageHandler + ?Sized>(&self, handler: &H) {
        match &self.body {
            MessageBody::Join { name } => handler.on_join(self, name),
            MessageBody::Leave => handler.on_leave(self),
            MessageBody::Text { text, author } => handler.on_text(self, text, author),
        }
    }

    /// Encode to the wire envelope.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(&Envelope::from(self)).map_err(|e| EncodeError(e.to_string()))
    }

    /// Decode from the wire envelope.
    ///
    /// The decoded message has no sender.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| DecodeError::InvalidEnvelope(e.to_string()))?;
        Ok(envelope.into())
    }
}
