//! Wire envelope for [`Message`].
//!
//! Each variant serializes as a self-describing record whose root key names
//! the variant:
//!
//! ```text
//! {"Join":{"id":"…","name":"alice"}}
//! {"Leave":{"id":"…"}}
//! {"Text":{"id":"…","text":"hi","author":"bob"}}
//! ```
//!
//! The sender address is not part of the envelope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, MessageBody};

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) enum Envelope {
    Join { id: Uuid, name: String },
    Leave { id: Uuid },
    Text { id: Uuid, text: String, author: String },
}

impl From<&Message> for Envelope {
    fn from(message: &Message) -> Self {
        let id = message.id();
        match message.body() {
            MessageBody::Join { name } => Self::Join {
                id,
                name: name.clone(),
            },
            MessageBody::Leave => Self::Leave { id },
            MessageBody::Text { text, author } => Self::Text {
                id,
                text: text.clone(),
                author: author.clone(),
            },
        }
    }
}

impl From<Envelope> for Message {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::Join { id, name } => Message::with_id(id, MessageBody::Join { name }),
            Envelope::Leave { id } => Message::with_id(id, MessageBody::Leave),
            Envelope::Text { id, text, author } => {
                Message::with_id(id, MessageBody::Text { text, author })
            }
        }
    }
}
