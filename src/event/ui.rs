//! Events originating from a user interface.

use super::dispatcher::Event;

/// Subscription key for [`UiEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiEventKind {
    /// [`UiEvent::TextEntered`].
    TextEntered,
}

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The user entered a line of text.
    TextEntered(String),
}

impl Event for UiEvent {
    type Key = UiEventKind;

    fn key(&self) -> UiEventKind {
        match self {
            UiEvent::TextEntered(_) => UiEventKind::TextEntered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_entered_key() {
        let event = UiEvent::TextEntered("hi".into());
        assert_eq!(event.key(), UiEventKind::TextEntered);
    }
}
