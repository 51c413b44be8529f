//! Publish/subscribe registry.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// An event that can be published through an [`EventDispatcher`].
///
/// Listeners subscribe to a key; publishing an event reaches every listener
/// subscribed to its key. Simple events can act as their own key.
pub trait Event {
    /// Subscription key.
    type Key: Eq + Hash;

    /// Key this event is published under.
    fn key(&self) -> Self::Key;
}

/// Receives published events.
pub trait EventListener<E> {
    /// React to `event`.
    fn act(&self, event: &E);
}

/// Maps event keys to listener sets.
///
/// A listener appears at most once per key. A key whose last listener is
/// removed is pruned immediately.
///
/// `publish` takes `&self` while the subscription methods take `&mut self`,
/// so a listener cannot change subscriptions while it is being invoked.
/// Share a dispatcher across threads by wrapping it in a lock.
///
/// # Example
///
/// ```
/// use chat_tree::event::{Event, EventDispatcher, EventListener};
///
/// #[derive(PartialEq, Eq, Hash)]
/// struct Refresh;
///
/// impl Event for Refresh {
///     type Key = Refresh;
///     fn key(&self) -> Refresh {
///         Refresh
///     }
/// }
///
/// #[derive(PartialEq, Eq, Hash)]
/// struct Panel(&'static str);
///
/// impl EventListener<Refresh> for Panel {
///     fn act(&self, _event: &Refresh) {
///         println!("redrawing {}", self.0);
///     }
/// }
///
/// let mut dispatcher = EventDispatcher::<Refresh, Panel>::new();
/// dispatcher.subscribe(Refresh, Panel("sidebar"));
/// dispatcher.subscribe(Refresh, Panel("sidebar"));
/// assert_eq!(dispatcher.publish(&Refresh), 1);
/// ```
pub struct EventDispatcher<E: Event, L> {
    records: HashMap<E::Key, HashSet<L>>,
}

impl<E, L> EventDispatcher<E, L>
where
    E: Event,
    L: EventListener<E> + Eq + Hash,
{
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Subscribe `listener` to `key`.
    ///
    /// Returns `false` if the pair was already registered.
    pub fn subscribe(&mut self, key: E::Key, listener: L) -> bool {
        self.records.entry(key).or_default().insert(listener)
    }

    /// Unsubscribe `listener` from `key`.
    ///
    /// Returns `false` if the pair was not registered.
    pub fn unsubscribe(&mut self, key: &E::Key, listener: &L) -> bool {
        let Some(listeners) = self.records.get_mut(key) else {
            return false;
        };

        let removed = listeners.remove(listener);
        if listeners.is_empty() {
            self.records.remove(key);
        }
        removed
    }

    /// Invoke every listener subscribed to the event's key.
    ///
    /// Listeners run synchronously in unspecified order. Returns how many
    /// listeners were invoked.
    pub fn publish(&self, event: &E) -> usize {
        let Some(listeners) = self.records.get(&event.key()) else {
            return 0;
        };

        for listener in listeners {
            listener.act(event);
        }
        listeners.len()
    }

    /// Number of listeners subscribed to `key`.
    pub fn listener_count(&self, key: &E::Key) -> usize {
        self.records.get(key).map_or(0, HashSet::len)
    }

    /// Check if `key` has any listeners.
    pub fn is_registered(&self, key: &E::Key) -> bool {
        self.records.contains_key(key)
    }

    /// Number of keys with at least one listener.
    pub fn event_count(&self) -> usize {
        self.records.len()
    }
}

impl<E, L> Default for EventDispatcher<E, L>
where
    E: Event,
    L: EventListener<E> + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Signal {
        Refresh,
        Close,
    }

    impl Event for Signal {
        type Key = Signal;

        fn key(&self) -> Signal {
            *self
        }
    }

    #[derive(Clone)]
    struct Counting {
        id: u32,
        calls: Arc<AtomicUsize>,
    }

    impl Counting {
        fn new(id: u32) -> Self {
            Self {
                id,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PartialEq for Counting {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Eq for Counting {}

    impl Hash for Counting {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl EventListener<Signal> for Counting {
        fn act(&self, _event: &Signal) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let mut dispatcher = EventDispatcher::<Signal, Counting>::new();
        let l1 = Counting::new(1);
        let l2 = Counting::new(2);

        dispatcher.subscribe(Signal::Refresh, l1.clone());
        dispatcher.subscribe(Signal::Refresh, l2.clone());

        assert_eq!(dispatcher.publish(&Signal::Refresh), 2);
        assert_eq!(l1.calls(), 1);
        assert_eq!(l2.calls(), 1);

        assert!(dispatcher.unsubscribe(&Signal::Refresh, &l1));
        dispatcher.publish(&Signal::Refresh);
        assert_eq!(l1.calls(), 1);
        assert_eq!(l2.calls(), 2);
    }

    #[test]
    fn test_duplicate_subscription_is_noop() {
        let mut dispatcher = EventDispatcher::<Signal, Counting>::new();
        let l1 = Counting::new(1);

        assert!(dispatcher.subscribe(Signal::Close, l1.clone()));
        assert!(!dispatcher.subscribe(Signal::Close, l1.clone()));
        assert_eq!(dispatcher.listener_count(&Signal::Close), 1);

        dispatcher.publish(&Signal::Close);
        assert_eq!(l1.calls(), 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let mut dispatcher = EventDispatcher::<Signal, Counting>::new();
        let l1 = Counting::new(1);
        dispatcher.subscribe(Signal::Refresh, l1.clone());

        assert_eq!(dispatcher.publish(&Signal::Close), 0);
        assert!(!dispatcher.is_registered(&Signal::Close));
        assert_eq!(dispatcher.event_count(), 1);
        assert_eq!(l1.calls(), 0);
    }

    #[test]
    fn test_empty_key_is_pruned() {
        let mut dispatcher = EventDispatcher::<Signal, Counting>::new();
        let l1 = Counting::new(1);
        let l2 = Counting::new(2);

        dispatcher.subscribe(Signal::Refresh, l1.clone());
        dispatcher.subscribe(Signal::Refresh, l2.clone());
        dispatcher.unsubscribe(&Signal::Refresh, &l1);
        assert!(dispatcher.is_registered(&Signal::Refresh));

        dispatcher.unsubscribe(&Signal::Refresh, &l2);
        assert!(!dispatcher.is_registered(&Signal::Refresh));
        assert_eq!(dispatcher.event_count(), 0);
    }

    #[test]
    fn test_unsubscribe_unknown() {
        let mut dispatcher = EventDispatcher::<Signal, Counting>::new();
        let l1 = Counting::new(1);

        assert!(!dispatcher.unsubscribe(&Signal::Refresh, &l1));
        assert_eq!(dispatcher.event_count(), 0);

        dispatcher.subscribe(Signal::Refresh, l1.clone());
        assert!(!dispatcher.unsubscribe(&Signal::Refresh, &Counting::new(9)));
        assert_eq!(dispatcher.listener_count(&Signal::Refresh), 1);
    }
}
