//! Peer client: membership state machine and send operations.
//!
//! A [`Client`] owns the peer's socket, its [`Node`] (parent and children),
//! the inbound listener task and the set of renderers. Started without a
//! parent it is the root of a new tree and runs immediately; started with a
//! parent it first has to get its Join acknowledged.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::config::PeerConfig;
use super::listener::{InboundListener, PacketLoss};
use super::node::Node;
use crate::core::{ChatError, DeliveryError, MessageHandler, MessageRenderer};
use crate::event::{EventListener, UiEvent};
use crate::message::Message;
use crate::transport::{Delivery, PeerSocket};

/// Errors that can occur in the peer client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation requires the Running state.
    #[error("peer is not running (state: {0})")]
    NotRunning(PeerState),

    /// The parent never acknowledged the join request.
    #[error("failed to join parent {parent}")]
    JoinFailed {
        /// Parent address.
        parent: SocketAddr,
    },
}

impl From<ClientError> for ChatError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Io(e) => ChatError::Io(e),
            ClientError::InvalidConfig(reason) => ChatError::Config(reason),
            other => ChatError::Membership(other.to_string()),
        }
    }
}

/// Membership lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    /// Waiting for the parent to acknowledge the join request.
    Joining,
    /// Member of the tree.
    Running,
    /// Leaving the tree.
    Shutting,
    /// Parent left; waiting for a new position in the tree.
    Moving,
    /// No longer participating.
    Terminated,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Joining => "joining",
            Self::Running => "running",
            Self::Shutting => "shutting",
            Self::Moving => "moving",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

struct Shared {
    state: PeerState,
    renderers: Vec<Arc<dyn MessageRenderer>>,
}

pub(super) struct Inner {
    /// Handle to this allocation, captured by send continuations.
    me: Weak<Inner>,
    node: Node,
    local_addr: SocketAddr,
    /// State and renderers, guarded together.
    shared: Mutex<Shared>,
    state_tx: watch::Sender<PeerState>,
    shutdown: watch::Sender<bool>,
}

impl Inner {
    pub(super) fn node(&self) -> &Node {
        &self.node
    }

    fn state(&self) -> PeerState {
        self.shared.lock().state
    }

    fn set_state(&self, state: PeerState) {
        let mut shared = self.shared.lock();
        if shared.state != state {
            info!(from = %shared.state, to = %state, "state changed");
            shared.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// Move from `from` to `to`; does nothing if the current state is not `from`.
    fn transition(&self, from: PeerState, to: PeerState) -> bool {
        let mut shared = self.shared.lock();
        if shared.state != from {
            return false;
        }
        info!(from = %from, to = %to, "state changed");
        shared.state = to;
        self.state_tx.send_replace(to);
        true
    }

    fn stop_listener(&self) {
        self.shutdown.send_replace(true);
    }

    fn join_parent(self: &Arc<Self>) {
        let Some(parent) = self.node.parent() else {
            return;
        };

        let on_success = {
            let peer = Arc::downgrade(self);
            move || {
                if let Some(peer) = peer.upgrade() {
                    peer.transition(PeerState::Joining, PeerState::Running);
                }
            }
        };
        let on_error = {
            let peer = Arc::downgrade(self);
            move |e: DeliveryError| {
                if let Some(peer) = peer.upgrade() {
                    peer.on_join_failed(e);
                }
            }
        };

        info!(parent = %parent.addr(), "joining parent");
        parent.send_with(&Message::join(self.node.name()), on_success, on_error);
    }

    fn on_join_failed(&self, e: DeliveryError) {
        let parent = self.node.parent();
        error!(
            parent = ?parent.as_ref().map(|p| p.addr()),
            error = %e,
            "failed to connect to parent"
        );

        self.set_state(PeerState::Terminated);
        self.stop_listener();
        if let Some(parent) = parent {
            parent.detach();
        }
    }

    /// Sends to every neighbor but the sender. A neighbor that never
    /// acknowledges is dropped from the tree.
    fn broadcast(&self, message: &Message) -> Vec<Delivery> {
        let sender = message.sender();
        self.node
            .neighbors()
            .into_iter()
            .filter(|n| Some(n.addr()) != sender)
            .map(|n| {
                let peer = self.me.clone();
                let addr = n.addr();
                n.send_inspect(message, move |e| {
                    if let Some(peer) = peer.upgrade() {
                        peer.on_send_failed(addr, e);
                    }
                })
            })
            .collect()
    }

    fn on_send_failed(&self, addr: SocketAddr, e: &DeliveryError) {
        if !matches!(e, DeliveryError::RetriesExhausted { .. }) {
            return;
        }

        if self.node.is_parent(addr) {
            warn!(parent = %addr, error = %e, "parent unreachable");
            self.lose_parent();
        } else if self.node.remove_child(addr) {
            warn!(child = %addr, error = %e, "child unreachable, removed");
        }
    }

    /// Detach the parent channel and stop taking part until reparented.
    fn lose_parent(&self) {
        if let Some(parent) = self.node.parent() {
            parent.detach();
        }
        self.begin_moving();
    }

    fn begin_moving(&self) -> bool {
        let moved = self.transition(PeerState::Running, PeerState::Moving);
        if moved {
            warn!("parent left; reparenting is not supported, staying detached from the tree");
        }
        moved
    }

    fn render(&self, message: &Message, text: &str, author: &str) {
        let renderers = self.shared.lock().renderers.clone();
        for renderer in renderers {
            renderer.render(message, text, author);
        }
    }
}

impl MessageHandler for Inner {
    fn on_join(&self, message: &Message, name: &str) {
        let Some(sender) = message.sender() else {
            return;
        };

        if self.node.add_child(sender) {
            info!(child = %sender, name, "peer joined");
        } else {
            debug!(child = %sender, name, "repeated join from existing child");
        }
    }

    fn on_leave(&self, message: &Message) {
        let Some(sender) = message.sender() else {
            return;
        };

        if self.node.is_parent(sender) {
            info!(parent = %sender, "parent left");
            self.lose_parent();
        } else if self.node.remove_child(sender) {
            info!(child = %sender, "child left");
        }
    }

    fn on_text(&self, message: &Message, text: &str, author: &str) {
        self.render(message, text, author);
        // Relays complete in the background; unreachable neighbors are
        // removed by the broadcast itself.
        drop(self.broadcast(message));
    }
}

/// A peer in the overlay tree.
///
/// Cheap to clone; all clones refer to the same peer.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Bind the socket, start the inbound listener and, if a parent is
    /// configured, send the join request.
    ///
    /// Returns as soon as the peer is started; use [`Client::joined`] to wait
    /// for the join outcome.
    pub async fn start(config: PeerConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let socket = PeerSocket::bind(config.bind_addr).await?;
        let local_addr = socket.local_addr()?;

        let node = Node::new(
            config.name.clone(),
            socket.clone(),
            config.parent_addr,
            config.delivery,
        );
        let initial = if node.parent().is_some() {
            PeerState::Joining
        } else {
            PeerState::Running
        };

        let (state_tx, _) = watch::channel(initial);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            node,
            local_addr,
            shared: Mutex::new(Shared {
                state: initial,
                renderers: Vec::new(),
            }),
            state_tx,
            shutdown,
        });

        let listener = InboundListener::new(
            socket,
            Arc::downgrade(&inner),
            PacketLoss::new(config.packet_loss),
            shutdown_rx,
        );
        tokio::spawn(listener.run());

        info!(name = %config.name, addr = %local_addr, state = %initial, "peer started");
        if initial == PeerState::Joining {
            inner.join_parent();
        }

        Ok(Self { inner })
    }

    /// Current state.
    pub fn state(&self) -> PeerState {
        self.inner.state()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<PeerState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the join request has been answered.
    ///
    /// Returns immediately for a root peer.
    pub async fn joined(&self) -> Result<(), ClientError> {
        let mut states = self.subscribe_state();
        let state = match states.wait_for(|s| *s != PeerState::Joining).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };

        match (state, self.inner.node.parent()) {
            (PeerState::Terminated, Some(parent)) => Err(ClientError::JoinFailed {
                parent: parent.addr(),
            }),
            _ => Ok(()),
        }
    }

    /// Local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Peer name.
    pub fn name(&self) -> &str {
        self.inner.node.name()
    }

    /// Topology of this peer.
    pub fn node(&self) -> &Node {
        &self.inner.node
    }

    /// Register a renderer. Returns `false` if it was already registered.
    pub fn add_renderer(&self, renderer: Arc<dyn MessageRenderer>) -> bool {
        let mut shared = self.inner.shared.lock();
        if shared.renderers.iter().any(|r| Arc::ptr_eq(r, &renderer)) {
            return false;
        }
        shared.renderers.push(renderer);
        true
    }

    /// Unregister a renderer. Returns `false` if it was not registered.
    pub fn remove_renderer(&self, renderer: &Arc<dyn MessageRenderer>) -> bool {
        let mut shared = self.inner.shared.lock();
        let before = shared.renderers.len();
        shared.renderers.retain(|r| !Arc::ptr_eq(r, renderer));
        shared.renderers.len() != before
    }

    /// Send `message` to every neighbor except the one it was received from.
    ///
    /// A child that exhausts its retries is removed; a parent that does is
    /// detached and the peer moves to [`PeerState::Moving`].
    pub fn broadcast(&self, message: &Message) -> Vec<Delivery> {
        self.inner.broadcast(message)
    }

    /// Send `message` to the child at `receiver`.
    ///
    /// Returns `None` without sending anything if there is no such child.
    /// The parent is reached through [`Client::broadcast`] only.
    pub fn send_to(&self, message: &Message, receiver: SocketAddr) -> Option<Delivery> {
        self.inner
            .node
            .child(receiver)
            .map(|child| child.send(message))
    }

    /// Send `message` to the child at `receiver` with continuations.
    ///
    /// If there is no such child nothing is sent and neither continuation
    /// runs.
    pub fn send_to_with<S, E>(&self, message: &Message, receiver: SocketAddr, on_success: S, on_error: E)
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(DeliveryError) + Send + 'static,
    {
        if let Some(child) = self.inner.node.child(receiver) {
            child.send_with(message, on_success, on_error);
        }
    }

    /// Broadcast a line typed by the local user.
    ///
    /// Dropped unless the peer is running. Returns whether it was sent.
    pub fn on_text_entered(&self, text: &str) -> bool {
        let state = self.state();
        if state != PeerState::Running {
            debug!(state = %state, "dropping input while not running");
            return false;
        }

        drop(self.broadcast(&Message::text(text, self.name())));
        true
    }

    /// Leave the tree: notify every neighbor, then stop.
    pub async fn leave(&self) -> Result<(), ClientError> {
        if !self
            .inner
            .transition(PeerState::Running, PeerState::Shutting)
        {
            return Err(ClientError::NotRunning(self.state()));
        }

        for delivery in self.broadcast(&Message::leave()) {
            if let Err(e) = delivery.await {
                debug!(error = %e, "leave notification not acknowledged");
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Move from Running to Moving.
    ///
    /// Only the state change is implemented; no reparenting protocol runs.
    pub fn begin_moving(&self) -> bool {
        self.inner.begin_moving()
    }

    /// Stop immediately without notifying neighbors.
    pub fn shutdown(&self) {
        self.inner.stop_listener();
        self.inner.node.detach_all();
        self.inner.set_state(PeerState::Terminated);
    }
}

impl EventListener<UiEvent> for Client {
    fn act(&self, event: &UiEvent) {
        match event {
            UiEvent::TextEntered(text) => {
                self.on_text_entered(text);
            }
        }
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Client {}

impl Hash for Client {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name())
            .field("addr", &self.inner.local_addr)
            .field("state", &self.state())
            .finish()
    }
}
