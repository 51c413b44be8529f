//! Overlay topology: one optional parent and a set of children.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::transport::{DeliveryConfig, Neighbor, PeerSocket};

/// This peer's position in the tree.
///
/// The parent is fixed at construction (absent for the root). Children are
/// keyed by address; each address has at most one channel. The child map can
/// be read and mutated concurrently from the listener and from senders.
#[derive(Debug)]
pub struct Node {
    name: String,
    socket: PeerSocket,
    delivery: DeliveryConfig,
    parent: Option<Arc<Neighbor>>,
    children: RwLock<HashMap<SocketAddr, Arc<Neighbor>>>,
}

impl Node {
    /// Create a node, opening a channel to `parent_addr` if given.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        socket: PeerSocket,
        parent_addr: Option<SocketAddr>,
        delivery: DeliveryConfig,
    ) -> Self {
        let parent = parent_addr
            .map(|addr| Arc::new(Neighbor::spawn(socket.clone(), addr, delivery)));

        Self {
            name: name.into(),
            socket,
            delivery,
            parent,
            children: RwLock::new(HashMap::new()),
        }
    }

    /// Peer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel to the parent, `None` for the root.
    pub fn parent(&self) -> Option<Arc<Neighbor>> {
        self.parent.clone()
    }

    /// Check if `addr` is the parent's address.
    pub fn is_parent(&self, addr: SocketAddr) -> bool {
        self.parent.as_ref().is_some_and(|p| p.addr() == addr)
    }

    /// Add a child channel for `addr`.
    ///
    /// Returns `false` and leaves the existing channel untouched if `addr` is
    /// already a child.
    pub fn add_child(&self, addr: SocketAddr) -> bool {
        let mut children = self.children.write();
        if children.contains_key(&addr) {
            return false;
        }

        let neighbor = Neighbor::spawn(self.socket.clone(), addr, self.delivery);
        children.insert(addr, Arc::new(neighbor));
        debug!(child = %addr, count = children.len(), "child added");
        true
    }

    /// Detach and remove the child at `addr`.
    ///
    /// Returns `false` if there was no such child.
    pub fn remove_child(&self, addr: SocketAddr) -> bool {
        let Some(neighbor) = self.children.write().remove(&addr) else {
            return false;
        };

        neighbor.detach();
        debug!(child = %addr, "child removed");
        true
    }

    /// Channel to the child at `addr`.
    pub fn child(&self, addr: SocketAddr) -> Option<Arc<Neighbor>> {
        self.children.read().get(&addr).cloned()
    }

    /// Channel to the parent or child at `addr`.
    pub fn neighbor(&self, addr: SocketAddr) -> Option<Arc<Neighbor>> {
        match &self.parent {
            Some(parent) if parent.addr() == addr => Some(parent.clone()),
            _ => self.child(addr),
        }
    }

    /// All child channels.
    pub fn children(&self) -> Vec<Arc<Neighbor>> {
        self.children.read().values().cloned().collect()
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Children plus the parent, unless it is absent or detached.
    pub fn neighbors(&self) -> Vec<Arc<Neighbor>> {
        let mut neighbors = self.children();
        neighbors.extend(self.parent.clone().filter(|p| !p.is_detached()));
        neighbors
    }

    /// Detach every channel and forget all children.
    pub fn detach_all(&self) {
        for (_, child) in self.children.write().drain() {
            child.detach();
        }
        if let Some(parent) = &self.parent {
            parent.detach();
        }
    }
}
