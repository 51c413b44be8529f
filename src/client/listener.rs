//! Inbound listener: receives segments and dispatches them.
//!
//! One listener task runs per peer. Acknowledgments are routed to the
//! matching neighbor channel; data segments are acknowledged, decoded and
//! handed to the peer's message handler. No per-datagram failure stops the
//! loop; only a shutdown signal (or the peer going away) does.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::client::Inner;
use super::node::Node;
use crate::core::constants::{DEFAULT_RECV_BUFFER_SIZE, MAX_PACKET_LOSS};
use crate::message::Message;
use crate::transport::{PeerSocket, Segment, SegmentType, TransportResult};

/// Simulated packet loss.
///
/// Drops each received datagram with the configured probability (percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketLoss(u8);

impl PacketLoss {
    /// Never drop anything.
    pub const NONE: Self = Self(0);

    /// Drop `percent` out of every hundred datagrams, on average.
    pub fn new(percent: u8) -> Self {
        Self(percent.min(MAX_PACKET_LOSS))
    }

    /// Configured percentage.
    pub fn percent(self) -> u8 {
        self.0
    }

    /// Decide whether the next datagram is lost.
    pub fn is_lost(self) -> bool {
        match self.0 {
            0 => false,
            MAX_PACKET_LOSS => true,
            percent => rand::thread_rng().gen_range(0..MAX_PACKET_LOSS) < percent,
        }
    }
}

/// Last delivered sequence number per neighbor, for duplicate suppression.
///
/// Only current neighbors are tracked; entries for peers that have left the
/// tree are pruned.
#[derive(Debug, Default)]
struct DeliveredLog {
    last: HashMap<SocketAddr, u32>,
}

impl DeliveredLog {
    fn is_duplicate(&self, from: SocketAddr, seq: u32) -> bool {
        self.last.get(&from) == Some(&seq)
    }

    /// Record `seq` from `from` after it has been handled.
    fn record(&mut self, node: &Node, from: SocketAddr, seq: u32) {
        if node.neighbor(from).is_some() {
            self.last.insert(from, seq);
        } else {
            self.last.remove(&from);
        }

        if self.last.len() > node.child_count() + 1 {
            self.last.retain(|addr, _| node.neighbor(*addr).is_some());
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.last.len()
    }
}

enum Wake {
    Shutdown,
    Signal,
    Datagram(TransportResult<(Segment, SocketAddr)>),
}

pub(super) struct InboundListener {
    socket: PeerSocket,
    peer: Weak<Inner>,
    loss: PacketLoss,
    shutdown: watch::Receiver<bool>,
    delivered: DeliveredLog,
}

impl InboundListener {
    pub(super) fn new(
        socket: PeerSocket,
        peer: Weak<Inner>,
        loss: PacketLoss,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            socket,
            peer,
            loss,
            shutdown,
            delivered: DeliveredLog::default(),
        }
    }

    pub(super) async fn run(mut self) {
        let mut buf = vec![0u8; DEFAULT_RECV_BUFFER_SIZE];

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let wake = tokio::select! {
                biased;
                changed = self.shutdown.changed() => match changed {
                    Ok(()) => Wake::Signal,
                    Err(_) => Wake::Shutdown,
                },
                received = self.socket.recv_segment(&mut buf) => Wake::Datagram(received),
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Signal => continue,
                Wake::Datagram(Ok((segment, from))) => {
                    if !self.on_segment(segment, from).await {
                        break;
                    }
                }
                Wake::Datagram(Err(e)) if e.is_silent_drop() => {
                    debug!(error = %e, "dropping datagram");
                }
                Wake::Datagram(Err(e)) => warn!(error = %e, "receive failed"),
            }
        }

        debug!("inbound listener stopped");
    }

    /// Returns `false` once the peer no longer exists.
    async fn on_segment(&mut self, segment: Segment, from: SocketAddr) -> bool {
        if self.loss.is_lost() {
            trace!(peer = %from, seq = segment.seq, "simulated packet loss");
            return true;
        }

        let Some(peer) = self.peer.upgrade() else {
            return false;
        };

        match segment.segment_type() {
            SegmentType::Ack if segment.payload.is_empty() => {
                match peer.node().neighbor(from) {
                    Some(neighbor) => neighbor.acknowledge(segment.ack),
                    None => trace!(peer = %from, ack = segment.ack, "acknowledgment from unknown peer"),
                }
            }
            SegmentType::Ack => self.on_data(&peer, segment, from).await,
            other => debug!(peer = %from, segment_type = ?other, "ignoring control segment"),
        }
        true
    }

    /// Handles a data segment, then acknowledges it.
    ///
    /// Duplicates are acknowledged again but not handed on.
    async fn on_data(&mut self, peer: &Arc<Inner>, segment: Segment, from: SocketAddr) {
        let seq = segment.seq;

        if self.delivered.is_duplicate(from, seq) {
            trace!(peer = %from, seq, "duplicate segment");
        } else {
            match Message::decode(&segment.payload) {
                Ok(mut message) => {
                    message.set_sender(from);
                    trace!(peer = %from, kind = %message.kind(), id = %message.id(), "received");
                    message.handle(peer.as_ref());
                }
                Err(e) => warn!(peer = %from, error = %e, "dropping undecodable message"),
            }
            self.delivered.record(peer.node(), from, seq);
        }

        if let Err(e) = self.socket.send_segment(&Segment::ack(seq), from).await {
            warn!(peer = %from, seq, error = %e, "failed to acknowledge");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DeliveryConfig;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn node(parent: Option<SocketAddr>) -> Node {
        let socket = PeerSocket::bind(addr(0)).await.unwrap();
        Node::new("n", socket, parent, DeliveryConfig::default())
    }

    #[tokio::test]
    async fn test_delivered_log_tracks_neighbors_only() {
        let node = node(Some(addr(6000))).await;
        node.add_child(addr(5001));
        let mut log = DeliveredLog::default();

        log.record(&node, addr(5001), 7);
        log.record(&node, addr(6000), 3);
        log.record(&node, addr(9999), 1);

        assert!(log.is_duplicate(addr(5001), 7));
        assert!(!log.is_duplicate(addr(5001), 8));
        assert!(log.is_duplicate(addr(6000), 3));
        assert!(!log.is_duplicate(addr(9999), 1));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_delivered_log_prunes_removed_children() {
        let node = node(None).await;
        let mut log = DeliveredLog::default();
        for port in 5001..5005 {
            node.add_child(addr(port));
            log.record(&node, addr(port), 1);
        }
        assert_eq!(log.len(), 4);

        // A Leave is recorded after the child has been removed.
        node.remove_child(addr(5001));
        log.record(&node, addr(5001), 2);
        assert_eq!(log.len(), 3);

        // Children removed elsewhere are pruned on the next record.
        node.remove_child(addr(5002));
        node.remove_child(addr(5003));
        log.record(&node, addr(5004), 2);
        assert_eq!(log.len(), 1);
        assert!(log.is_duplicate(addr(5004), 2));
    }

    #[test]
    fn test_packet_loss_bounds() {
        assert!(!PacketLoss::NONE.is_lost());
        assert!((0..1000).all(|_| !PacketLoss::new(0).is_lost()));
        assert!((0..1000).all(|_| PacketLoss::new(100).is_lost()));
        assert_eq!(PacketLoss::new(250).percent(), MAX_PACKET_LOSS);
    }

    #[test]
    fn test_packet_loss_is_partial() {
        let loss = PacketLoss::new(50);
        let lost = (0..2000).filter(|_| loss.is_lost()).count();
        assert!(lost > 500 && lost < 1500, "lost {lost} of 2000");
    }
}
