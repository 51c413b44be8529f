//! Async UDP socket wrapper for peer traffic.
//!
//! One socket per peer is shared by the inbound listener (receive side) and
//! every neighbor channel (send side).

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use super::error::TransportResult;
use super::segment::Segment;

/// Cloneable handle to a peer's UDP socket.
#[derive(Debug, Clone)]
pub struct PeerSocket {
    socket: Arc<UdpSocket>,
}

impl PeerSocket {
    /// Create a socket bound to the given address.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket))
    }

    /// Wrap an existing UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
        }
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send raw bytes to `addr`.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, addr).await
    }

    /// Receive raw bytes into `buf`, returning the length and sender.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Encode and send a segment.
    pub async fn send_segment(&self, segment: &Segment, addr: SocketAddr) -> TransportResult<()> {
        self.socket.send_to(&segment.encode(), addr).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it as a segment.
    pub async fn recv_segment(&self, buf: &mut [u8]) -> TransportResult<(Segment, SocketAddr)> {
        let (len, addr) = self.socket.recv_from(buf).await?;
        let segment = Segment::decode(&buf[..len])?;
        Ok((segment, addr))
    }
}
