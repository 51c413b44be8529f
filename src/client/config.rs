//! Peer configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::client::ClientError;
use crate::core::constants::{DEFAULT_PACKET_LOSS, DEFAULT_PORT, MAX_PACKET_LOSS};
use crate::transport::DeliveryConfig;

/// Peer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Name attached to chat lines and join requests.
    pub name: String,

    /// Local address to bind.
    pub bind_addr: SocketAddr,

    /// Parent to join. `None` makes this peer the root of a new tree.
    pub parent_addr: Option<SocketAddr>,

    /// Percentage of received datagrams dropped on purpose (0 disables).
    pub packet_loss: u8,

    /// Retransmission settings for every neighbor channel.
    pub delivery: DeliveryConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: "peer".to_string(),
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            parent_addr: None,
            packet_loss: DEFAULT_PACKET_LOSS,
            delivery: DeliveryConfig::default(),
        }
    }
}

impl PeerConfig {
    /// Check the configuration for values the client cannot run with.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::InvalidConfig("name must not be empty".into()));
        }
        if self.packet_loss > MAX_PACKET_LOSS {
            return Err(ClientError::InvalidConfig(format!(
                "packet loss must be at most {MAX_PACKET_LOSS}, got {}",
                self.packet_loss
            )));
        }
        if self.delivery.ack_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "ack timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`PeerConfig`].
#[derive(Debug)]
pub struct PeerConfigBuilder {
    config: PeerConfig,
}

impl PeerConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self {
            config: PeerConfig::default(),
        }
    }

    /// Set the peer name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Bind on all interfaces at `port`.
    pub fn port(mut self, port: u16) -> Self {
        self.config.bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        self
    }

    /// Set the local bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the parent to join.
    pub fn parent_addr(mut self, addr: SocketAddr) -> Self {
        self.config.parent_addr = Some(addr);
        self
    }

    /// Set the simulated packet loss percentage.
    pub fn packet_loss(mut self, percent: u8) -> Self {
        self.config.packet_loss = percent;
        self
    }

    /// Set the acknowledgment timeout.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery.ack_timeout = timeout;
        self
    }

    /// Set the retransmission budget.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.delivery.max_retries = retries;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<PeerConfig, ClientError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PeerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
