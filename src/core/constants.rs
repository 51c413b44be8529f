//! Protocol constants.
//!
//! Values that appear on the wire MUST NOT be changed; timing values are
//! defaults and can be overridden through configuration.

use std::time::Duration;

// =============================================================================
// SEGMENT HEADER
// =============================================================================

/// Sequence number field size (32-bit BE).
pub const SEQUENCE_NUMBER_SIZE: usize = 4;

/// Acknowledgment number field size (32-bit BE).
pub const ACK_NUMBER_SIZE: usize = 4;

/// Flag byte size.
pub const FLAGS_SIZE: usize = 1;

/// Fixed segment header size (seq + ack + flags).
pub const SEGMENT_HEADER_SIZE: usize = SEQUENCE_NUMBER_SIZE + ACK_NUMBER_SIZE + FLAGS_SIZE;

// =============================================================================
// SEGMENT FLAGS
// =============================================================================

/// Sender has finished with the channel.
pub const FLAG_FIN: u8 = 0x01;

/// Synchronize sequence numbers.
pub const FLAG_SYN: u8 = 0x02;

/// Acknowledgment number is significant.
pub const FLAG_ACK: u8 = 0x10;

// =============================================================================
// DELIVERY TIMING
// =============================================================================

/// Time to wait for an acknowledgment before retransmitting.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// Retransmissions allowed after the first attempt before a send fails.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

// =============================================================================
// PEER
// =============================================================================

/// Receive buffer size, large enough for any UDP datagram.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// Default simulated packet loss (percent). Zero disables the simulation.
pub const DEFAULT_PACKET_LOSS: u8 = 0;

/// Upper bound for the simulated packet loss percentage.
pub const MAX_PACKET_LOSS: u8 = 100;

/// Default local bind port.
pub const DEFAULT_PORT: u16 = 20000;
