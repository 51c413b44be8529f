//! Segment encoding and decoding.
//!
//! Every datagram exchanged by neighbor channels is a segment: a fixed
//! header followed by an opaque payload.
//!
//! Wire format (9-byte header):
//! ```text
//! +------------------+--------------------+--------+-----------------+
//! | Sequence Number  | Ack Number         | Flags  | Payload         |
//! | 4 bytes (BE32)   | 4 bytes (BE32)     | 1 byte | remaining bytes |
//! +------------------+--------------------+--------+-----------------+
//! ```
//!
//! A data segment carries the ACK flag, the sender's sequence number and a
//! non-empty payload. A pure acknowledgment is an ACK segment with an empty
//! payload whose ack number names the sequence number being acknowledged.

use crate::core::constants::{FLAG_ACK, FLAG_FIN, FLAG_SYN, SEGMENT_HEADER_SIZE};
use crate::core::MalformedSegmentError;

/// Segment type, derived from the flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// Synchronize.
    Syn,
    /// Acknowledgment or data.
    Ack,
    /// Finish.
    Fin,
    /// Synchronize with acknowledgment.
    SynAck,
}

/// Segment flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentFlags(u8);

impl SegmentFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// FIN only.
    pub const FIN: Self = Self(FLAG_FIN);
    /// SYN only.
    pub const SYN: Self = Self(FLAG_SYN);
    /// ACK only.
    pub const ACK: Self = Self(FLAG_ACK);

    /// Create flags from a raw byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value.
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if FIN is set.
    pub fn has_fin(self) -> bool {
        self.0 & FLAG_FIN != 0
    }

    /// Check if SYN is set.
    pub fn has_syn(self) -> bool {
        self.0 & FLAG_SYN != 0
    }

    /// Check if ACK is set.
    pub fn has_ack(self) -> bool {
        self.0 & FLAG_ACK != 0
    }

    /// Set FIN.
    pub fn with_fin(self) -> Self {
        Self(self.0 | FLAG_FIN)
    }

    /// Set SYN.
    pub fn with_syn(self) -> Self {
        Self(self.0 | FLAG_SYN)
    }

    /// Set ACK.
    pub fn with_ack(self) -> Self {
        Self(self.0 | FLAG_ACK)
    }

    /// Derive the segment type.
    ///
    /// FIN wins over everything else; SYN with ACK is SYNACK; SYN alone is
    /// SYN; anything else is ACK.
    pub fn segment_type(self) -> SegmentType {
        if self.has_fin() {
            SegmentType::Fin
        } else if self.has_syn() {
            if self.has_ack() {
                SegmentType::SynAck
            } else {
                SegmentType::Syn
            }
        } else {
            SegmentType::Ack
        }
    }
}

/// A decoded segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Sender's sequence number.
    pub seq: u32,
    /// Acknowledged sequence number.
    pub ack: u32,
    /// Control flags.
    pub flags: SegmentFlags,
    /// Opaque payload (empty for pure control segments).
    pub payload: Vec<u8>,
}

impl Segment {
    /// Create a segment.
    pub fn new(seq: u32, ack: u32, flags: SegmentFlags, payload: Vec<u8>) -> Self {
        Self {
            seq,
            ack,
            flags,
            payload,
        }
    }

    /// Create a data segment carrying `payload`.
    pub fn data(seq: u32, payload: Vec<u8>) -> Self {
        Self::new(seq, 0, SegmentFlags::ACK, payload)
    }

    /// Create a pure acknowledgment for sequence number `ack`.
    pub fn ack(ack: u32) -> Self {
        Self::new(0, ack, SegmentFlags::ACK, Vec::new())
    }

    /// Segment type derived from the flags.
    pub fn segment_type(&self) -> SegmentType {
        self.flags.segment_type()
    }

    /// Check if this segment carries data.
    pub fn is_data(&self) -> bool {
        self.segment_type() == SegmentType::Ack && !self.payload.is_empty()
    }

    /// Check if this segment is a pure acknowledgment.
    pub fn is_pure_ack(&self) -> bool {
        self.segment_type() == SegmentType::Ack && self.payload.is_empty()
    }

    /// Total wire size.
    pub fn wire_size(&self) -> usize {
        SEGMENT_HEADER_SIZE + self.payload.len()
    }

    /// Encode to wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_size());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.ack.to_be_bytes());
        buf.push(self.flags.as_byte());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode from wire format.
    ///
    /// Everything after the header is payload.
    pub fn decode(data: &[u8]) -> Result<Self, MalformedSegmentError> {
        if data.len() < SEGMENT_HEADER_SIZE {
            return Err(MalformedSegmentError {
                expected: SEGMENT_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let seq = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let ack = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let flags = SegmentFlags::from_byte(data[8]);

        Ok(Self {
            seq,
            ack,
            flags,
            payload: data[SEGMENT_HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_type(flags: SegmentFlags) -> SegmentType {
        let bytes = Segment::new(1, 2, flags, vec![]).encode();
        Segment::decode(&bytes).unwrap().segment_type()
    }

    #[test]
    fn test_flag_precedence() {
        let all = SegmentFlags::NONE.with_fin().with_syn().with_ack();
        assert_eq!(decode_type(all), SegmentType::Fin);
        assert_eq!(decode_type(SegmentFlags::FIN), SegmentType::Fin);
        assert_eq!(decode_type(SegmentFlags::SYN.with_ack()), SegmentType::SynAck);
        assert_eq!(decode_type(SegmentFlags::SYN), SegmentType::Syn);
        assert_eq!(decode_type(SegmentFlags::ACK), SegmentType::Ack);
        assert_eq!(decode_type(SegmentFlags::NONE), SegmentType::Ack);
    }

    #[test]
    fn test_fin_ignores_other_flags() {
        assert_eq!(SegmentFlags::FIN.with_syn().segment_type(), SegmentType::Fin);
        assert_eq!(SegmentFlags::FIN.with_ack().segment_type(), SegmentType::Fin);
    }

    #[test]
    fn test_header_layout() {
        let segment = Segment::new(0x01020304, 0x0a0b0c0d, SegmentFlags::ACK, vec![0xff]);
        let bytes = segment.encode();

        assert_eq!(bytes.len(), SEGMENT_HEADER_SIZE + 1);
        assert_eq!(&bytes[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[4..8], &[0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(bytes[8], FLAG_ACK);
        assert_eq!(bytes[9], 0xff);
    }

    #[test]
    fn test_payload_length_is_remainder() {
        let mut bytes = Segment::ack(7).encode();
        bytes.extend_from_slice(b"trailing");

        let decoded = Segment::decode(&bytes).unwrap();
        assert_eq!(decoded.payload, b"trailing");
        assert_eq!(decoded.ack, 7);
    }

    #[test]
    fn test_decode_too_short() {
        let result = Segment::decode(&[0u8; SEGMENT_HEADER_SIZE - 1]);
        assert_eq!(
            result,
            Err(MalformedSegmentError {
                expected: SEGMENT_HEADER_SIZE,
                actual: SEGMENT_HEADER_SIZE - 1,
            })
        );
    }

    #[test]
    fn test_header_only_decodes() {
        let decoded = Segment::decode(&[0u8; SEGMENT_HEADER_SIZE]).unwrap();
        assert!(decoded.payload.is_empty());
        assert!(decoded.is_pure_ack());
    }

    #[test]
    fn test_data_and_ack_constructors() {
        let data = Segment::data(42, b"payload".to_vec());
        assert!(data.is_data());
        assert!(!data.is_pure_ack());
        assert_eq!(data.seq, 42);

        let ack = Segment::ack(42);
        assert!(ack.is_pure_ack());
        assert!(!ack.is_data());
        assert_eq!(ack.ack, 42);
    }

    #[test]
    fn test_unknown_flag_bits_preserved() {
        let flags = SegmentFlags::from_byte(0x80 | FLAG_SYN);
        let bytes = Segment::new(0, 0, flags, vec![]).encode();
        let decoded = Segment::decode(&bytes).unwrap();

        assert_eq!(decoded.flags.as_byte(), 0x80 | FLAG_SYN);
        assert_eq!(decoded.segment_type(), SegmentType::Syn);
    }
}
