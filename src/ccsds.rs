//! CCSDS space packet primary header.
//!
//! The 48-bit primary header layout here follows the CCSDS 133.0-B space
//! packet protocol, the same fields the `other_examples` ASU cubesat
//! space-packet crate decodes with `byteorder`; this module reimplements the
//! same field layout on top of [`crate::bitcursor::BitCursor`] so the
//! [`crate::framer::Framer`] can share one bit-reading primitive throughout.

use crate::bitcursor::BitCursor;
use crate::error::BitCursorError;

pub const PRIMARY_HEADER_OCTETS: usize = 6;

/// Segmentation state of a packet relative to others sharing its APID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SequenceFlags {
    Continuation = 0,
    First = 1,
    Last = 2,
    Unsegmented = 3,
}

impl SequenceFlags {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => SequenceFlags::Continuation,
            1 => SequenceFlags::First,
            2 => SequenceFlags::Last,
            _ => SequenceFlags::Unsegmented,
        }
    }

    pub fn as_bits(self) -> u8 {
        self as u8
    }
}

/// The decoded fields of a CCSDS primary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryHeader {
    pub version: u8,
    pub packet_type: u8,
    pub secondary_header_flag: bool,
    pub apid: u16,
    pub sequence_flags: SequenceFlags,
    pub sequence_count: u16,
    /// Value of the wire `DataLength` field: total packet octets minus 7.
    pub data_length: u16,
}

impl PrimaryHeader {
    /// Total octets of the packet this header describes (header + data field).
    pub fn total_octets(&self) -> usize {
        PRIMARY_HEADER_OCTETS + self.data_length as usize + 1
    }

    /// Decode a primary header from the first 6 octets of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, BitCursorError> {
        let mut cursor = BitCursor::new(bytes);
        let version = cursor.read_int(3)? as u8;
        let packet_type = cursor.read_int(1)? as u8;
        let secondary_header_flag = cursor.read_int(1)? != 0;
        let apid = cursor.read_int(11)? as u16;
        let sequence_flags = SequenceFlags::from_bits(cursor.read_int(2)? as u8);
        let sequence_count = cursor.read_int(14)? as u16;
        let data_length = cursor.read_int(16)? as u16;
        Ok(PrimaryHeader {
            version,
            packet_type,
            secondary_header_flag,
            apid,
            sequence_flags,
            sequence_count,
            data_length,
        })
    }

    /// Encode this header back into its 6-octet wire form.
    ///
    /// Used only to discharge the framer round-trip testable property; this
    /// crate does not otherwise encode packets.
    pub fn encode(&self) -> [u8; PRIMARY_HEADER_OCTETS] {
        let mut word0: u16 = 0;
        word0 |= (self.version as u16 & 0b111) << 13;
        word0 |= (self.packet_type as u16 & 0b1) << 12;
        word0 |= (self.secondary_header_flag as u16) << 11;
        word0 |= self.apid & 0x7FF;

        let mut word1: u16 = 0;
        word1 |= (self.sequence_flags.as_bits() as u16 & 0b11) << 14;
        word1 |= self.sequence_count & 0x3FFF;

        let mut out = [0u8; PRIMARY_HEADER_OCTETS];
        out[0..2].copy_from_slice(&word0.to_be_bytes());
        out[2..4].copy_from_slice(&word1.to_be_bytes());
        out[4..6].copy_from_slice(&self.data_length.to_be_bytes());
        out
    }
}

/// An immutable, already-framed packet: its raw bytes plus a cursor ready to
/// be handed to the container parser. `RawPacketBytes` does not itself know
/// about XTCE; it only knows how to report CCSDS header fields.
#[derive(Debug, Clone)]
pub struct RawPacketBytes {
    bytes: Vec<u8>,
}

impl RawPacketBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        RawPacketBytes { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header(&self) -> Result<PrimaryHeader, BitCursorError> {
        PrimaryHeader::decode(&self.bytes)
    }

    /// A fresh cursor positioned at bit 0 of this packet's bytes.
    pub fn cursor(&self) -> BitCursor {
        BitCursor::new(&self.bytes)
    }
}

/// Build the wire bytes of a packet from its header fields and data-field
/// payload. `payload.len()` must equal `header.data_length as usize + 1`;
/// this is asserted rather than validated since it is only used internally
/// by the framer's round-trip test support.
pub fn create_packet(header: &PrimaryHeader, payload: &[u8]) -> Vec<u8> {
    debug_assert_eq!(payload.len(), header.data_length as usize + 1);
    let mut out = Vec::with_capacity(PRIMARY_HEADER_OCTETS + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_header_only_packet() {
        let bytes = [0x08, 0x00, 0xC0, 0x00, 0x00, 0x00, 0xFF];
        let raw = RawPacketBytes::new(bytes.to_vec());
        let header = raw.header().unwrap();
        assert_eq!(header.version, 0);
        assert_eq!(header.packet_type, 0);
        assert!(header.secondary_header_flag);
        assert_eq!(header.apid, 0);
        assert_eq!(header.sequence_flags, SequenceFlags::Unsegmented);
        assert_eq!(header.sequence_count, 0);
        assert_eq!(header.data_length, 0);
        assert_eq!(header.total_octets(), 7);
    }

    #[test]
    fn round_trip_header() {
        let bytes = [0x08, 0x00, 0xC0, 0x00, 0x00, 0x00, 0xFF];
        let header = PrimaryHeader::decode(&bytes).unwrap();
        let payload = &bytes[PRIMARY_HEADER_OCTETS..];
        assert_eq!(create_packet(&header, payload), bytes);
    }

    #[test]
    fn sequence_flags_round_trip() {
        for bits in 0..4u8 {
            let flags = SequenceFlags::from_bits(bits);
            assert_eq!(flags.as_bits(), bits);
        }
    }
}
