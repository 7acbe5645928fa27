//! Delimits CCSDS packets out of a byte source, with optional reassembly of
//! segmented packets.
//!
//! The buffering strategy here mirrors the teacher's `Buffer<R>`: a reader
//! plus an internal staging buffer that gets topped up as packets are
//! consumed, so a socket-backed source never needs its whole stream in
//! memory at once.

use std::collections::HashMap;
use std::io::Read;

use crate::ccsds::{PrimaryHeader, RawPacketBytes, SequenceFlags, PRIMARY_HEADER_OCTETS};
use crate::error::FramerError;

/// Drop the consumed prefix of the staging buffer once it grows past this
/// many bytes, to bound memory use on long-lived stream sources.
const DEFAULT_BUFFER_THRESHOLD: usize = 20 * 1024 * 1024;

/// Tunables for [`Framer`].
#[derive(Debug, Clone)]
pub struct FramerOptions {
    /// Bytes to discard before each packet (e.g. a fixed-size record wrapper).
    pub skip_header_bytes: usize,

    /// Bytes to skip, in each continuation/last segment, after its own
    /// primary header, before concatenating its payload onto the
    /// reassembled packet. Accounts for a repeated secondary header.
    pub secondary_header_bytes: usize,

    /// Reassemble segmented packets (SequenceFlags::{First,Continuation,Last})
    /// into a single logical packet.
    pub combine_segmented_packets: bool,

    /// Staging-buffer size, in bytes, above which the consumed prefix is
    /// dropped and the read position reset.
    pub buffer_threshold: usize,
}

impl Default for FramerOptions {
    fn default() -> Self {
        FramerOptions {
            skip_header_bytes: 0,
            secondary_header_bytes: 0,
            combine_segmented_packets: false,
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
        }
    }
}

struct PendingGroup {
    header: PrimaryHeader,
    bytes: Vec<u8>,
    last_sequence_count: u16,
}

/// Pulls [`RawPacketBytes`] out of a byte source.
pub struct Framer<R: Read> {
    reader: R,
    buf: Vec<u8>,
    cur: usize,
    eof: bool,
    options: FramerOptions,
    pending: HashMap<u16, PendingGroup>,
}

impl<R: Read> Framer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, FramerOptions::default())
    }

    pub fn with_options(reader: R, options: FramerOptions) -> Self {
        Framer {
            reader,
            buf: Vec::new(),
            cur: 0,
            eof: false,
            options,
            pending: HashMap::new(),
        }
    }

    /// Top up the staging buffer until at least `need` bytes are available
    /// from `cur`, or the source is exhausted.
    fn fill(&mut self, need: usize) -> Result<(), FramerError> {
        while !self.eof && self.buf.len() - self.cur < need {
            let mut chunk = [0u8; 4096];
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn compact(&mut self) {
        if self.cur > self.options.buffer_threshold {
            self.buf.drain(0..self.cur);
            self.cur = 0;
        }
    }

    /// Read exactly one CCSDS packet's raw bytes from the current position,
    /// without touching reassembly state.
    fn read_one(&mut self) -> Result<Option<Vec<u8>>, FramerError> {
        self.cur += self.options.skip_header_bytes;
        self.fill(PRIMARY_HEADER_OCTETS)?;
        if self.buf.len() - self.cur < PRIMARY_HEADER_OCTETS {
            return Ok(None);
        }

        let header_bytes = &self.buf[self.cur..self.cur + PRIMARY_HEADER_OCTETS];
        let header = PrimaryHeader::decode(header_bytes).expect("fixed-width header decode cannot fail");
        let total = header.total_octets();

        self.fill(total)?;
        if self.buf.len() - self.cur < total {
            // Source ended mid-packet: end the stream without emitting a
            // partial, rather than surfacing an error.
            return Ok(None);
        }

        let packet = self.buf[self.cur..self.cur + total].to_vec();
        self.cur += total;
        self.compact();
        Ok(Some(packet))
    }

    /// Pull the next packet, applying segmented reassembly when enabled.
    /// Returns `Ok(None)` at end of stream.
    pub fn next_packet(&mut self) -> Result<Option<RawPacketBytes>, FramerError> {
        loop {
            let Some(bytes) = self.read_one()? else {
                return Ok(None);
            };

            if !self.options.combine_segmented_packets {
                return Ok(Some(RawPacketBytes::new(bytes)));
            }

            let header = PrimaryHeader::decode(&bytes).expect("already validated by read_one");

            match header.sequence_flags {
                SequenceFlags::Unsegmented => return Ok(Some(RawPacketBytes::new(bytes))),
                SequenceFlags::First => {
                    self.pending.insert(
                        header.apid,
                        PendingGroup {
                            header,
                            bytes,
                            last_sequence_count: header.sequence_count,
                        },
                    );
                }
                SequenceFlags::Continuation => {
                    if let Some(group) = self.pending.get_mut(&header.apid) {
                        if contiguous(group.last_sequence_count, header.sequence_count) {
                            group.bytes.extend_from_slice(
                                &bytes[PRIMARY_HEADER_OCTETS + self.options.secondary_header_bytes..],
                            );
                            group.last_sequence_count = header.sequence_count;
                        } else {
                            log::warn!(
                                "dropping segmented group for apid {} due to sequence gap at count {}",
                                header.apid,
                                header.sequence_count
                            );
                            self.pending.remove(&header.apid);
                        }
                    } else {
                        log::warn!(
                            "continuation segment for apid {} arrived with no preceding FIRST segment",
                            header.apid
                        );
                    }
                }
                SequenceFlags::Last => {
                    if let Some(mut group) = self.pending.remove(&header.apid) {
                        if contiguous(group.last_sequence_count, header.sequence_count) {
                            group.bytes.extend_from_slice(
                                &bytes[PRIMARY_HEADER_OCTETS + self.options.secondary_header_bytes..],
                            );
                            let data_length = (group.bytes.len() - PRIMARY_HEADER_OCTETS - 1) as u16;
                            let mut out = group.bytes;
                            out[4..6].copy_from_slice(&data_length.to_be_bytes());
                            let _ = group.header;
                            return Ok(Some(RawPacketBytes::new(out)));
                        } else {
                            log::warn!(
                                "dropping segmented group for apid {} due to sequence gap at LAST segment count {}",
                                header.apid,
                                header.sequence_count
                            );
                        }
                    } else {
                        log::warn!(
                            "LAST segment for apid {} arrived with no preceding FIRST segment",
                            header.apid
                        );
                    }
                }
            }
            // Consumed a segment that did not itself complete a group; loop
            // around to pull the next packet from the source.
        }
    }

    /// A borrowing iterator over this framer's packets, mirroring the
    /// teacher's `Decoder::singles`.
    pub fn packets(&mut self) -> RawPackets<'_, R> {
        RawPackets { framer: self }
    }
}

fn contiguous(prev: u16, next: u16) -> bool {
    next == (prev + 1) % 16384
}

/// Borrowing iterator over a [`Framer`]'s packets.
pub struct RawPackets<'a, R: Read> {
    framer: &'a mut Framer<R>,
}

impl<'a, R: Read> Iterator for RawPackets<'a, R> {
    type Item = Result<RawPacketBytes, FramerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccsds::create_packet;
    use std::io::Cursor;

    fn packet(apid: u16, flags: SequenceFlags, seq: u16, payload: &[u8]) -> Vec<u8> {
        let header = PrimaryHeader {
            version: 0,
            packet_type: 0,
            secondary_header_flag: false,
            apid,
            sequence_flags: flags,
            sequence_count: seq,
            data_length: payload.len() as u16 - 1,
        };
        create_packet(&header, payload)
    }

    #[test]
    fn frames_single_unsegmented_packet() {
        let bytes = [0x08, 0x00, 0xC0, 0x00, 0x00, 0x00, 0xFF];
        let mut framer = Framer::new(Cursor::new(bytes.to_vec()));
        let packet = framer.next_packet().unwrap().unwrap();
        assert_eq!(packet.bytes(), &bytes);
        assert!(framer.next_packet().unwrap().is_none());
    }

    #[test]
    fn frames_two_back_to_back_packets() {
        let one = [0x08, 0x00, 0xC0, 0x00, 0x00, 0x00, 0xFF];
        let two = [0x08, 0x00, 0xC0, 0x01, 0x00, 0x00, 0xAA];
        let mut stream = Vec::new();
        stream.extend_from_slice(&one);
        stream.extend_from_slice(&two);

        let mut framer = Framer::new(Cursor::new(stream));
        assert_eq!(framer.next_packet().unwrap().unwrap().bytes(), &one);
        assert_eq!(framer.next_packet().unwrap().unwrap().bytes(), &two);
        assert!(framer.next_packet().unwrap().is_none());
    }

    #[test]
    fn reassembles_segmented_packet() {
        let p1 = packet(7, SequenceFlags::First, 5, &[0xAA, 0xBB]);
        let p2 = packet(7, SequenceFlags::Continuation, 6, &[0xCC, 0xDD]);
        let p3 = packet(7, SequenceFlags::Last, 7, &[0xEE, 0xFF]);
        let mut stream = Vec::new();
        stream.extend_from_slice(&p1);
        stream.extend_from_slice(&p2);
        stream.extend_from_slice(&p3);

        let options = FramerOptions {
            combine_segmented_packets: true,
            ..Default::default()
        };
        let mut framer = Framer::with_options(Cursor::new(stream), options);
        let reassembled = framer.next_packet().unwrap().unwrap();
        let data = &reassembled.bytes()[PRIMARY_HEADER_OCTETS..];
        assert_eq!(data, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert!(framer.next_packet().unwrap().is_none());
    }

    #[test]
    fn drops_group_with_sequence_gap() {
        let p1 = packet(7, SequenceFlags::First, 5, &[0xAA]);
        let p2 = packet(7, SequenceFlags::Continuation, 7, &[0xBB]); // gap: should be 6
        let p3 = packet(7, SequenceFlags::Last, 8, &[0xCC]);
        let mut stream = Vec::new();
        stream.extend_from_slice(&p1);
        stream.extend_from_slice(&p2);
        stream.extend_from_slice(&p3);

        let options = FramerOptions {
            combine_segmented_packets: true,
            ..Default::default()
        };
        let mut framer = Framer::with_options(Cursor::new(stream), options);
        assert!(framer.next_packet().unwrap().is_none());
    }

    #[test]
    fn truncated_packet_ends_stream_without_emitting_a_partial() {
        let bytes = [0x08, 0x00, 0xC0, 0x00, 0x00, 0x05]; // declares 6 more bytes, has 0
        let mut framer = Framer::new(Cursor::new(bytes.to_vec()));
        assert!(framer.next_packet().unwrap().is_none());
    }
}
