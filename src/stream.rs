//! The public lazy packet stream: frames raw bytes, then decodes each
//! framed packet against a [`Definition`], one packet per `Iterator::next`
//! call.
//!
//! Owning its `Framer<R>` directly (rather than borrowing one, the way
//! [`crate::framer::RawPackets`] does) mirrors the teacher's top-level
//! `Decoder<R>` owning its `Buffer<R>` in `itm/src/lib.rs`; `PacketStream`
//! plays the same role `Decoder::singles` plays for the teacher, one layer
//! up, over fully-typed packets instead of raw trace frames.

use std::io::Read;
use std::sync::Arc;

use crate::definition::Definition;
use crate::error::Error;
use crate::framer::{Framer, FramerOptions};
use crate::packet::Packet;
use crate::parser::parse_packet;

/// Tunables for [`PacketStream`], layered on top of [`FramerOptions`].
#[derive(Debug, Clone)]
pub struct PacketStreamOptions {
    pub framer: FramerOptions,

    /// If false (the default), a packet whose container walk does not
    /// consume every declared bit is silently dropped from the stream
    /// instead of being yielded; matches `space_packet_parser`'s
    /// `skip_header_bytes`/bad-packet-skipping default.
    pub parse_bad_packets: bool,
}

impl Default for PacketStreamOptions {
    fn default() -> Self {
        PacketStreamOptions {
            framer: FramerOptions::default(),
            parse_bad_packets: false,
        }
    }
}

/// A lazy, one-packet-at-a-time decoder: frames CCSDS packets out of `R`
/// and parses each one against a shared [`Definition`].
pub struct PacketStream<R: Read> {
    framer: Framer<R>,
    definition: Arc<Definition>,
    options: PacketStreamOptions,
}

impl<R: Read> PacketStream<R> {
    pub fn new(reader: R, definition: Arc<Definition>) -> Self {
        Self::with_options(reader, definition, PacketStreamOptions::default())
    }

    pub fn with_options(reader: R, definition: Arc<Definition>, options: PacketStreamOptions) -> Self {
        PacketStream {
            framer: Framer::with_options(reader, options.framer.clone()),
            definition,
            options,
        }
    }

    /// Decode and return the next packet, or `Ok(None)` at end of stream.
    /// Used by the `Iterator` impl; exposed directly for callers that want
    /// to distinguish "no more packets" from "an error occurred" without
    /// pattern-matching an `Option<Result<_, _>>`.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, Error> {
        loop {
            let Some(raw) = self.framer.next_packet()? else {
                return Ok(None);
            };

            let mut packet = Packet::new(raw);
            match parse_packet(&self.definition, &mut packet) {
                Ok(outcome) if outcome.fully_consumed || self.options.parse_bad_packets => {
                    return Ok(Some(packet));
                }
                Ok(_) => {
                    log::warn!("dropping packet with leftover bits after container parse (parse_bad_packets is disabled)");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl<R: Read> Iterator for PacketStream<R> {
    type Item = Result<Packet, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccsds::{create_packet, PrimaryHeader, SequenceFlags};
    use crate::containers::{Entry, SequenceContainer};
    use crate::definition::{DefinitionMetadata, Parameter};
    use crate::encodings::{ByteOrder, CalibratorChain, DataEncoding, IntegerDataEncoding};
    use crate::ordered_map::OrderedMap;
    use crate::parameter_types::{IntegerParameterType, ParameterType};
    use crate::value::ParsedValue;

    fn definition() -> Arc<Definition> {
        let mut parameter_types = OrderedMap::new();
        parameter_types
            .try_insert(
                "payload_type",
                ParameterType::Integer(IntegerParameterType {
                    name: "payload_type".to_string(),
                    encoding: DataEncoding::Integer(IntegerDataEncoding {
                        size_in_bits: 8,
                        signed: false,
                        byte_order: ByteOrder::MostSignificantByteFirst,
                        calibrators: CalibratorChain::default(),
                    }),
                }),
            )
            .unwrap();

        let mut parameters = OrderedMap::new();
        parameters
            .try_insert(
                "Payload",
                Parameter {
                    name: "Payload".to_string(),
                    parameter_type_ref: "payload_type".to_string(),
                    short_description: None,
                },
            )
            .unwrap();

        let mut root = SequenceContainer::new("CCSDSPacket");
        root.entry_list.push(Entry::Parameter("Payload".to_string()));

        let mut sequence_containers = OrderedMap::new();
        sequence_containers.try_insert("CCSDSPacket", root).unwrap();

        Arc::new(Definition {
            parameter_types,
            parameters,
            sequence_containers,
            root_container_name: "CCSDSPacket".to_string(),
            metadata: DefinitionMetadata::default(),
        })
    }

    fn packet_bytes(apid: u16, seq: u16, payload: u8) -> Vec<u8> {
        let header = PrimaryHeader {
            version: 0,
            packet_type: 0,
            secondary_header_flag: false,
            apid,
            sequence_flags: SequenceFlags::Unsegmented,
            sequence_count: seq,
            data_length: 0,
        };
        create_packet(&header, &[payload])
    }

    #[test]
    fn yields_one_decoded_packet_per_frame() {
        let mut bytes = packet_bytes(1, 0, 0xAA);
        bytes.extend(packet_bytes(1, 1, 0xBB));

        let stream = PacketStream::new(std::io::Cursor::new(bytes), definition());
        let packets: Vec<Packet> = stream.map(|r| r.unwrap()).collect();

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].get("Payload").unwrap().derived, ParsedValue::Int(0xAA));
        assert_eq!(packets[1].get("Payload").unwrap().derived, ParsedValue::Int(0xBB));
    }
}
