//! Container parser: walks a definition's container inheritance graph for a
//! single packet, decoding entries and descending into whichever inheritor's
//! restriction criteria match.
//!
//! Grounded on the `other_examples` XTCE prototype's `ProcCtx`/processor-data
//! walk (`proc/mod.rs`), which performs the same entry-list-then-inheritor-
//! selection loop against a `MissionDatabase`.

use crate::bitcursor::BitCursor;
use crate::containers::{Entry, SequenceContainer};
use crate::definition::Definition;
use crate::error::ParseError;
use crate::match_criteria::MatchContext;
use crate::packet::Packet;

/// The result of walking one packet's container graph.
#[derive(Debug, Clone, Copy)]
pub struct ParseOutcome {
    /// Whether the bit cursor had consumed every available bit by the time
    /// a concrete (non-abstract) container with no matching inheritor was
    /// reached. Callers such as [`crate::stream::PacketStream`] use this to
    /// decide whether to drop a malformed packet.
    pub fully_consumed: bool,
}

/// Decode `packet` against `definition`, starting from
/// `definition.root_container_name`, inserting every parsed parameter value
/// into `packet` in entry-list order.
pub fn parse_packet(definition: &Definition, packet: &mut Packet) -> Result<ParseOutcome, ParseError> {
    let root_name = definition.root_container_name.clone();
    let mut current = definition
        .container(&root_name)
        .ok_or_else(|| ParseError::UnrecognizedPacketType { root: root_name.clone() })?;

    let mut cursor = packet.cursor();

    loop {
        parse_entry_list(definition, current, packet, &mut cursor)?;

        let matching: Vec<&SequenceContainer> = current
            .inheritors
            .iter()
            .filter_map(|name| definition.container(name))
            .filter(|candidate| restriction_criteria_hold(candidate, packet))
            .collect();

        match matching.len() {
            0 if current.abstract_ => {
                return Err(ParseError::UnrecognizedPacketType { root: current.name.clone() });
            }
            0 => break,
            1 => current = matching[0],
            _ => return Err(ParseError::UnrecognizedPacketType { root: current.name.clone() }),
        }
    }

    let remaining = cursor.remaining_bits();
    let fully_consumed = remaining == 0;
    if !fully_consumed {
        log::warn!(
            "packet did not consume all available bits after parsing ({remaining} bits left); \
             the definition's declared length may not match this packet's actual content"
        );
    }
    Ok(ParseOutcome { fully_consumed })
}

fn restriction_criteria_hold(container: &SequenceContainer, packet: &Packet) -> bool {
    let ctx = MatchContext::new(packet);
    container
        .restriction_criteria
        .iter()
        .all(|criteria| criteria.evaluate(&ctx).unwrap_or(false))
}

/// Decode every entry of `container`'s entry list into `packet`, splicing in
/// a nested container's own entry list in place when an entry references
/// one (the nested container does not introduce a new inheritance decision
/// point; only the outer loop in [`parse_packet`] does).
fn parse_entry_list(
    definition: &Definition,
    container: &SequenceContainer,
    packet: &mut Packet,
    cursor: &mut BitCursor,
) -> Result<(), ParseError> {
    for entry in &container.entry_list {
        match entry {
            Entry::Parameter(name) => {
                let parameter = definition
                    .parameter(name)
                    .ok_or_else(|| ParseError::UnrecognizedPacketType { root: name.clone() })?;
                let parameter_type = definition
                    .parameter_type(&parameter.parameter_type_ref)
                    .ok_or_else(|| ParseError::UnrecognizedPacketType { root: parameter.parameter_type_ref.clone() })?;

                let value = {
                    let ctx = MatchContext::new(&*packet);
                    parameter_type.parse(cursor, &ctx)?
                };
                packet.insert(name.clone(), value);
            }
            Entry::Container(name) => {
                let nested = definition
                    .container(name)
                    .ok_or_else(|| ParseError::UnrecognizedPacketType { root: name.clone() })?;
                parse_entry_list(definition, nested, packet, cursor)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccsds::RawPacketBytes;
    use crate::containers::{Entry, SequenceContainer};
    use crate::definition::{Definition, DefinitionMetadata, Parameter};
    use crate::encodings::{ByteOrder, CalibratorChain, DataEncoding, IntegerDataEncoding};
    use crate::match_criteria::{Comparison, MatchCriteria, Operator};
    use crate::ordered_map::OrderedMap;
    use crate::parameter_types::{IntegerParameterType, ParameterType};
    use crate::value::ParsedValue;

    fn u16_type(name: &str) -> ParameterType {
        ParameterType::Integer(IntegerParameterType {
            name: name.to_string(),
            encoding: DataEncoding::Integer(IntegerDataEncoding {
                size_in_bits: 16,
                signed: false,
                byte_order: ByteOrder::MostSignificantByteFirst,
                calibrators: CalibratorChain::default(),
            }),
        })
    }

    fn build_definition() -> Definition {
        let mut parameter_types = OrderedMap::new();
        parameter_types.try_insert("u16_type", u16_type("u16_type")).unwrap();

        let mut parameters = OrderedMap::new();
        parameters
            .try_insert(
                "APID",
                Parameter {
                    name: "APID".to_string(),
                    parameter_type_ref: "u16_type".to_string(),
                    short_description: None,
                },
            )
            .unwrap();
        parameters
            .try_insert(
                "Status",
                Parameter {
                    name: "Status".to_string(),
                    parameter_type_ref: "u16_type".to_string(),
                    short_description: None,
                },
            )
            .unwrap();

        let mut root = SequenceContainer::new("CCSDSPacket");
        root.abstract_ = true;
        root.entry_list.push(Entry::Parameter("APID".to_string()));
        root.inheritors.push("Telemetry1".to_string());
        root.inheritors.push("Telemetry2".to_string());

        let mut t1 = SequenceContainer::new("Telemetry1");
        t1.entry_list.push(Entry::Parameter("Status".to_string()));
        t1.base_container_name = Some("CCSDSPacket".to_string());
        t1.restriction_criteria.push(MatchCriteria::Comparison(Comparison {
            referenced_parameter: "APID".to_string(),
            operator: Operator::Eq,
            required_value: "11".to_string(),
            use_calibrated_value: true,
        }));

        let mut t2 = SequenceContainer::new("Telemetry2");
        t2.entry_list.push(Entry::Parameter("Status".to_string()));
        t2.base_container_name = Some("CCSDSPacket".to_string());
        t2.restriction_criteria.push(MatchCriteria::Comparison(Comparison {
            referenced_parameter: "APID".to_string(),
            operator: Operator::Eq,
            required_value: "22".to_string(),
            use_calibrated_value: true,
        }));

        let mut sequence_containers = OrderedMap::new();
        sequence_containers.try_insert("CCSDSPacket", root).unwrap();
        sequence_containers.try_insert("Telemetry1", t1).unwrap();
        sequence_containers.try_insert("Telemetry2", t2).unwrap();

        Definition {
            parameter_types,
            parameters,
            sequence_containers,
            root_container_name: "CCSDSPacket".to_string(),
            metadata: DefinitionMetadata::default(),
        }
    }

    fn packet_with_bytes(bytes: &[u8]) -> Packet {
        Packet::new(RawPacketBytes::new(bytes.to_vec()))
    }

    #[test]
    fn selects_matching_inheritor() {
        let definition = build_definition();
        let mut packet = packet_with_bytes(&[0x00, 0x0B, 0xAB, 0xCD]);
        let outcome = parse_packet(&definition, &mut packet).unwrap();
        assert!(outcome.fully_consumed);
        assert_eq!(packet.get("APID").unwrap().derived, ParsedValue::Int(11));
        assert_eq!(packet.get("Status").unwrap().derived, ParsedValue::Int(0xABCD));
    }

    #[test]
    fn no_matching_inheritor_fails() {
        let definition = build_definition();
        let mut packet = packet_with_bytes(&[0x00, 0x21, 0xAB, 0xCD]);
        assert!(parse_packet(&definition, &mut packet).is_err());
    }
}
