//! A [sans-I/O](https://sans-io.readthedocs.io/how-to-sans-io.html) decoder
//! for CCSDS space packet telemetry described by an XTCE packet definition.
//!
//! The pipeline is three stages, each its own module: [`framer`] delimits
//! raw packets out of a byte stream (with optional segmented-packet
//! reassembly), [`definition`] loads an XTCE XML document into an in-memory
//! model, and [`parser`] walks that model's container inheritance graph to
//! turn one packet's bytes into named, typed, calibrated values. [`stream`]
//! wires the three together into a single lazy `Iterator`.
//!
//! ```no_run
//! use std::fs::File;
//! use std::sync::Arc;
//!
//! let xtce = std::fs::read_to_string("definition.xml")?;
//! let definition = Arc::new(spacepacket::Definition::from_xtce_str(&xtce)?);
//!
//! let source = File::open("telemetry.bin")?;
//! for packet in spacepacket::PacketStream::new(source, definition) {
//!     let packet = packet?;
//!     for (name, value) in packet.iter() {
//!         println!("{name} = {}", value.derived);
//!     }
//! }
//! # Ok::<(), spacepacket::Error>(())
//! ```

pub mod bitcursor;
pub mod calibrators;
pub mod ccsds;
pub mod containers;
pub mod definition;
pub mod encodings;
pub mod error;
pub mod framer;
pub mod match_criteria;
pub mod ordered_map;
pub mod packet;
pub mod parameter_types;
pub mod parser;
pub mod stream;
pub mod value;
pub mod xmltree;

pub use bitcursor::BitCursor;
pub use ccsds::{PrimaryHeader, RawPacketBytes, SequenceFlags};
pub use definition::{Definition, DefinitionMetadata, Parameter};
pub use error::{Error, Result};
pub use framer::{Framer, FramerOptions};
pub use packet::Packet;
pub use parser::{parse_packet, ParseOutcome};
pub use stream::{PacketStream, PacketStreamOptions};
pub use value::{ParameterValue, ParsedValue};
