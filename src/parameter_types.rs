//! Parameter types: semantic typing layered on top of a [`DataEncoding`].
//!
//! Enumeration lookup, boolean truthiness, and time-epoch handling are
//! grounded on `xtce/parameter_types.py`; the truthiness rule for non-numeric
//! raw values is an explicit design decision recorded in `DESIGN.md` (it
//! deliberately diverges from Python's `bool("0") == True`).

use std::collections::HashMap;

use crate::bitcursor::BitCursor;
use crate::calibrators::Calibrator;
use crate::encodings::DataEncoding;
use crate::error::ParseError;
use crate::match_criteria::MatchContext;
use crate::value::{ParameterValue, ParsedValue};

/// Key used to look an enumerated raw value up against its label. XTCE
/// enumerations key on the parameter's raw numeric or byte value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnumKey {
    Int(i64),
    Bytes(Vec<u8>),
}

impl EnumKey {
    fn from_raw(raw: &ParsedValue) -> Option<Self> {
        match raw {
            ParsedValue::Int(v) => Some(EnumKey::Int(*v)),
            ParsedValue::Bytes(v) => Some(EnumKey::Bytes(v.clone())),
            ParsedValue::Float(v) => Some(EnumKey::Int(*v as i64)),
            _ => None,
        }
    }
}

/// A named point in time used as the zero of an [`AbsoluteTimeType`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Epoch {
    Tai,
    J2000,
    Unix,
    Posix,
    Gps,
    /// An xs:date or xs:dateTime literal epoch, resolved to seconds since
    /// the UNIX epoch at parse time.
    Literal(f64),
}

impl Epoch {
    pub fn seconds_since_unix_epoch(self) -> f64 {
        match self {
            Epoch::Unix | Epoch::Posix => 0.0,
            // TAI began its modern epoch at the same instant as UNIX time
            // 0 for this crate's purposes; leap-second bookkeeping is out
            // of scope.
            Epoch::Tai => 0.0,
            Epoch::J2000 => 946_728_000.0, // 2000-01-01T12:00:00Z
            Epoch::Gps => 315_964_800.0,   // 1980-01-06T00:00:00Z
            Epoch::Literal(seconds) => seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringParameterType {
    pub name: String,
    pub encoding: DataEncoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerParameterType {
    pub name: String,
    pub encoding: DataEncoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatParameterType {
    pub name: String,
    pub encoding: DataEncoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryParameterType {
    pub name: String,
    pub encoding: DataEncoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumeratedParameterType {
    pub name: String,
    pub encoding: DataEncoding,
    pub enumeration: HashMap<EnumKey, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanParameterType {
    pub name: String,
    pub encoding: DataEncoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteTimeParameterType {
    pub name: String,
    pub encoding: DataEncoding,
    pub epoch: Option<Epoch>,
    pub scale_offset: Option<Calibrator>,
    /// Name of another time parameter this one is offset from. XTCE does
    /// not specify what a reader should do with it; parsed and stored only.
    pub offset_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelativeTimeParameterType {
    pub name: String,
    pub encoding: DataEncoding,
    pub scale_offset: Option<Calibrator>,
    pub offset_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    String(StringParameterType),
    Integer(IntegerParameterType),
    Float(FloatParameterType),
    Binary(BinaryParameterType),
    Enumerated(EnumeratedParameterType),
    Boolean(BooleanParameterType),
    AbsoluteTime(AbsoluteTimeParameterType),
    RelativeTime(RelativeTimeParameterType),
}

impl ParameterType {
    pub fn name(&self) -> &str {
        match self {
            ParameterType::String(t) => &t.name,
            ParameterType::Integer(t) => &t.name,
            ParameterType::Float(t) => &t.name,
            ParameterType::Binary(t) => &t.name,
            ParameterType::Enumerated(t) => &t.name,
            ParameterType::Boolean(t) => &t.name,
            ParameterType::AbsoluteTime(t) => &t.name,
            ParameterType::RelativeTime(t) => &t.name,
        }
    }

    fn encoding(&self) -> &DataEncoding {
        match self {
            ParameterType::String(t) => &t.encoding,
            ParameterType::Integer(t) => &t.encoding,
            ParameterType::Float(t) => &t.encoding,
            ParameterType::Binary(t) => &t.encoding,
            ParameterType::Enumerated(t) => &t.encoding,
            ParameterType::Boolean(t) => &t.encoding,
            ParameterType::AbsoluteTime(t) => &t.encoding,
            ParameterType::RelativeTime(t) => &t.encoding,
        }
    }

    pub fn parse(&self, cursor: &mut BitCursor, ctx: &MatchContext) -> Result<ParameterValue, ParseError> {
        let encoded = self.encoding().parse(cursor, ctx)?;

        match self {
            ParameterType::String(_)
            | ParameterType::Integer(_)
            | ParameterType::Float(_)
            | ParameterType::Binary(_) => Ok(encoded),

            ParameterType::Enumerated(t) => {
                let key = EnumKey::from_raw(&encoded.raw).ok_or_else(|| ParseError::EnumLookup {
                    parameter: t.name.clone(),
                    raw: encoded.raw.to_string(),
                })?;
                let label = t.enumeration.get(&key).ok_or_else(|| ParseError::EnumLookup {
                    parameter: t.name.clone(),
                    raw: encoded.raw.to_string(),
                })?;
                Ok(ParameterValue::new(ParsedValue::Str(label.clone()), encoded.raw))
            }

            ParameterType::Boolean(t) => {
                let truthy = match &encoded.raw {
                    ParsedValue::Int(v) => *v != 0,
                    ParsedValue::Float(v) => *v != 0.0,
                    ParsedValue::Bool(v) => *v,
                    ParsedValue::Str(v) => {
                        log::warn!(
                            "boolean parameter type {} reads a string-encoded raw value; treating empty \
                             or \"0\" as false",
                            t.name
                        );
                        !(v.is_empty() || v == "0")
                    }
                    ParsedValue::Bytes(v) => {
                        log::warn!(
                            "boolean parameter type {} reads a binary-encoded raw value; treating all-zero \
                             bytes as false",
                            t.name
                        );
                        v.iter().any(|b| *b != 0)
                    }
                };
                Ok(ParameterValue::new(ParsedValue::Bool(truthy), encoded.raw))
            }

            ParameterType::AbsoluteTime(t) => {
                let raw_seconds = encoded.raw.as_f64().unwrap_or(0.0);
                let scaled = match &t.scale_offset {
                    Some(calibrator) => calibrator.calibrate(raw_seconds, ctx).unwrap_or(raw_seconds),
                    None => raw_seconds,
                };
                let epoch_offset = t.epoch.map(Epoch::seconds_since_unix_epoch).unwrap_or(0.0);
                Ok(ParameterValue::new(
                    ParsedValue::Float(scaled + epoch_offset),
                    encoded.raw,
                ))
            }

            ParameterType::RelativeTime(t) => {
                let raw_seconds = encoded.raw.as_f64().unwrap_or(0.0);
                let scaled = match &t.scale_offset {
                    Some(calibrator) => calibrator.calibrate(raw_seconds, ctx).unwrap_or(raw_seconds),
                    None => raw_seconds,
                };
                Ok(ParameterValue::new(ParsedValue::Float(scaled), encoded.raw))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encodings::{ByteOrder, CalibratorChain, IntegerDataEncoding};
    use crate::match_criteria::EmptyLookup;

    fn ctx() -> MatchContext<'static> {
        static LOOKUP: EmptyLookup = EmptyLookup;
        MatchContext::new(&LOOKUP)
    }

    fn unsigned16() -> DataEncoding {
        DataEncoding::Integer(IntegerDataEncoding {
            size_in_bits: 16,
            signed: false,
            byte_order: ByteOrder::MostSignificantByteFirst,
            calibrators: CalibratorChain::default(),
        })
    }

    #[test]
    fn enumerated_lookup_succeeds() {
        let mut enumeration = HashMap::new();
        enumeration.insert(EnumKey::Int(32768), "NOMINAL".to_string());
        let ptype = ParameterType::Enumerated(EnumeratedParameterType {
            name: "Status".to_string(),
            encoding: unsigned16(),
            enumeration,
        });
        let mut cursor = BitCursor::new(&[0x80, 0x00]);
        let value = ptype.parse(&mut cursor, &ctx()).unwrap();
        assert_eq!(value.derived, ParsedValue::Str("NOMINAL".to_string()));
        assert_eq!(value.raw, ParsedValue::Int(32768));
    }

    #[test]
    fn enumerated_lookup_miss_errors() {
        let ptype = ParameterType::Enumerated(EnumeratedParameterType {
            name: "Status".to_string(),
            encoding: unsigned16(),
            enumeration: HashMap::new(),
        });
        let mut cursor = BitCursor::new(&[0x80, 0x00]);
        assert!(ptype.parse(&mut cursor, &ctx()).is_err());
    }

    #[test]
    fn boolean_string_zero_is_falsy() {
        let ptype = BooleanParameterType {
            name: "Flag".to_string(),
            encoding: DataEncoding::String(crate::encodings::StringDataEncoding {
                char_encoding: crate::encodings::StringCharEncoding::UsAscii,
                byte_order: None,
                raw_length: crate::encodings::RawLengthSpec::Fixed(8),
                derived_length: None,
            }),
        };
        let mut cursor = BitCursor::new(b"0");
        let value = ParameterType::Boolean(ptype).parse(&mut cursor, &ctx()).unwrap();
        assert_eq!(value.derived, ParsedValue::Bool(false));
    }

    #[test]
    fn boolean_nonzero_int_is_truthy() {
        let ptype = ParameterType::Boolean(BooleanParameterType {
            name: "Flag".to_string(),
            encoding: unsigned16(),
        });
        let mut cursor = BitCursor::new(&[0x00, 0x01]);
        let value = ptype.parse(&mut cursor, &ctx()).unwrap();
        assert_eq!(value.derived, ParsedValue::Bool(true));
    }
}
