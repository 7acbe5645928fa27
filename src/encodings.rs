//! Data encodings: how a raw value is pulled off the bit stream, before any
//! parameter-type-level semantics (enumeration, boolean coercion, time
//! epochs) are applied.
//!
//! Field layouts and the legacy alias / linear-adjuster behavior are
//! grounded on `xtce/encodings.py`; bit-level mechanics are grounded on the
//! `BitCursor` built in `bitcursor.rs`, itself grounded on the teacher's
//! `Buffer::pop_bit`/`pop_bits`.

use crate::bitcursor::BitCursor;
use crate::calibrators::Calibrator;
use crate::error::{CalibrationError, ParseError};
use crate::match_criteria::{MatchContext, MatchCriteria};
use crate::value::ParameterValue;
use crate::value::ParsedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    MostSignificantByteFirst,
    LeastSignificantByteFirst,
}

/// A `DefaultCalibrator` plus an optional `ContextCalibratorList`, applied in
/// XTCE's documented order: context calibrators are tried first, in
/// document order, and the first whose match criteria hold wins; if none
/// match, the default calibrator (if any) applies; otherwise the raw value
/// passes through unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibratorChain {
    pub context_calibrators: Vec<Calibrator>,
    pub default_calibrator: Option<Calibrator>,
}

impl CalibratorChain {
    pub fn is_empty(&self) -> bool {
        self.context_calibrators.is_empty() && self.default_calibrator.is_none()
    }

    fn calibrate(&self, raw: f64, ctx: &MatchContext) -> Result<Option<f64>, CalibrationError> {
        for calibrator in &self.context_calibrators {
            if calibrator.applies(ctx) {
                return Ok(Some(calibrator.calibrate(raw, ctx)?));
            }
        }
        if let Some(calibrator) = &self.default_calibrator {
            return Ok(Some(calibrator.calibrate(raw, ctx)?));
        }
        Ok(None)
    }
}

/// `LinearAdjustment`: an optional integer-valued affine transform applied to
/// a dynamically-referenced length value. Per the source, a non-integral
/// result is a hard error rather than silently truncated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearAdjuster {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearAdjuster {
    pub fn adjust(&self, x: f64, parameter: &str) -> Result<i64, ParseError> {
        let adjusted = self.slope * x + self.intercept;
        if adjusted.fract() != 0.0 {
            return Err(ParseError::NonIntegralAdjustedLength {
                parameter: parameter.to_string(),
                value: adjusted,
            });
        }
        Ok(adjusted as i64)
    }
}

/// A reference to another parameter's value used to compute a dynamic
/// length in bits.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicLengthReference {
    pub parameter: String,
    pub use_calibrated_value: bool,
    pub linear_adjuster: Option<LinearAdjuster>,
}

impl DynamicLengthReference {
    fn resolve(&self, ctx: &MatchContext) -> Result<usize, ParseError> {
        let value = if self.use_calibrated_value {
            ctx.lookup_f64(&self.parameter, true)
        } else {
            ctx.lookup_f64(&self.parameter, false)
        }
        .ok_or_else(|| {
            ParseError::Match(crate::error::MatchError::UnresolvedOperand(self.parameter.clone()))
        })?;

        let bits = match &self.linear_adjuster {
            Some(adjuster) => adjuster.adjust(value, &self.parameter)?,
            None => value as i64,
        };
        Ok(bits.max(0) as usize)
    }
}

/// How the raw (pre-derived-length) size of a string/binary field is
/// determined.
#[derive(Debug, Clone, PartialEq)]
pub enum RawLengthSpec {
    Fixed(usize),
    DynamicReference(DynamicLengthReference),
    DiscreteLookup(Vec<(MatchCriteria, usize)>),
}

impl RawLengthSpec {
    fn resolve(&self, ctx: &MatchContext) -> Result<usize, ParseError> {
        match self {
            RawLengthSpec::Fixed(bits) => Ok(*bits),
            RawLengthSpec::DynamicReference(reference) => reference.resolve(ctx),
            RawLengthSpec::DiscreteLookup(entries) => {
                for (criteria, bits) in entries {
                    if criteria.evaluate(ctx)? {
                        return Ok(*bits);
                    }
                }
                Err(ParseError::Match(crate::error::MatchError::UnresolvedOperand(
                    "discrete length lookup matched no entry".to_string(),
                )))
            }
        }
    }
}

/// How the final (post-raw-read) length of a string is cut down from the
/// raw buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedLengthSpec {
    /// The first `n` bits of the raw buffer encode the string's derived
    /// length, itself in bits, followed by the string content.
    LeadingSize(usize),
    /// Bytes up to (not including) this byte sequence form the string.
    Termination(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringCharEncoding {
    UsAscii,
    Iso8859_1,
    Windows1252,
    Utf8,
    Utf16,
    Utf16Le,
    Utf16Be,
    Utf32,
    Utf32Le,
    Utf32Be,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    Ieee754,
    Mil1750a,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerDataEncoding {
    pub size_in_bits: usize,
    pub signed: bool,
    pub byte_order: ByteOrder,
    pub calibrators: CalibratorChain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatDataEncoding {
    pub kind: FloatKind,
    pub size_in_bits: usize,
    pub byte_order: ByteOrder,
    pub calibrators: CalibratorChain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringDataEncoding {
    pub char_encoding: StringCharEncoding,
    /// Ignored if set for a single-byte `char_encoding`: accepted for
    /// compatibility with documents that specify it redundantly.
    pub byte_order: Option<ByteOrder>,
    pub raw_length: RawLengthSpec,
    pub derived_length: Option<DerivedLengthSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryDataEncoding {
    pub raw_length: RawLengthSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataEncoding {
    Integer(IntegerDataEncoding),
    Float(FloatDataEncoding),
    String(StringDataEncoding),
    Binary(BinaryDataEncoding),
}

fn to_big_endian(mut bytes: Vec<u8>, byte_order: ByteOrder) -> Vec<u8> {
    if byte_order == ByteOrder::LeastSignificantByteFirst {
        bytes.reverse();
    }
    bytes
}

impl DataEncoding {
    pub fn parse(&self, cursor: &mut BitCursor, ctx: &MatchContext) -> Result<ParameterValue, ParseError> {
        match self {
            DataEncoding::Integer(encoding) => parse_integer(encoding, cursor, ctx),
            DataEncoding::Float(encoding) => parse_float(encoding, cursor, ctx),
            DataEncoding::String(encoding) => parse_string(encoding, cursor, ctx),
            DataEncoding::Binary(encoding) => parse_binary(encoding, cursor, ctx),
        }
    }
}

fn parse_integer(
    encoding: &IntegerDataEncoding,
    cursor: &mut BitCursor,
    ctx: &MatchContext,
) -> Result<ParameterValue, ParseError> {
    let n = encoding.size_in_bits;
    let raw_unsigned = if encoding.byte_order == ByteOrder::MostSignificantByteFirst || n <= 8 {
        cursor.read_int(n)?
    } else {
        // Little-endian multi-byte integer: read the right-justified value
        // the bits actually spell out, then byte-swap *that* value's own
        // minimal-width byte representation, rather than byte-swapping the
        // padded bit buffer (the padding bits are not one of the value's
        // real bytes and must not take part in the swap).
        byte_swap(cursor.read_int(n)?, n.div_ceil(8))
    };

    let raw_signed = if encoding.signed {
        sign_extend(raw_unsigned, n)
    } else {
        raw_unsigned as i64
    };

    let raw = ParsedValue::Int(raw_signed);
    let derived = match encoding.calibrators.calibrate(raw_signed as f64, ctx)? {
        Some(value) => ParsedValue::Float(value),
        None => raw.clone(),
    };
    Ok(ParameterValue::new(derived, raw))
}

/// Reverse the byte order of `value`'s `num_bytes`-wide big-endian
/// representation, e.g. the 12-bit value `0x0ABC` (`num_bytes` = 2) becomes
/// `0xBC0A`.
fn byte_swap(value: u64, num_bytes: usize) -> u64 {
    let mut bytes = vec![0u8; num_bytes];
    let mut remaining = value;
    for byte in bytes.iter_mut().rev() {
        *byte = (remaining & 0xFF) as u8;
        remaining >>= 8;
    }
    bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn sign_extend(value: u64, bits: usize) -> i64 {
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

fn parse_float(
    encoding: &FloatDataEncoding,
    cursor: &mut BitCursor,
    ctx: &MatchContext,
) -> Result<ParameterValue, ParseError> {
    let bytes = cursor.read_bytes(encoding.size_in_bits)?;
    let be = to_big_endian(bytes, encoding.byte_order);

    let raw_value = match encoding.kind {
        FloatKind::Ieee754 => match encoding.size_in_bits {
            32 => f32::from_be_bytes(be.try_into().unwrap()) as f64,
            64 => f64::from_be_bytes(be.try_into().unwrap()),
            16 => half_to_f64(u16::from_be_bytes(be.try_into().unwrap())),
            other => {
                log::warn!("unusual IEEE-754 float width {other} bits; treating as opaque integer bits");
                let mut value: u64 = 0;
                for b in &be {
                    value = (value << 8) | *b as u64;
                }
                value as f64
            }
        },
        FloatKind::Mil1750a => {
            let word = u32::from_be_bytes(be.try_into().unwrap());
            let mantissa_bits = (word >> 8) & 0x00FF_FFFF;
            let mantissa = sign_extend(mantissa_bits as u64, 24);
            let exponent = (word & 0xFF) as i8 as i64;
            mantissa as f64 * 2f64.powi((exponent - 23) as i32)
        }
    };

    let raw = ParsedValue::Float(raw_value);
    let derived = match encoding.calibrators.calibrate(raw_value, ctx)? {
        Some(value) => ParsedValue::Float(value),
        None => raw.clone(),
    };
    Ok(ParameterValue::new(derived, raw))
}

/// Minimal IEEE 754 binary16 -> f64 decoder, used only for the rare
/// half-precision telemetry field.
fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1F) as i32;
    let mantissa = (bits & 0x3FF) as f64;
    if exponent == 0 {
        sign * mantissa * 2f64.powi(-24)
    } else if exponent == 0x1F {
        if mantissa == 0.0 {
            sign * f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        sign * (1.0 + mantissa / 1024.0) * 2f64.powi(exponent - 15)
    }
}

fn parse_string(
    encoding: &StringDataEncoding,
    cursor: &mut BitCursor,
    ctx: &MatchContext,
) -> Result<ParameterValue, ParseError> {
    let raw_bits = encoding.raw_length.resolve(ctx)?;
    let mut raw_bytes = cursor.read_bytes(raw_bits)?;

    let content = if let Some(derived) = &encoding.derived_length {
        match derived {
            DerivedLengthSpec::LeadingSize(size_bits) => {
                let size_bytes = size_bits.div_ceil(8);
                if raw_bytes.len() < size_bytes {
                    return Err(ParseError::MissingTerminator("leading-size string".to_string()));
                }
                let mut length_bits: u64 = 0;
                for b in &raw_bytes[..size_bytes] {
                    length_bits = (length_bits << 8) | *b as u64;
                }
                if length_bits % 8 != 0 {
                    return Err(ParseError::NonByteAlignedLeadingSize { bits: length_bits });
                }
                let content_bytes = (length_bits / 8) as usize;
                let start = size_bytes;
                let end = (start + content_bytes).min(raw_bytes.len());
                raw_bytes[start..end].to_vec()
            }
            DerivedLengthSpec::Termination(terminator) => {
                let position = raw_bytes
                    .windows(terminator.len().max(1))
                    .position(|w| w == terminator.as_slice());
                match position {
                    Some(idx) => raw_bytes[..idx].to_vec(),
                    None => {
                        return Err(ParseError::MissingTerminator(
                            "string termination character not found".to_string(),
                        ))
                    }
                }
            }
        }
    } else {
        std::mem::take(&mut raw_bytes)
    };

    let text = decode_string_bytes(&content, encoding.char_encoding);
    let raw = ParsedValue::Bytes(content);
    let derived = ParsedValue::Str(text);
    Ok(ParameterValue::new(derived, raw))
}

fn decode_string_bytes(bytes: &[u8], encoding: StringCharEncoding) -> String {
    match encoding {
        StringCharEncoding::UsAscii | StringCharEncoding::Iso8859_1 | StringCharEncoding::Windows1252 => {
            bytes.iter().map(|&b| b as char).collect()
        }
        StringCharEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        StringCharEncoding::Utf16 | StringCharEncoding::Utf16Be => {
            decode_utf16(bytes, true)
        }
        StringCharEncoding::Utf16Le => decode_utf16(bytes, false),
        StringCharEncoding::Utf32 | StringCharEncoding::Utf32Be => decode_utf32(bytes, true),
        StringCharEncoding::Utf32Le => decode_utf32(bytes, false),
    }
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| {
            if big_endian {
                u16::from_be_bytes([c[0], c[1]])
            } else {
                u16::from_le_bytes([c[0], c[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

fn decode_utf32(bytes: &[u8], big_endian: bool) -> String {
    bytes
        .chunks_exact(4)
        .filter_map(|c| {
            let code = if big_endian {
                u32::from_be_bytes([c[0], c[1], c[2], c[3]])
            } else {
                u32::from_le_bytes([c[0], c[1], c[2], c[3]])
            };
            char::from_u32(code)
        })
        .collect()
}

fn parse_binary(
    encoding: &BinaryDataEncoding,
    cursor: &mut BitCursor,
    ctx: &MatchContext,
) -> Result<ParameterValue, ParseError> {
    let bits = encoding.raw_length.resolve(ctx)?;
    let bytes = cursor.read_bytes(bits)?;
    Ok(ParameterValue::identity(ParsedValue::Bytes(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_criteria::EmptyLookup;

    fn ctx() -> MatchContext<'static> {
        static LOOKUP: EmptyLookup = EmptyLookup;
        MatchContext::new(&LOOKUP)
    }

    #[test]
    fn signed_16_bit_little_endian() {
        let encoding = IntegerDataEncoding {
            size_in_bits: 16,
            signed: true,
            byte_order: ByteOrder::LeastSignificantByteFirst,
            calibrators: CalibratorChain::default(),
        };
        let mut cursor = BitCursor::new(&[0xD6, 0xFF]);
        let value = parse_integer(&encoding, &mut cursor, &ctx()).unwrap();
        assert_eq!(value.raw, ParsedValue::Int(-42));
    }

    #[test]
    fn unsigned_12_bit_little_endian_non_byte_aligned() {
        let encoding = IntegerDataEncoding {
            size_in_bits: 12,
            signed: false,
            byte_order: ByteOrder::LeastSignificantByteFirst,
            calibrators: CalibratorChain::default(),
        };
        // Top 12 bits spell 0xABC; byte-swapping that value's own 2-byte
        // form (not the padded bit buffer) gives 0xBC0A.
        let mut cursor = BitCursor::new(&[0xAB, 0xC0]);
        let value = parse_integer(&encoding, &mut cursor, &ctx()).unwrap();
        assert_eq!(value.raw, ParsedValue::Int(0xBC0A));
    }

    #[test]
    fn unsigned_8_bit() {
        let encoding = IntegerDataEncoding {
            size_in_bits: 8,
            signed: false,
            byte_order: ByteOrder::MostSignificantByteFirst,
            calibrators: CalibratorChain::default(),
        };
        let mut cursor = BitCursor::new(&[0xFF]);
        let value = parse_integer(&encoding, &mut cursor, &ctx()).unwrap();
        assert_eq!(value.raw, ParsedValue::Int(255));
    }

    #[test]
    fn ieee754_f32_big_endian() {
        let encoding = FloatDataEncoding {
            kind: FloatKind::Ieee754,
            size_in_bits: 32,
            byte_order: ByteOrder::MostSignificantByteFirst,
            calibrators: CalibratorChain::default(),
        };
        let bytes = 3.14f32.to_be_bytes();
        let mut cursor = BitCursor::new(&bytes);
        let value = parse_float(&encoding, &mut cursor, &ctx()).unwrap();
        match value.raw {
            ParsedValue::Float(f) => assert!((f - 3.14).abs() < 1e-6),
            _ => panic!("expected float"),
        }
    }

    #[test]
    fn fixed_length_ascii_string() {
        let encoding = StringDataEncoding {
            char_encoding: StringCharEncoding::UsAscii,
            byte_order: None,
            raw_length: RawLengthSpec::Fixed(32),
            derived_length: None,
        };
        let mut cursor = BitCursor::new(b"ABCD");
        let value = parse_string(&encoding, &mut cursor, &ctx()).unwrap();
        assert_eq!(value.derived, ParsedValue::Str("ABCD".to_string()));
    }

    #[test]
    fn terminated_string_stops_at_null() {
        let encoding = StringDataEncoding {
            char_encoding: StringCharEncoding::UsAscii,
            byte_order: None,
            raw_length: RawLengthSpec::Fixed(64),
            derived_length: Some(DerivedLengthSpec::Termination(vec![0u8])),
        };
        let mut cursor = BitCursor::new(b"HI\x00\x00\x00\x00\x00\x00");
        let value = parse_string(&encoding, &mut cursor, &ctx()).unwrap();
        assert_eq!(value.derived, ParsedValue::Str("HI".to_string()));
    }

    #[test]
    fn leading_size_field_is_interpreted_as_bits_not_bytes() {
        let encoding = StringDataEncoding {
            char_encoding: StringCharEncoding::UsAscii,
            byte_order: None,
            raw_length: RawLengthSpec::Fixed(64),
            derived_length: Some(DerivedLengthSpec::LeadingSize(8)),
        };
        // Leading byte declares 24 bits (3 bytes) of content, not 24 bytes.
        let mut cursor = BitCursor::new(&[24, b'H', b'I', b'!', 0, 0, 0, 0]);
        let value = parse_string(&encoding, &mut cursor, &ctx()).unwrap();
        assert_eq!(value.derived, ParsedValue::Str("HI!".to_string()));
    }

    #[test]
    fn leading_size_field_not_a_whole_number_of_bytes_errors() {
        let encoding = StringDataEncoding {
            char_encoding: StringCharEncoding::UsAscii,
            byte_order: None,
            raw_length: RawLengthSpec::Fixed(64),
            derived_length: Some(DerivedLengthSpec::LeadingSize(8)),
        };
        let mut cursor = BitCursor::new(&[20, b'H', b'I', b'!', 0, 0, 0, 0]);
        assert!(parse_string(&encoding, &mut cursor, &ctx()).is_err());
    }

    #[test]
    fn missing_terminator_errors() {
        let encoding = StringDataEncoding {
            char_encoding: StringCharEncoding::UsAscii,
            byte_order: None,
            raw_length: RawLengthSpec::Fixed(32),
            derived_length: Some(DerivedLengthSpec::Termination(vec![0u8])),
        };
        let mut cursor = BitCursor::new(b"ABCD");
        assert!(parse_string(&encoding, &mut cursor, &ctx()).is_err());
    }

    #[test]
    fn binary_fixed_length() {
        let encoding = BinaryDataEncoding {
            raw_length: RawLengthSpec::Fixed(16),
        };
        let mut cursor = BitCursor::new(&[0xAB, 0xCD]);
        let value = parse_binary(&encoding, &mut cursor, &ctx()).unwrap();
        assert_eq!(value.raw, ParsedValue::Bytes(vec![0xAB, 0xCD]));
    }
}
