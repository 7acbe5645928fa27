//! Error taxonomy for the decoder.
//!
//! Each subsystem defines its own narrow error enum; `Error` widens them at
//! the crate boundary via `#[from]`. Internal code should propagate the
//! narrow type with `?` and let the public API do the widening.

use thiserror::Error;

/// Errors raised by [`crate::bitcursor::BitCursor`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BitCursorError {
    /// Attempted to read past the end of the underlying buffer.
    #[error("attempted to read {requested} bits at offset {offset}, but only {available} bits remain")]
    EndOfData {
        offset: usize,
        requested: usize,
        available: usize,
    },

    /// Requested more than 64 bits for an integer read.
    #[error("cannot read {0} bits into a 64-bit integer")]
    IntegerTooWide(usize),
}

/// Errors raised while framing packets out of a byte source.
#[derive(Debug, Error)]
pub enum FramerError {
    #[error("io error while reading packet stream")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    BitCursor(#[from] BitCursorError),
}

/// Errors raised while loading or serializing an XTCE definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("xml parse error: {0}")]
    Xml(String),

    #[error("{element} is missing required child or attribute {field}")]
    MissingElement { element: String, field: String },

    #[error("unknown parameter type element {0}")]
    UnknownParameterType(String),

    #[error("unsupported xtce feature: {0}")]
    UnsupportedXtce(String),

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} {name} references unresolved {referenced_kind} {reference}")]
    UnresolvedReference {
        kind: &'static str,
        name: String,
        referenced_kind: &'static str,
        reference: String,
    },
}

/// Errors raised while evaluating calibrators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("spline calibrator queried at {value} outside range [{min}, {max}] and extrapolation is disabled")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("spline calibrator of order {0} is not supported")]
    UnsupportedOrder(u8),

    #[error("calibrator has no points")]
    EmptySpline,
}

/// Errors raised while evaluating match criteria.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("comparison references parameter {0}, which has not been parsed and has no fallback current value")]
    UnresolvedOperand(String),

    #[error("could not coerce required value {literal:?} to compare against parameter {parameter}")]
    CoercionFailed { parameter: String, literal: String },

    #[error("unsupported match criteria operator: {0}")]
    UnsupportedOperator(String),
}

/// Errors raised while decoding an individual packet's parameters.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    BitCursor(#[from] BitCursorError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("raw value {raw:?} of parameter {parameter} has no enumeration label")]
    EnumLookup { parameter: String, raw: String },

    #[error("packet did not match any concrete container starting from {root}")]
    UnrecognizedPacketType { root: String },

    #[error("string encoding terminator not found in raw buffer for parameter {0}")]
    MissingTerminator(String),

    #[error("linear adjuster on {parameter} produced a non-integral length {value}")]
    NonIntegralAdjustedLength { parameter: String, value: f64 },

    #[error("leading-size string length field encodes {bits} bits, which is not a whole number of bytes")]
    NonByteAlignedLeadingSize { bits: u64 },
}

/// The crate-wide error type. Internal modules use their own narrower error
/// enums above and rely on `?` to widen into this one at public API
/// boundaries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    BitCursor(#[from] BitCursorError),

    #[error(transparent)]
    Framer(#[from] FramerError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
