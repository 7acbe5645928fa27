//! The tagged-union value type produced by parsing a single parameter.

/// A decoded parameter value, either raw (straight off the wire) or derived
/// (after calibration / enumeration lookup / boolean coercion).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParsedValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl ParsedValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParsedValue::Int(v) => Some(*v),
            ParsedValue::Float(v) => Some(*v as i64),
            ParsedValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParsedValue::Int(v) => Some(*v as f64),
            ParsedValue::Float(v) => Some(*v),
            ParsedValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParsedValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ParsedValue::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParsedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParsedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedValue::Int(v) => write!(f, "{v}"),
            ParsedValue::Float(v) => write!(f, "{v}"),
            ParsedValue::Str(v) => write!(f, "{v}"),
            ParsedValue::Bytes(v) => write!(f, "{}", hex_string(v)),
            ParsedValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A parsed value paired with the pre-calibration / pre-lookup value it was
/// derived from. The raw value's variant may differ from the derived
/// value's (e.g. an enumerated parameter's raw value is `Int`, its derived
/// value is `Str`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterValue {
    pub derived: ParsedValue,
    pub raw: ParsedValue,
}

impl ParameterValue {
    pub fn new(derived: ParsedValue, raw: ParsedValue) -> Self {
        ParameterValue { derived, raw }
    }

    /// Convenience constructor for encodings with no calibration step,
    /// where the derived value equals the raw value.
    pub fn identity(value: ParsedValue) -> Self {
        ParameterValue {
            derived: value.clone(),
            raw: value,
        }
    }
}
