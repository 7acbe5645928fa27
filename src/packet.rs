//! The decoded packet value model: an insertion-ordered mapping from
//! parameter name to parsed value, backed by the packet's raw bytes.

use std::collections::HashMap;

use crate::bitcursor::BitCursor;
use crate::ccsds::RawPacketBytes;
use crate::match_criteria::ValueLookup;
use crate::value::{ParameterValue, ParsedValue};

/// A single decoded packet: its raw bytes, and the parameter values decoded
/// from it so far, in the order they were inserted.
///
/// Insertion order is preserved with a plain `Vec`; a `HashMap` alongside it
/// gives name lookups their expected O(1) cost without pulling in an
/// indexmap-style dependency for a single small collection.
#[derive(Debug, Clone)]
pub struct Packet {
    raw: RawPacketBytes,
    order: Vec<String>,
    values: HashMap<String, ParameterValue>,
}

impl Packet {
    pub fn new(raw: RawPacketBytes) -> Self {
        Packet {
            raw,
            order: Vec::new(),
            values: HashMap::new(),
        }
    }

    pub fn raw_bytes(&self) -> &RawPacketBytes {
        &self.raw
    }

    pub fn cursor(&self) -> BitCursor {
        self.raw.cursor()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        let name = name.into();
        if !self.values.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn raw(&self, name: &str) -> Option<&ParsedValue> {
        self.values.get(name).map(|v| &v.raw)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.order.iter().map(move |name| (name.as_str(), &self.values[name]))
    }

    /// The calendar timestamp of a time-typed parameter, if `name` names
    /// one and its derived value is interpretable as seconds since the
    /// UNIX epoch.
    pub fn time_value(&self, name: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        let value = self.values.get(name)?;
        let seconds = value.derived.as_f64()?;
        chrono::DateTime::from_timestamp(seconds as i64, 0)
    }
}

impl ValueLookup for Packet {
    fn lookup(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParsedValue;

    #[test]
    fn insertion_order_is_preserved() {
        let raw = RawPacketBytes::new(vec![0u8; 7]);
        let mut packet = Packet::new(raw);
        packet.insert("B", ParameterValue::identity(ParsedValue::Int(2)));
        packet.insert("A", ParameterValue::identity(ParsedValue::Int(1)));
        let names: Vec<&str> = packet.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
