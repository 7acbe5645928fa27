//! Loads and serializes XTCE packet definitions.
//!
//! The three-pass loading strategy (parameter types, then parameters, then
//! sequence containers with a back-populating inheritor pass) is grounded
//! on the layered `MissionDatabase` construction in the `other_examples`
//! XTCE prototype (`proc/mod.rs`). Reading and writing both go through
//! `quick-xml`, the same crate `MarcoBelluDev-can_tools` uses for its ARXML
//! reader/writer split, chosen here specifically because it supports
//! writing as well as reading (unlike the sibling prototype's `roxmltree`),
//! which this crate's definition round-trip property requires.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::calibrators::{Calibrator, PolynomialCoefficient, SplinePoint};
use crate::containers::{Entry, SequenceContainer};
use crate::encodings::{
    BinaryDataEncoding, ByteOrder, CalibratorChain, DataEncoding, DerivedLengthSpec,
    DynamicLengthReference, FloatDataEncoding, FloatKind, IntegerDataEncoding, LinearAdjuster,
    RawLengthSpec, StringCharEncoding, StringDataEncoding,
};
use crate::error::DefinitionError;
use crate::match_criteria::{BooleanExpression, Comparison, Condition, ConditionOperand, MatchCriteria, Operator};
use crate::ordered_map::OrderedMap;
use crate::parameter_types::{
    AbsoluteTimeParameterType, BinaryParameterType, BooleanParameterType, EnumKey, EnumeratedParameterType,
    Epoch, FloatParameterType, IntegerParameterType, ParameterType, RelativeTimeParameterType,
    StringParameterType,
};
use crate::xmltree::{self, Element};

/// The XTCE 1.2 namespace URI, used as the default when a document does not
/// specify one. Documents in other XTCE versions are still accepted, since
/// parsing here is namespace-prefix-agnostic (see `xmltree`).
pub const DEFAULT_XTCE_NAMESPACE: &str = "http://www.omg.org/spec/XTCE/20180204";

pub const DEFAULT_ROOT_CONTAINER: &str = "CCSDSPacket";

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub parameter_type_ref: String,
    pub short_description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionMetadata {
    pub space_system_name: String,
    pub namespace_uri: String,
    pub schema_version: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
}

/// An in-memory XTCE packet definition: parameter types, parameters, and
/// sequence containers, each in document order.
#[derive(Debug, Clone)]
pub struct Definition {
    pub parameter_types: OrderedMap<ParameterType>,
    pub parameters: OrderedMap<Parameter>,
    pub sequence_containers: OrderedMap<SequenceContainer>,
    pub root_container_name: String,
    pub metadata: DefinitionMetadata,
}

impl Definition {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn parameter_type(&self, name: &str) -> Option<&ParameterType> {
        self.parameter_types.get(name)
    }

    pub fn container(&self, name: &str) -> Option<&SequenceContainer> {
        self.sequence_containers.get(name)
    }

    pub fn root_container(&self) -> Option<&SequenceContainer> {
        self.sequence_containers.get(&self.root_container_name)
    }

    pub fn from_xtce_str(xml: &str) -> Result<Self, DefinitionError> {
        let root = xmltree::parse(xml)?;
        load(&root)
    }

    pub fn to_xtce_string(&self) -> Result<String, DefinitionError> {
        let element = build_space_system(self);
        write_document(&element)
    }
}

fn missing(element: &str, field: &str) -> DefinitionError {
    DefinitionError::MissingElement {
        element: element.to_string(),
        field: field.to_string(),
    }
}

fn required_attr<'a>(el: &'a Element, field: &str) -> Result<&'a str, DefinitionError> {
    el.attr(field).ok_or_else(|| missing(&el.tag, field))
}

// ---------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------

fn load(root: &Element) -> Result<Definition, DefinitionError> {
    if root.tag != "SpaceSystem" {
        return Err(missing("SpaceSystem", "root element"));
    }

    let mut metadata = DefinitionMetadata {
        space_system_name: root.attr("name").unwrap_or_default().to_string(),
        namespace_uri: DEFAULT_XTCE_NAMESPACE.to_string(),
        ..Default::default()
    };
    if let Some(header) = root.child("Header") {
        metadata.schema_version = header.attr("version").map(str::to_string);
        metadata.date = header.attr("date").map(str::to_string);
        metadata.author = header.attr("author").map(str::to_string);
    }

    let telemetry_metadata = root
        .child("TelemetryMetaData")
        .ok_or_else(|| missing("SpaceSystem", "TelemetryMetaData"))?;

    let mut parameter_types = OrderedMap::new();
    if let Some(set) = telemetry_metadata.child("ParameterTypeSet") {
        for child in &set.children {
            let parameter_type = parse_parameter_type(child)?;
            let name = parameter_type.name().to_string();
            parameter_types
                .try_insert(name.clone(), parameter_type)
                .map_err(|name| DefinitionError::DuplicateName { kind: "parameter type", name })?;
        }
    }

    let mut parameters = OrderedMap::new();
    if let Some(set) = telemetry_metadata.child("ParameterSet") {
        for child in set.children_named("Parameter") {
            let name = required_attr(child, "name")?.to_string();
            let parameter_type_ref = required_attr(child, "parameterTypeRef")?.to_string();
            if !parameter_types.contains_key(&parameter_type_ref) {
                return Err(DefinitionError::UnresolvedReference {
                    kind: "parameter",
                    name: name.clone(),
                    referenced_kind: "parameter type",
                    reference: parameter_type_ref.clone(),
                });
            }
            let short_description = child.attr("shortDescription").map(str::to_string);
            parameters
                .try_insert(
                    name.clone(),
                    Parameter {
                        name,
                        parameter_type_ref,
                        short_description,
                    },
                )
                .map_err(|name| DefinitionError::DuplicateName { kind: "parameter", name })?;
        }
    }

    let mut sequence_containers = OrderedMap::new();
    let mut root_container_name = DEFAULT_ROOT_CONTAINER.to_string();
    if let Some(set) = telemetry_metadata.child("ContainerSet") {
        if let Some(explicit_root) = set.attr("root") {
            root_container_name = explicit_root.to_string();
        }
        for child in set.children_named("SequenceContainer") {
            let container = parse_sequence_container(child)?;
            let name = container.name.clone();
            sequence_containers
                .try_insert(name.clone(), container)
                .map_err(|name| DefinitionError::DuplicateName { kind: "sequence container", name })?;
        }
    }

    // Verify base-container references and back-populate inheritors.
    let links: Vec<(String, String)> = sequence_containers
        .iter()
        .filter_map(|(name, c)| c.base_container_name.clone().map(|base| (name.to_string(), base)))
        .collect();
    for (name, base) in links {
        if !sequence_containers.contains_key(&base) {
            return Err(DefinitionError::UnresolvedReference {
                kind: "sequence container",
                name: name.clone(),
                referenced_kind: "base container",
                reference: base,
            });
        }
        let base_container = sequence_containers.get_mut(&base).unwrap();
        base_container.inheritors.push(name);
    }

    // Verify entry-list references against the now-fully-populated parameter
    // and container sets.
    for name in sequence_containers.keys().map(str::to_string).collect::<Vec<_>>() {
        let container = sequence_containers.get(&name).unwrap();
        for entry in &container.entry_list {
            match entry {
                Entry::Parameter(parameter_name) if !parameters.contains_key(parameter_name) => {
                    return Err(DefinitionError::UnresolvedReference {
                        kind: "sequence container",
                        name,
                        referenced_kind: "parameter",
                        reference: parameter_name.clone(),
                    });
                }
                Entry::Container(container_name) if !sequence_containers.contains_key(container_name) => {
                    return Err(DefinitionError::UnresolvedReference {
                        kind: "sequence container",
                        name,
                        referenced_kind: "sequence container",
                        reference: container_name.clone(),
                    });
                }
                _ => {}
            }
        }
    }

    Ok(Definition {
        parameter_types,
        parameters,
        sequence_containers,
        root_container_name,
        metadata,
    })
}

fn parse_parameter_type(el: &Element) -> Result<ParameterType, DefinitionError> {
    let name = required_attr(el, "name")?.to_string();
    match el.tag.as_str() {
        "StringParameterType" => Ok(ParameterType::String(StringParameterType {
            name,
            encoding: parse_data_encoding(el)?,
        })),
        "IntegerParameterType" => Ok(ParameterType::Integer(IntegerParameterType {
            name,
            encoding: parse_data_encoding(el)?,
        })),
        "FloatParameterType" => Ok(ParameterType::Float(FloatParameterType {
            name,
            encoding: parse_data_encoding(el)?,
        })),
        "BinaryParameterType" => Ok(ParameterType::Binary(BinaryParameterType {
            name,
            encoding: parse_data_encoding(el)?,
        })),
        "BooleanParameterType" => Ok(ParameterType::Boolean(BooleanParameterType {
            name,
            encoding: parse_data_encoding(el)?,
        })),
        "EnumeratedParameterType" => {
            let encoding = parse_data_encoding(el)?;
            let mut enumeration = std::collections::HashMap::new();
            if let Some(list) = el.child("EnumerationList") {
                for entry in list.children_named("Enumeration") {
                    let value = required_attr(entry, "value")?;
                    let label = required_attr(entry, "label")?.to_string();
                    let key = value
                        .parse::<i64>()
                        .map_err(|_| missing("Enumeration", "value (expected integer)"))?;
                    enumeration.insert(EnumKey::Int(key), label);
                }
            }
            Ok(ParameterType::Enumerated(EnumeratedParameterType {
                name,
                encoding,
                enumeration,
            }))
        }
        "AbsoluteTimeParameterType" => {
            let encoding = parse_data_encoding(el)?;
            let reference_time = el.child("ReferenceTime");
            let epoch = reference_time
                .and_then(|rt| rt.child("Epoch"))
                .and_then(|e| parse_epoch(&e.text));
            let offset_from = reference_time.and_then(parse_offset_from);
            let scale_offset = el.child("Scale").map(parse_scale_element).transpose()?;
            Ok(ParameterType::AbsoluteTime(AbsoluteTimeParameterType {
                name,
                encoding,
                epoch,
                scale_offset,
                offset_from,
            }))
        }
        "RelativeTimeParameterType" => {
            let encoding = parse_data_encoding(el)?;
            let offset_from = el.child("ReferenceTime").and_then(parse_offset_from);
            let scale_offset = el.child("Scale").map(parse_scale_element).transpose()?;
            Ok(ParameterType::RelativeTime(RelativeTimeParameterType {
                name,
                encoding,
                scale_offset,
                offset_from,
            }))
        }
        "ArrayParameterType" | "AggregateParameterType" => {
            Err(DefinitionError::UnsupportedXtce(el.tag.clone()))
        }
        other => Err(DefinitionError::UnknownParameterType(other.to_string())),
    }
}

fn parse_offset_from(reference_time: &Element) -> Option<String> {
    reference_time
        .child("OffsetFrom")
        .and_then(|o| o.attr("parameterRef"))
        .map(String::from)
}

fn parse_epoch(text: &str) -> Option<Epoch> {
    let text = text.trim();
    match text {
        "TAI" => Some(Epoch::Tai),
        "J2000" => Some(Epoch::J2000),
        "UNIX" => Some(Epoch::Unix),
        "POSIX" => Some(Epoch::Posix),
        "GPS" => Some(Epoch::Gps),
        other => match chrono::DateTime::parse_from_rfc3339(other)
            .map(|dt| dt.timestamp() as f64)
            .or_else(|_| {
                chrono::NaiveDate::parse_from_str(other, "%Y-%m-%d")
                    .map(|date| date.and_hms_opt(0, 0, 0).expect("midnight is a valid time").and_utc().timestamp() as f64)
            }) {
            Ok(seconds) => Some(Epoch::Literal(seconds)),
            Err(_) => {
                log::warn!("unsupported literal epoch {other:?}; time values will not include an epoch offset");
                None
            }
        },
    }
}

fn parse_scale_element(el: &Element) -> Result<Calibrator, DefinitionError> {
    let slope: f64 = el.attr("slope").unwrap_or("1").parse().unwrap_or(1.0);
    let offset: f64 = el.attr("offset").unwrap_or("0").parse().unwrap_or(0.0);
    Ok(Calibrator::Polynomial(vec![
        PolynomialCoefficient { coefficient: offset, exponent: 0 },
        PolynomialCoefficient { coefficient: slope, exponent: 1 },
    ]))
}

const ENCODING_TAGS: [&str; 4] = [
    "IntegerDataEncoding",
    "FloatDataEncoding",
    "StringDataEncoding",
    "BinaryDataEncoding",
];

fn find_encoding_element(parent: &Element) -> Option<&Element> {
    ENCODING_TAGS.iter().find_map(|tag| parent.child(tag))
}

fn parse_data_encoding(parent: &Element) -> Result<DataEncoding, DefinitionError> {
    let el = find_encoding_element(parent).ok_or_else(|| missing(&parent.tag, "a *DataEncoding child"))?;
    match el.tag.as_str() {
        "IntegerDataEncoding" => parse_integer_encoding(el).map(DataEncoding::Integer),
        "FloatDataEncoding" => parse_float_encoding(el).map(DataEncoding::Float),
        "StringDataEncoding" => parse_string_encoding(el).map(DataEncoding::String),
        "BinaryDataEncoding" => parse_binary_encoding(el).map(DataEncoding::Binary),
        other => Err(DefinitionError::UnsupportedXtce(other.to_string())),
    }
}

fn parse_byte_order(el: &Element) -> ByteOrder {
    match el.attr("byteOrder") {
        Some("leastSignificantByteFirst") => ByteOrder::LeastSignificantByteFirst,
        _ => ByteOrder::MostSignificantByteFirst,
    }
}

fn parse_integer_encoding(el: &Element) -> Result<IntegerDataEncoding, DefinitionError> {
    let size_in_bits: usize = required_attr(el, "sizeInBits")?
        .parse()
        .map_err(|_| missing(&el.tag, "sizeInBits (expected integer)"))?;
    let signed = matches!(el.attr("encoding"), Some("signed") | Some("twosComplement") | None);
    let byte_order = parse_byte_order(el);
    let calibrators = parse_calibrator_chain(el)?;
    Ok(IntegerDataEncoding {
        size_in_bits,
        signed,
        byte_order,
        calibrators,
    })
}

fn parse_float_encoding(el: &Element) -> Result<FloatDataEncoding, DefinitionError> {
    let size_in_bits: usize = required_attr(el, "sizeInBits")?
        .parse()
        .map_err(|_| missing(&el.tag, "sizeInBits (expected integer)"))?;
    let kind = match el.attr("encoding").unwrap_or("IEEE754") {
        "IEEE754" => FloatKind::Ieee754,
        "IEEE-754" => {
            log::warn!("FloatDataEncoding uses deprecated alias \"IEEE-754\"; prefer \"IEEE754\"");
            FloatKind::Ieee754
        }
        "MILSTD_1750A" => FloatKind::Mil1750a,
        "MIL-1750A" => {
            log::warn!("FloatDataEncoding uses deprecated alias \"MIL-1750A\"; prefer \"MILSTD_1750A\"");
            FloatKind::Mil1750a
        }
        other => return Err(DefinitionError::UnsupportedXtce(format!("float encoding {other}"))),
    };
    let byte_order = parse_byte_order(el);
    let calibrators = parse_calibrator_chain(el)?;
    Ok(FloatDataEncoding {
        kind,
        size_in_bits,
        byte_order,
        calibrators,
    })
}

fn parse_char_encoding(name: &str) -> Result<StringCharEncoding, DefinitionError> {
    Ok(match name {
        "US-ASCII" => StringCharEncoding::UsAscii,
        "ISO-8859-1" => StringCharEncoding::Iso8859_1,
        "Windows-1252" => StringCharEncoding::Windows1252,
        "UTF-8" => StringCharEncoding::Utf8,
        "UTF-16" => StringCharEncoding::Utf16,
        "UTF-16LE" => StringCharEncoding::Utf16Le,
        "UTF-16BE" => StringCharEncoding::Utf16Be,
        "UTF-32" => StringCharEncoding::Utf32,
        "UTF-32LE" => StringCharEncoding::Utf32Le,
        "UTF-32BE" => StringCharEncoding::Utf32Be,
        other => return Err(DefinitionError::UnsupportedXtce(format!("string char encoding {other}"))),
    })
}

fn char_encoding_name(encoding: StringCharEncoding) -> &'static str {
    match encoding {
        StringCharEncoding::UsAscii => "US-ASCII",
        StringCharEncoding::Iso8859_1 => "ISO-8859-1",
        StringCharEncoding::Windows1252 => "Windows-1252",
        StringCharEncoding::Utf8 => "UTF-8",
        StringCharEncoding::Utf16 => "UTF-16",
        StringCharEncoding::Utf16Le => "UTF-16LE",
        StringCharEncoding::Utf16Be => "UTF-16BE",
        StringCharEncoding::Utf32 => "UTF-32",
        StringCharEncoding::Utf32Le => "UTF-32LE",
        StringCharEncoding::Utf32Be => "UTF-32BE",
    }
}

fn parse_raw_length(size_el: &Element) -> Result<RawLengthSpec, DefinitionError> {
    if let Some(fixed) = size_el.child("Fixed") {
        let value_el = fixed.child("FixedValue").ok_or_else(|| missing("Fixed", "FixedValue"))?;
        let bits: usize = value_el
            .text
            .trim()
            .parse()
            .map_err(|_| missing("FixedValue", "integer text content"))?;
        return Ok(RawLengthSpec::Fixed(bits));
    }
    if let Some(dynamic) = size_el.child("DynamicValue") {
        let reference_el = dynamic
            .child("ParameterInstanceRef")
            .ok_or_else(|| missing("DynamicValue", "ParameterInstanceRef"))?;
        let parameter = required_attr(reference_el, "parameterRef")?.to_string();
        let use_calibrated_value = reference_el.attr("useCalibratedValue").unwrap_or("true") == "true";
        let linear_adjuster = dynamic.child("LinearAdjustment").map(|adj| LinearAdjuster {
            slope: adj.attr("slope").unwrap_or("0").parse().unwrap_or(0.0),
            intercept: adj.attr("intercept").unwrap_or("0").parse().unwrap_or(0.0),
        });
        return Ok(RawLengthSpec::DynamicReference(DynamicLengthReference {
            parameter,
            use_calibrated_value,
            linear_adjuster,
        }));
    }
    if let Some(list) = size_el.child("DiscreteLookupList") {
        let mut entries = Vec::new();
        for lookup in list.children_named("DiscreteLookup") {
            let bits: usize = required_attr(lookup, "value")?
                .parse()
                .map_err(|_| missing("DiscreteLookup", "value (expected integer)"))?;
            let criteria = parse_match_criteria_from_parent(lookup)?;
            entries.push((criteria, bits));
        }
        return Ok(RawLengthSpec::DiscreteLookup(entries));
    }
    Err(missing("SizeInBits", "Fixed, DynamicValue, or DiscreteLookupList"))
}

fn parse_string_encoding(el: &Element) -> Result<StringDataEncoding, DefinitionError> {
    let char_encoding = parse_char_encoding(el.attr("encoding").unwrap_or("UTF-8"))?;
    let byte_order = el.attr("byteOrder").map(|_| parse_byte_order(el));
    let size_el = el.child("SizeInBits").ok_or_else(|| missing("StringDataEncoding", "SizeInBits"))?;
    let raw_length = parse_raw_length(size_el)?;

    let derived_length = match el.child("Variable") {
        Some(variable) => {
            if let Some(term) = variable.child("TerminationChar") {
                let bytes = hex_decode(term.text.trim())
                    .ok_or_else(|| missing("TerminationChar", "hex-encoded byte text"))?;
                Some(DerivedLengthSpec::Termination(bytes))
            } else if let Some(leading) = variable.child("LeadingSize") {
                let bits: usize = required_attr(leading, "sizeInBitsOfSizeTag")?
                    .parse()
                    .map_err(|_| missing("LeadingSize", "sizeInBitsOfSizeTag (expected integer)"))?;
                Some(DerivedLengthSpec::LeadingSize(bits))
            } else {
                None
            }
        }
        None => None,
    };

    Ok(StringDataEncoding {
        char_encoding,
        byte_order,
        raw_length,
        derived_length,
    })
}

fn parse_binary_encoding(el: &Element) -> Result<BinaryDataEncoding, DefinitionError> {
    let size_el = el.child("SizeInBits").ok_or_else(|| missing("BinaryDataEncoding", "SizeInBits"))?;
    let raw_length = parse_raw_length(size_el)?;
    Ok(BinaryDataEncoding { raw_length })
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn parse_calibrator_chain(parent: &Element) -> Result<CalibratorChain, DefinitionError> {
    let default_calibrator = match parent.child("DefaultCalibrator") {
        Some(wrapper) => Some(parse_calibrator_body(wrapper)?),
        None => None,
    };
    let mut context_calibrators = Vec::new();
    if let Some(list) = parent.child("ContextCalibratorList") {
        for entry in list.children_named("ContextCalibrator") {
            let match_el = entry.child("ContextMatch").ok_or_else(|| missing("ContextCalibrator", "ContextMatch"))?;
            let match_criteria = parse_match_criteria_from_parent(match_el)?;
            let calibrator_wrapper = entry.child("Calibrator").ok_or_else(|| missing("ContextCalibrator", "Calibrator"))?;
            let calibrator = parse_calibrator_body(calibrator_wrapper)?;
            context_calibrators.push(Calibrator::Context {
                match_criteria,
                calibrator: Box::new(calibrator),
            });
        }
    }
    Ok(CalibratorChain {
        context_calibrators,
        default_calibrator,
    })
}

fn parse_calibrator_body(wrapper: &Element) -> Result<Calibrator, DefinitionError> {
    if let Some(poly) = wrapper.child("PolynomialCalibrator") {
        return parse_polynomial_calibrator(poly);
    }
    if let Some(spline) = wrapper.child("SplineCalibrator") {
        return parse_spline_calibrator(spline);
    }
    if let Some(_math) = wrapper.child("MathOperationCalibrator") {
        return Err(DefinitionError::UnsupportedXtce("MathOperationCalibrator".to_string()));
    }
    Err(missing(&wrapper.tag, "PolynomialCalibrator or SplineCalibrator"))
}

fn parse_polynomial_calibrator(el: &Element) -> Result<Calibrator, DefinitionError> {
    let mut coefficients = Vec::new();
    for term in el.children_named("Term") {
        let coefficient: f64 = required_attr(term, "coefficient")?
            .parse()
            .map_err(|_| missing("Term", "coefficient (expected number)"))?;
        let exponent: i32 = required_attr(term, "exponent")?
            .parse()
            .map_err(|_| missing("Term", "exponent (expected integer)"))?;
        coefficients.push(PolynomialCoefficient { coefficient, exponent });
    }
    Ok(Calibrator::Polynomial(coefficients))
}

fn parse_spline_calibrator(el: &Element) -> Result<Calibrator, DefinitionError> {
    let order: u8 = el.attr("order").unwrap_or("0").parse().unwrap_or(0);
    let extrapolate = el.attr("extrapolate").unwrap_or("false") == "true";
    let mut points = Vec::new();
    for point in el.children_named("SplinePoint") {
        let raw: f64 = required_attr(point, "raw")?
            .parse()
            .map_err(|_| missing("SplinePoint", "raw (expected number)"))?;
        let calibrated: f64 = required_attr(point, "calibrated")?
            .parse()
            .map_err(|_| missing("SplinePoint", "calibrated (expected number)"))?;
        points.push(SplinePoint { raw, calibrated });
    }
    Ok(Calibrator::new_spline(points, order, extrapolate))
}

fn parse_match_criteria_single(el: &Element) -> Result<MatchCriteria, DefinitionError> {
    match el.tag.as_str() {
        "Comparison" => Ok(MatchCriteria::Comparison(parse_comparison(el)?)),
        "ComparisonList" => {
            let mut comparisons = Vec::new();
            for child in el.children_named("Comparison") {
                comparisons.push(parse_comparison(child)?);
            }
            Ok(MatchCriteria::ComparisonList(comparisons))
        }
        "Condition" => Ok(MatchCriteria::Condition(parse_condition(el)?)),
        "BooleanExpression" => Ok(MatchCriteria::BooleanExpression(parse_boolean_expression(el)?)),
        other => Err(DefinitionError::UnsupportedXtce(format!("match criteria element {other}"))),
    }
}

/// Collects every recognized match-criteria child of `parent` (a
/// `RestrictionCriteria` or `ContextMatch` element). Multiple children are
/// implicitly ANDed, matching how XTCE treats a restriction criteria's
/// sibling comparisons.
fn parse_match_criteria_from_parent(parent: &Element) -> Result<MatchCriteria, DefinitionError> {
    let mut criteria = Vec::new();
    for child in &parent.children {
        if matches!(child.tag.as_str(), "Comparison" | "ComparisonList" | "Condition" | "BooleanExpression") {
            criteria.push(parse_match_criteria_single(child)?);
        }
    }
    match criteria.len() {
        0 => Err(missing(&parent.tag, "a Comparison, ComparisonList, Condition, or BooleanExpression")),
        1 => Ok(criteria.into_iter().next().unwrap()),
        _ => Ok(MatchCriteria::BooleanExpression(BooleanExpression::Anded(
            criteria.into_iter().map(as_boolean_expression).collect(),
        ))),
    }
}

fn as_boolean_expression(criteria: MatchCriteria) -> BooleanExpression {
    match criteria {
        MatchCriteria::BooleanExpression(expr) => expr,
        MatchCriteria::Condition(condition) => BooleanExpression::Leaf(condition),
        MatchCriteria::Comparison(comparison) => BooleanExpression::Leaf(comparison_as_condition(comparison)),
        MatchCriteria::ComparisonList(list) => BooleanExpression::Anded(
            list.into_iter().map(comparison_as_condition).map(BooleanExpression::Leaf).collect(),
        ),
    }
}

fn comparison_as_condition(comparison: Comparison) -> Condition {
    Condition {
        lhs: ConditionOperand::Parameter {
            name: comparison.referenced_parameter,
            use_calibrated_value: comparison.use_calibrated_value,
        },
        operator: comparison.operator,
        rhs: ConditionOperand::Literal(comparison.required_value),
    }
}

fn parse_comparison(el: &Element) -> Result<Comparison, DefinitionError> {
    let referenced_parameter = required_attr(el, "parameterRef")?.to_string();
    let required_value = required_attr(el, "value")?.to_string();
    let operator = Operator::parse(el.attr("comparisonOperator").unwrap_or("=="))
        .map_err(|e| DefinitionError::Xml(e.to_string()))?;
    let use_calibrated_value = el.attr("useCalibratedValue").unwrap_or("true") == "true";
    Ok(Comparison {
        referenced_parameter,
        operator,
        required_value,
        use_calibrated_value,
    })
}

fn parse_condition(el: &Element) -> Result<Condition, DefinitionError> {
    let refs: Vec<&Element> = el.children_named("ParameterInstanceRef").collect();
    let operator = Operator::parse(required_attr(el, "comparisonOperator")?)
        .map_err(|e| DefinitionError::Xml(e.to_string()))?;

    let lhs = refs.first().map(|r| parse_condition_operand_ref(r)).transpose()?;
    let lhs = lhs.ok_or_else(|| missing("Condition", "at least one ParameterInstanceRef"))?;

    let rhs = if let Some(second) = refs.get(1) {
        parse_condition_operand_ref(second)?
    } else if let Some(value_el) = el.child("Value") {
        ConditionOperand::Literal(value_el.text.clone())
    } else {
        return Err(missing("Condition", "a second ParameterInstanceRef or a Value"));
    };

    Ok(Condition { lhs, operator, rhs })
}

fn parse_condition_operand_ref(el: &Element) -> Result<ConditionOperand, DefinitionError> {
    Ok(ConditionOperand::Parameter {
        name: required_attr(el, "parameterRef")?.to_string(),
        use_calibrated_value: el.attr("useCalibratedValue").unwrap_or("true") == "true",
    })
}

fn parse_boolean_expression(el: &Element) -> Result<BooleanExpression, DefinitionError> {
    if let Some(anded) = el.child("ANDedConditions") {
        return Ok(BooleanExpression::Anded(parse_expression_children(anded)?));
    }
    if let Some(ored) = el.child("ORedConditions") {
        return Ok(BooleanExpression::Ored(parse_expression_children(ored)?));
    }
    if let Some(condition) = el.child("Condition") {
        return Ok(BooleanExpression::Leaf(parse_condition(condition)?));
    }
    Err(missing("BooleanExpression", "ANDedConditions, ORedConditions, or Condition"))
}

fn parse_expression_children(parent: &Element) -> Result<Vec<BooleanExpression>, DefinitionError> {
    let mut out = Vec::new();
    for child in &parent.children {
        match child.tag.as_str() {
            "Condition" => out.push(BooleanExpression::Leaf(parse_condition(child)?)),
            "BooleanExpression" => out.push(parse_boolean_expression(child)?),
            _ => {}
        }
    }
    Ok(out)
}

fn parse_sequence_container(el: &Element) -> Result<SequenceContainer, DefinitionError> {
    let name = required_attr(el, "name")?.to_string();
    let abstract_ = el.attr("abstract").unwrap_or("false") == "true";
    let short_description = el.attr("shortDescription").map(str::to_string);

    let mut entry_list = Vec::new();
    if let Some(entries) = el.child("EntryList") {
        for entry in &entries.children {
            match entry.tag.as_str() {
                "ParameterRefEntry" => {
                    entry_list.push(Entry::Parameter(required_attr(entry, "parameterRef")?.to_string()))
                }
                "ContainerRefEntry" => {
                    entry_list.push(Entry::Container(required_attr(entry, "containerRef")?.to_string()))
                }
                _ => {}
            }
        }
    }

    let mut base_container_name = None;
    let mut restriction_criteria = Vec::new();
    if let Some(base) = el.child("BaseContainer") {
        base_container_name = Some(required_attr(base, "containerRef")?.to_string());
        if let Some(criteria) = base.child("RestrictionCriteria") {
            restriction_criteria.push(parse_match_criteria_from_parent(criteria)?);
        }
    }

    Ok(SequenceContainer {
        name,
        entry_list,
        base_container_name,
        restriction_criteria,
        abstract_,
        inheritors: Vec::new(),
        short_description,
    })
}

// ---------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------

fn el(tag: &str) -> Element {
    Element {
        tag: tag.to_string(),
        ..Default::default()
    }
}

fn with_attr(mut e: Element, key: &str, value: impl Into<String>) -> Element {
    e.attrs.push((key.to_string(), value.into()));
    e
}

fn with_child(mut e: Element, child: Element) -> Element {
    e.children.push(child);
    e
}

fn with_text(mut e: Element, text: impl Into<String>) -> Element {
    e.text = text.into();
    e
}

fn build_space_system(definition: &Definition) -> Element {
    let mut header = el("Header");
    if let Some(version) = &definition.metadata.schema_version {
        header = with_attr(header, "version", version.clone());
    }
    if let Some(date) = &definition.metadata.date {
        header = with_attr(header, "date", date.clone());
    }
    if let Some(author) = &definition.metadata.author {
        header = with_attr(header, "author", author.clone());
    }

    let mut parameter_type_set = el("ParameterTypeSet");
    for (_, parameter_type) in definition.parameter_types.iter() {
        parameter_type_set = with_child(parameter_type_set, build_parameter_type(parameter_type));
    }

    let mut parameter_set = el("ParameterSet");
    for (_, parameter) in definition.parameters.iter() {
        let mut parameter_el = el("Parameter");
        parameter_el = with_attr(parameter_el, "name", parameter.name.clone());
        parameter_el = with_attr(parameter_el, "parameterTypeRef", parameter.parameter_type_ref.clone());
        if let Some(description) = &parameter.short_description {
            parameter_el = with_attr(parameter_el, "shortDescription", description.clone());
        }
        parameter_set = with_child(parameter_set, parameter_el);
    }

    let mut container_set = el("ContainerSet");
    container_set = with_attr(container_set, "root", definition.root_container_name.clone());
    for (_, container) in definition.sequence_containers.iter() {
        container_set = with_child(container_set, build_sequence_container(container));
    }

    let telemetry_metadata = with_child(
        with_child(with_child(el("TelemetryMetaData"), parameter_type_set), parameter_set),
        container_set,
    );

    let mut space_system = el("SpaceSystem");
    space_system = with_attr(space_system, "name", definition.metadata.space_system_name.clone());
    space_system = with_child(space_system, header);
    space_system = with_child(space_system, telemetry_metadata);
    space_system
}

fn build_parameter_type(parameter_type: &ParameterType) -> Element {
    let (tag, encoding) = match parameter_type {
        ParameterType::String(t) => ("StringParameterType", &t.encoding),
        ParameterType::Integer(t) => ("IntegerParameterType", &t.encoding),
        ParameterType::Float(t) => ("FloatParameterType", &t.encoding),
        ParameterType::Binary(t) => ("BinaryParameterType", &t.encoding),
        ParameterType::Enumerated(t) => ("EnumeratedParameterType", &t.encoding),
        ParameterType::Boolean(t) => ("BooleanParameterType", &t.encoding),
        ParameterType::AbsoluteTime(t) => ("AbsoluteTimeParameterType", &t.encoding),
        ParameterType::RelativeTime(t) => ("RelativeTimeParameterType", &t.encoding),
    };

    let mut element = el(tag);
    element = with_attr(element, "name", parameter_type.name().to_string());
    element = with_child(element, build_data_encoding(encoding));

    if let ParameterType::Enumerated(t) = parameter_type {
        let mut list = el("EnumerationList");
        for (key, label) in &t.enumeration {
            if let EnumKey::Int(value) = key {
                let mut entry = el("Enumeration");
                entry = with_attr(entry, "value", value.to_string());
                entry = with_attr(entry, "label", label.clone());
                list = with_child(list, entry);
            }
        }
        element = with_child(element, list);
    }

    if let ParameterType::AbsoluteTime(t) = parameter_type {
        if t.epoch.is_some() || t.offset_from.is_some() {
            let mut reference_time = el("ReferenceTime");
            if let Some(epoch) = t.epoch {
                let epoch_owned;
                let epoch_name = match epoch {
                    Epoch::Tai => "TAI",
                    Epoch::J2000 => "J2000",
                    Epoch::Unix => "UNIX",
                    Epoch::Posix => "POSIX",
                    Epoch::Gps => "GPS",
                    Epoch::Literal(seconds) => {
                        epoch_owned = chrono::DateTime::from_timestamp(seconds as i64, 0)
                            .map(|dt| dt.to_rfc3339())
                            .unwrap_or_else(|| seconds.to_string());
                        epoch_owned.as_str()
                    }
                };
                reference_time = with_child(reference_time, with_text(el("Epoch"), epoch_name));
            }
            if let Some(offset_from) = &t.offset_from {
                reference_time = with_child(
                    reference_time,
                    with_attr(el("OffsetFrom"), "parameterRef", offset_from.clone()),
                );
            }
            element = with_child(element, reference_time);
        }
    }

    if let ParameterType::RelativeTime(t) = parameter_type {
        if let Some(offset_from) = &t.offset_from {
            let reference_time = with_child(
                el("ReferenceTime"),
                with_attr(el("OffsetFrom"), "parameterRef", offset_from.clone()),
            );
            element = with_child(element, reference_time);
        }
    }

    element
}

fn build_data_encoding(encoding: &DataEncoding) -> Element {
    match encoding {
        DataEncoding::Integer(integer) => {
            let mut e = el("IntegerDataEncoding");
            e = with_attr(e, "sizeInBits", integer.size_in_bits.to_string());
            e = with_attr(e, "encoding", if integer.signed { "signed" } else { "unsigned" });
            e = with_attr(e, "byteOrder", byte_order_name(integer.byte_order));
            append_calibrator_chain(e, &integer.calibrators)
        }
        DataEncoding::Float(float) => {
            let mut e = el("FloatDataEncoding");
            e = with_attr(e, "sizeInBits", float.size_in_bits.to_string());
            e = with_attr(e, "encoding", match float.kind {
                FloatKind::Ieee754 => "IEEE754",
                FloatKind::Mil1750a => "MILSTD_1750A",
            });
            e = with_attr(e, "byteOrder", byte_order_name(float.byte_order));
            append_calibrator_chain(e, &float.calibrators)
        }
        DataEncoding::String(string) => {
            let mut e = el("StringDataEncoding");
            e = with_attr(e, "encoding", char_encoding_name(string.char_encoding));
            if let Some(byte_order) = string.byte_order {
                e = with_attr(e, "byteOrder", byte_order_name(byte_order));
            }
            e = with_child(e, build_size_in_bits(&string.raw_length));
            if let Some(derived) = &string.derived_length {
                let variable = match derived {
                    DerivedLengthSpec::Termination(bytes) => {
                        with_child(el("Variable"), with_text(el("TerminationChar"), hex_encode(bytes)))
                    }
                    DerivedLengthSpec::LeadingSize(bits) => with_child(
                        el("Variable"),
                        with_attr(el("LeadingSize"), "sizeInBitsOfSizeTag", bits.to_string()),
                    ),
                };
                e = with_child(e, variable);
            }
            e
        }
        DataEncoding::Binary(binary) => {
            let mut e = el("BinaryDataEncoding");
            e = with_child(e, build_size_in_bits(&binary.raw_length));
            e
        }
    }
}

fn byte_order_name(byte_order: ByteOrder) -> &'static str {
    match byte_order {
        ByteOrder::MostSignificantByteFirst => "mostSignificantByteFirst",
        ByteOrder::LeastSignificantByteFirst => "leastSignificantByteFirst",
    }
}

fn build_size_in_bits(raw_length: &RawLengthSpec) -> Element {
    let mut size_el = el("SizeInBits");
    let child = match raw_length {
        RawLengthSpec::Fixed(bits) => with_child(el("Fixed"), with_text(el("FixedValue"), bits.to_string())),
        RawLengthSpec::DynamicReference(reference) => {
            let mut ref_el = el("ParameterInstanceRef");
            ref_el = with_attr(ref_el, "parameterRef", reference.parameter.clone());
            ref_el = with_attr(ref_el, "useCalibratedValue", reference.use_calibrated_value.to_string());
            let mut dynamic = with_child(el("DynamicValue"), ref_el);
            if let Some(adjuster) = &reference.linear_adjuster {
                let mut adj_el = el("LinearAdjustment");
                adj_el = with_attr(adj_el, "slope", adjuster.slope.to_string());
                adj_el = with_attr(adj_el, "intercept", adjuster.intercept.to_string());
                dynamic = with_child(dynamic, adj_el);
            }
            dynamic
        }
        RawLengthSpec::DiscreteLookup(entries) => {
            let mut list = el("DiscreteLookupList");
            for (criteria, bits) in entries {
                let mut lookup = el("DiscreteLookup");
                lookup = with_attr(lookup, "value", bits.to_string());
                lookup = with_child(lookup, build_match_criteria(criteria));
                list = with_child(list, lookup);
            }
            list
        }
    };
    size_el = with_child(size_el, child);
    size_el
}

fn append_calibrator_chain(mut e: Element, chain: &CalibratorChain) -> Element {
    if let Some(default) = &chain.default_calibrator {
        e = with_child(e, with_child(el("DefaultCalibrator"), build_calibrator_body(default)));
    }
    if !chain.context_calibrators.is_empty() {
        let mut list = el("ContextCalibratorList");
        for calibrator in &chain.context_calibrators {
            if let Calibrator::Context { match_criteria, calibrator } = calibrator {
                let context_match = with_child(el("ContextMatch"), build_match_criteria(match_criteria));
                let calibrator_el = with_child(el("Calibrator"), build_calibrator_body(calibrator));
                let entry = with_child(with_child(el("ContextCalibrator"), context_match), calibrator_el);
                list = with_child(list, entry);
            }
        }
        e = with_child(e, list);
    }
    e
}

fn build_calibrator_body(calibrator: &Calibrator) -> Element {
    match calibrator {
        Calibrator::Polynomial(coefficients) => {
            let mut poly = el("PolynomialCalibrator");
            for c in coefficients {
                let mut term = el("Term");
                term = with_attr(term, "coefficient", c.coefficient.to_string());
                term = with_attr(term, "exponent", c.exponent.to_string());
                poly = with_child(poly, term);
            }
            poly
        }
        Calibrator::Spline { points, order, extrapolate } => {
            let mut spline = el("SplineCalibrator");
            spline = with_attr(spline, "order", order.to_string());
            spline = with_attr(spline, "extrapolate", extrapolate.to_string());
            for point in points {
                let mut point_el = el("SplinePoint");
                point_el = with_attr(point_el, "raw", point.raw.to_string());
                point_el = with_attr(point_el, "calibrated", point.calibrated.to_string());
                spline = with_child(spline, point_el);
            }
            spline
        }
        Calibrator::Context { calibrator, .. } => build_calibrator_body(calibrator),
    }
}

fn build_match_criteria(criteria: &MatchCriteria) -> Element {
    match criteria {
        MatchCriteria::Comparison(c) => build_comparison(c),
        MatchCriteria::ComparisonList(list) => {
            let mut e = el("ComparisonList");
            for c in list {
                e = with_child(e, build_comparison(c));
            }
            e
        }
        MatchCriteria::Condition(c) => build_condition(c),
        MatchCriteria::BooleanExpression(expr) => with_child(el("BooleanExpression"), build_expression_body(expr)),
    }
}

fn build_comparison(comparison: &Comparison) -> Element {
    let mut e = el("Comparison");
    e = with_attr(e, "parameterRef", comparison.referenced_parameter.clone());
    e = with_attr(e, "value", comparison.required_value.clone());
    e = with_attr(e, "comparisonOperator", operator_name(comparison.operator));
    e = with_attr(e, "useCalibratedValue", comparison.use_calibrated_value.to_string());
    e
}

fn build_condition(condition: &Condition) -> Element {
    let mut e = el("Condition");
    e = with_attr(e, "comparisonOperator", operator_name(condition.operator));
    e = with_child(e, build_condition_operand(&condition.lhs));
    match &condition.rhs {
        ConditionOperand::Parameter { .. } => e = with_child(e, build_condition_operand(&condition.rhs)),
        ConditionOperand::Literal(value) => e = with_child(e, with_text(el("Value"), value.clone())),
    }
    e
}

fn build_condition_operand(operand: &ConditionOperand) -> Element {
    match operand {
        ConditionOperand::Parameter { name, use_calibrated_value } => {
            let mut e = el("ParameterInstanceRef");
            e = with_attr(e, "parameterRef", name.clone());
            e = with_attr(e, "useCalibratedValue", use_calibrated_value.to_string());
            e
        }
        ConditionOperand::Literal(value) => with_text(el("Value"), value.clone()),
    }
}

fn build_expression_body(expr: &BooleanExpression) -> Element {
    match expr {
        BooleanExpression::Leaf(condition) => build_condition(condition),
        BooleanExpression::Anded(children) => {
            let mut anded = el("ANDedConditions");
            for child in children {
                anded = with_child(anded, build_expression_item(child));
            }
            anded
        }
        BooleanExpression::Ored(children) => {
            let mut ored = el("ORedConditions");
            for child in children {
                ored = with_child(ored, build_expression_item(child));
            }
            ored
        }
    }
}

fn build_expression_item(expr: &BooleanExpression) -> Element {
    match expr {
        BooleanExpression::Leaf(condition) => build_condition(condition),
        other => with_child(el("BooleanExpression"), build_expression_body(other)),
    }
}

fn operator_name(operator: Operator) -> &'static str {
    match operator {
        Operator::Eq => "==",
        Operator::Ne => "!=",
        Operator::Lt => "<",
        Operator::Gt => ">",
        Operator::Le => "<=",
        Operator::Ge => ">=",
    }
}

fn build_sequence_container(container: &SequenceContainer) -> Element {
    let mut e = el("SequenceContainer");
    e = with_attr(e, "name", container.name.clone());
    if container.abstract_ {
        e = with_attr(e, "abstract", "true");
    }
    if let Some(description) = &container.short_description {
        e = with_attr(e, "shortDescription", description.clone());
    }

    let mut entry_list = el("EntryList");
    for entry in &container.entry_list {
        let entry_el = match entry {
            Entry::Parameter(name) => with_attr(el("ParameterRefEntry"), "parameterRef", name.clone()),
            Entry::Container(name) => with_attr(el("ContainerRefEntry"), "containerRef", name.clone()),
        };
        entry_list = with_child(entry_list, entry_el);
    }
    e = with_child(e, entry_list);

    if let Some(base_name) = &container.base_container_name {
        let mut base = with_attr(el("BaseContainer"), "containerRef", base_name.clone());
        if let Some(criteria) = container.restriction_criteria.first() {
            base = with_child(base, with_child(el("RestrictionCriteria"), build_match_criteria(criteria)));
        }
        e = with_child(e, base);
    }

    e
}

fn write_document(root: &Element) -> Result<String, DefinitionError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(quick_xml::events::BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| DefinitionError::Xml(e.to_string()))?;
    write_element(&mut writer, root)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| DefinitionError::Xml(e.to_string()))
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, element: &Element) -> Result<(), DefinitionError> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| DefinitionError::Xml(e.to_string()))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| DefinitionError::Xml(e.to_string()))?;

    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(|e| DefinitionError::Xml(e.to_string()))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
        .map_err(|e| DefinitionError::Xml(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<SpaceSystem name="Demo">
  <Header version="1.0" date="2024-01-01" author="tester"/>
  <TelemetryMetaData>
    <ParameterTypeSet>
      <IntegerParameterType name="u16_type">
        <IntegerDataEncoding sizeInBits="16" encoding="unsigned" byteOrder="mostSignificantByteFirst"/>
      </IntegerParameterType>
      <EnumeratedParameterType name="status_type">
        <IntegerDataEncoding sizeInBits="16" encoding="unsigned" byteOrder="mostSignificantByteFirst"/>
        <EnumerationList>
          <Enumeration value="32768" label="NOMINAL"/>
        </EnumerationList>
      </EnumeratedParameterType>
    </ParameterTypeSet>
    <ParameterSet>
      <Parameter name="APID" parameterTypeRef="u16_type"/>
      <Parameter name="Status" parameterTypeRef="status_type"/>
    </ParameterSet>
    <ContainerSet root="CCSDSPacket">
      <SequenceContainer name="CCSDSPacket" abstract="true">
        <EntryList>
          <ParameterRefEntry parameterRef="APID"/>
        </EntryList>
      </SequenceContainer>
      <SequenceContainer name="Telemetry1">
        <EntryList>
          <ParameterRefEntry parameterRef="Status"/>
        </EntryList>
        <BaseContainer containerRef="CCSDSPacket">
          <RestrictionCriteria>
            <Comparison parameterRef="APID" value="11" comparisonOperator="=="/>
          </RestrictionCriteria>
        </BaseContainer>
      </SequenceContainer>
    </ContainerSet>
  </TelemetryMetaData>
</SpaceSystem>
"#;

    #[test]
    fn loads_parameter_types_parameters_and_containers() {
        let definition = Definition::from_xtce_str(SAMPLE).unwrap();
        assert_eq!(definition.parameter_types.len(), 2);
        assert_eq!(definition.parameters.len(), 2);
        assert_eq!(definition.sequence_containers.len(), 2);
        assert_eq!(definition.root_container_name, "CCSDSPacket");

        let root = definition.container("CCSDSPacket").unwrap();
        assert_eq!(root.inheritors, vec!["Telemetry1".to_string()]);
    }

    #[test]
    fn duplicate_parameter_name_fails() {
        let xml = SAMPLE.replace(r#"name="Status""#, r#"name="APID""#);
        assert!(Definition::from_xtce_str(&xml).is_err());
    }

    #[test]
    fn unresolved_parameter_type_ref_fails() {
        let xml = SAMPLE.replace("u16_type", "does_not_exist");
        assert!(Definition::from_xtce_str(&xml).is_err());
    }

    #[test]
    fn round_trips_through_xtce() {
        let definition = Definition::from_xtce_str(SAMPLE).unwrap();
        let serialized = definition.to_xtce_string().unwrap();
        let reloaded = Definition::from_xtce_str(&serialized).unwrap();

        assert_eq!(reloaded.parameter_types.len(), definition.parameter_types.len());
        assert_eq!(reloaded.parameters.len(), definition.parameters.len());
        assert_eq!(reloaded.sequence_containers.len(), definition.sequence_containers.len());
        assert_eq!(reloaded.root_container_name, definition.root_container_name);

        let original_root = definition.container("CCSDSPacket").unwrap();
        let reloaded_root = reloaded.container("CCSDSPacket").unwrap();
        assert_eq!(original_root.inheritors, reloaded_root.inheritors);
    }
}
