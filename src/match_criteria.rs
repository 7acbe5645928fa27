//! Match criteria: comparisons, conditions, and boolean expressions used to
//! gate context calibrators and select inheriting sequence containers.
//!
//! Grounded on `xtce/comparisons.py`: the `_valid_operators` token table, the
//! `use_calibrated_value` flag, and the `current_parsed_value` fallback for
//! self-referential comparisons (a parameter being calibrated comparing
//! against its own not-yet-stored raw value) all come from that file.

use crate::error::MatchError;
use crate::value::{ParameterValue, ParsedValue};

/// Anything that can answer "what value does parameter `name` currently
/// have in this packet". Implemented by [`crate::packet::Packet`]; kept as a
/// trait here so `match_criteria` does not need to depend on `packet`.
pub trait ValueLookup {
    fn lookup(&self, name: &str) -> Option<&ParameterValue>;
}

/// A no-op lookup, useful for evaluating match criteria in isolation (tests,
/// or calibrators with no packet context yet).
pub struct EmptyLookup;

impl ValueLookup for EmptyLookup {
    fn lookup(&self, _name: &str) -> Option<&ParameterValue> {
        None
    }
}

/// Everything a match criterion needs to evaluate itself against.
pub struct MatchContext<'a> {
    values: &'a dyn ValueLookup,
    /// The raw value of the parameter currently being calibrated, if any.
    /// Consulted when a `Comparison` references a parameter name that has
    /// not yet been inserted into the packet (self-referential comparison).
    current_value: Option<(&'a str, &'a ParameterValue)>,
}

impl<'a> MatchContext<'a> {
    pub fn new(values: &'a dyn ValueLookup) -> Self {
        MatchContext {
            values,
            current_value: None,
        }
    }

    pub fn with_current_value(mut self, name: &'a str, value: &'a ParameterValue) -> Self {
        self.current_value = Some((name, value));
        self
    }

    /// Look up a parameter's numeric value (raw or calibrated), including
    /// the self-referential `current_value` fallback. Used by encodings
    /// resolving a dynamically-referenced length.
    pub fn lookup_f64(&self, parameter: &str, use_calibrated: bool) -> Option<f64> {
        self.resolve_value(parameter, use_calibrated)?.as_f64()
    }

    /// Look up a parameter's actual parsed value (raw or calibrated),
    /// including the self-referential `current_value` fallback. The
    /// variant of the returned value (not the literal text of whatever is
    /// being compared against it) determines how a comparison coerces its
    /// other operand, mirroring `type(parsed_value)` in the original
    /// Python implementation.
    fn resolve_value(&self, parameter: &str, use_calibrated: bool) -> Option<&ParsedValue> {
        if let Some(value) = self.values.lookup(parameter) {
            return Some(if use_calibrated { &value.derived } else { &value.raw });
        }
        if let Some((current_name, value)) = self.current_value {
            if current_name == parameter {
                if use_calibrated {
                    log::warn!(
                        "comparison against {parameter}'s own calibrated value requested during its \
                         calibration; falling back to its raw value since no calibrated value exists yet"
                    );
                }
                return Some(&value.raw);
            }
        }
        None
    }

    /// An empty context: no packet state, no current value. Only useful for
    /// evaluating literal-only expressions or in tests.
    pub fn empty() -> MatchContext<'static> {
        MatchContext {
            values: &EMPTY,
            current_value: None,
        }
    }
}

static EMPTY: EmptyLookup = EmptyLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Operator {
    /// Parse one of the XTCE operator tokens, including the XML-entity and
    /// word-alias spellings XTCE documents commonly use for `<`/`>`.
    pub fn parse(token: &str) -> Result<Self, MatchError> {
        Ok(match token {
            "==" | "eq" => Operator::Eq,
            "!=" | "neq" => Operator::Ne,
            "<" | "&lt;" | "lt" => Operator::Lt,
            ">" | "&gt;" | "gt" => Operator::Gt,
            "<=" | "&lt;=" | "leq" => Operator::Le,
            ">=" | "&gt;=" | "geq" => Operator::Ge,
            other => return Err(MatchError::UnsupportedOperator(other.to_string())),
        })
    }

    fn apply<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            Operator::Lt => lhs < rhs,
            Operator::Gt => lhs > rhs,
            Operator::Le => lhs <= rhs,
            Operator::Ge => lhs >= rhs,
        }
    }

    /// The operator that holds when the two operands are swapped, e.g.
    /// `a < b` iff `b.reversed() > a`... read as `b reversed() a == a OP b`.
    fn reversed(self) -> Operator {
        match self {
            Operator::Eq => Operator::Eq,
            Operator::Ne => Operator::Ne,
            Operator::Lt => Operator::Gt,
            Operator::Gt => Operator::Lt,
            Operator::Le => Operator::Ge,
            Operator::Ge => Operator::Le,
        }
    }
}

/// Coerce `literal` to `value`'s own type and compare, mirroring
/// `t_comparate = type(parsed_value); required_value = t_comparate(self.required_value)`
/// in the original implementation: the *referenced parameter's* resolved
/// value decides whether this is a numeric or string comparison, never the
/// literal text alone (an enumerated/string parameter whose value happens
/// to look numeric must still compare as a string).
fn compare_typed(value: &ParsedValue, literal: &str, operator: Operator, parameter: &str) -> Result<bool, MatchError> {
    match value {
        ParsedValue::Int(_) | ParsedValue::Float(_) | ParsedValue::Bool(_) => {
            let actual = value.as_f64().expect("numeric ParsedValue variant has a finite f64 form");
            let required: f64 = literal.parse().map_err(|_| MatchError::CoercionFailed {
                parameter: parameter.to_string(),
                literal: literal.to_string(),
            })?;
            Ok(operator.apply(actual, required))
        }
        ParsedValue::Str(_) | ParsedValue::Bytes(_) => Ok(operator.apply(value.to_string().as_str(), literal)),
    }
}

/// A single `<Comparison>`: compares a named parameter's value to a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub referenced_parameter: String,
    pub operator: Operator,
    pub required_value: String,
    pub use_calibrated_value: bool,
}

impl Comparison {
    pub fn evaluate(&self, ctx: &MatchContext) -> Result<bool, MatchError> {
        let actual = ctx
            .resolve_value(&self.referenced_parameter, self.use_calibrated_value)
            .ok_or_else(|| MatchError::UnresolvedOperand(self.referenced_parameter.clone()))?;
        compare_typed(actual, &self.required_value, self.operator, &self.referenced_parameter)
    }
}

/// An operand of a [`Condition`]: either a named parameter or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionOperand {
    Parameter {
        name: String,
        use_calibrated_value: bool,
    },
    Literal(String),
}

/// A `<Condition>`: compares two operands, each independently raw or
/// calibrated if it names a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: ConditionOperand,
    pub operator: Operator,
    pub rhs: ConditionOperand,
}

impl Condition {
    /// The left operand (always a parameter per the XTCE green book) decides
    /// the comparison's type, same as [`Comparison`]; a literal right operand
    /// is coerced to match it, and a parameter right operand is compared via
    /// its own display text reinterpreted as the left operand's type.
    pub fn evaluate(&self, ctx: &MatchContext) -> Result<bool, MatchError> {
        match (&self.lhs, &self.rhs) {
            (ConditionOperand::Parameter { name, use_calibrated_value }, ConditionOperand::Literal(literal)) => {
                let left = ctx
                    .resolve_value(name, *use_calibrated_value)
                    .ok_or_else(|| MatchError::UnresolvedOperand(name.clone()))?;
                compare_typed(left, literal, self.operator, name)
            }
            (ConditionOperand::Literal(literal), ConditionOperand::Parameter { name, use_calibrated_value }) => {
                let right = ctx
                    .resolve_value(name, *use_calibrated_value)
                    .ok_or_else(|| MatchError::UnresolvedOperand(name.clone()))?;
                compare_typed(right, literal, self.operator.reversed(), name)
            }
            (
                ConditionOperand::Parameter { name: left_name, use_calibrated_value: left_calibrated },
                ConditionOperand::Parameter { name: right_name, use_calibrated_value: right_calibrated },
            ) => {
                let left = ctx
                    .resolve_value(left_name, *left_calibrated)
                    .ok_or_else(|| MatchError::UnresolvedOperand(left_name.clone()))?;
                let right = ctx
                    .resolve_value(right_name, *right_calibrated)
                    .ok_or_else(|| MatchError::UnresolvedOperand(right_name.clone()))?;
                compare_typed(left, &right.to_string(), self.operator, left_name)
            }
            (ConditionOperand::Literal(left), ConditionOperand::Literal(right)) => {
                if let (Ok(l), Ok(r)) = (left.parse::<f64>(), right.parse::<f64>()) {
                    Ok(self.operator.apply(l, r))
                } else {
                    Ok(self.operator.apply(left.as_str(), right.as_str()))
                }
            }
        }
    }
}

/// A boolean combination of [`Condition`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum BooleanExpression {
    Leaf(Condition),
    Anded(Vec<BooleanExpression>),
    Ored(Vec<BooleanExpression>),
}

impl BooleanExpression {
    pub fn evaluate(&self, ctx: &MatchContext) -> Result<bool, MatchError> {
        match self {
            BooleanExpression::Leaf(condition) => condition.evaluate(ctx),
            BooleanExpression::Anded(children) => {
                for child in children {
                    if !child.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            BooleanExpression::Ored(children) => {
                for child in children {
                    if child.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// Top-level match criteria, as used for restriction criteria and context
/// calibrator gates.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCriteria {
    Comparison(Comparison),
    ComparisonList(Vec<Comparison>),
    Condition(Condition),
    BooleanExpression(BooleanExpression),
}

impl MatchCriteria {
    pub fn evaluate(&self, ctx: &MatchContext) -> Result<bool, MatchError> {
        match self {
            MatchCriteria::Comparison(c) => c.evaluate(ctx),
            MatchCriteria::ComparisonList(cs) => {
                for c in cs {
                    if !c.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            MatchCriteria::Condition(c) => c.evaluate(ctx),
            MatchCriteria::BooleanExpression(e) => e.evaluate(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParsedValue;
    use std::collections::HashMap;

    struct MapLookup(HashMap<String, ParameterValue>);

    impl ValueLookup for MapLookup {
        fn lookup(&self, name: &str) -> Option<&ParameterValue> {
            self.0.get(name)
        }
    }

    #[test]
    fn comparison_matches_numeric_literal() {
        let mut map = HashMap::new();
        map.insert(
            "APID".to_string(),
            ParameterValue::identity(ParsedValue::Int(11)),
        );
        let lookup = MapLookup(map);
        let ctx = MatchContext::new(&lookup);

        let comparison = Comparison {
            referenced_parameter: "APID".to_string(),
            operator: Operator::Eq,
            required_value: "11".to_string(),
            use_calibrated_value: true,
        };
        assert!(comparison.evaluate(&ctx).unwrap());
    }

    #[test]
    fn comparison_missing_parameter_errors() {
        let lookup = MapLookup(HashMap::new());
        let ctx = MatchContext::new(&lookup);
        let comparison = Comparison {
            referenced_parameter: "MISSING".to_string(),
            operator: Operator::Eq,
            required_value: "1".to_string(),
            use_calibrated_value: true,
        };
        assert!(comparison.evaluate(&ctx).is_err());
    }

    #[test]
    fn comparison_falls_back_to_current_value() {
        let lookup = MapLookup(HashMap::new());
        let current = ParameterValue::identity(ParsedValue::Int(42));
        let ctx = MatchContext::new(&lookup).with_current_value("SELF", &current);

        let comparison = Comparison {
            referenced_parameter: "SELF".to_string(),
            operator: Operator::Eq,
            required_value: "42".to_string(),
            use_calibrated_value: false,
        };
        assert!(comparison.evaluate(&ctx).unwrap());
    }

    #[test]
    fn anded_boolean_expression_short_circuits() {
        let lookup = MapLookup(HashMap::new());
        let ctx = MatchContext::new(&lookup);
        let expr = BooleanExpression::Anded(vec![BooleanExpression::Leaf(Condition {
            lhs: ConditionOperand::Literal("1".to_string()),
            operator: Operator::Eq,
            rhs: ConditionOperand::Literal("2".to_string()),
        })]);
        assert!(!expr.evaluate(&ctx).unwrap());
    }

    #[test]
    fn operator_parses_entity_encoded_tokens() {
        assert_eq!(Operator::parse("&lt;").unwrap(), Operator::Lt);
        assert_eq!(Operator::parse("geq").unwrap(), Operator::Ge);
        assert!(Operator::parse("nonsense").is_err());
    }

    #[test]
    fn comparison_dispatches_on_referenced_value_type_not_literal_shape() {
        // "Status" is string-typed even though both its value and the
        // literal being compared against happen to look numeric; the
        // comparison must still take the string branch.
        let mut map = HashMap::new();
        map.insert(
            "Status".to_string(),
            ParameterValue::identity(ParsedValue::Str("123".to_string())),
        );
        let lookup = MapLookup(map);
        let ctx = MatchContext::new(&lookup);

        let comparison = Comparison {
            referenced_parameter: "Status".to_string(),
            operator: Operator::Eq,
            required_value: "123".to_string(),
            use_calibrated_value: true,
        };
        assert!(comparison.evaluate(&ctx).unwrap());
    }

    #[test]
    fn condition_coerces_literal_to_parameter_type_on_either_side() {
        let mut map = HashMap::new();
        map.insert("APID".to_string(), ParameterValue::identity(ParsedValue::Int(11)));
        let lookup = MapLookup(map);
        let ctx = MatchContext::new(&lookup);

        let literal_on_right = Condition {
            lhs: ConditionOperand::Parameter { name: "APID".to_string(), use_calibrated_value: true },
            operator: Operator::Lt,
            rhs: ConditionOperand::Literal("20".to_string()),
        };
        assert!(literal_on_right.evaluate(&ctx).unwrap());

        let literal_on_left = Condition {
            lhs: ConditionOperand::Literal("20".to_string()),
            operator: Operator::Gt,
            rhs: ConditionOperand::Parameter { name: "APID".to_string(), use_calibrated_value: true },
        };
        assert!(literal_on_left.evaluate(&ctx).unwrap());
    }
}
