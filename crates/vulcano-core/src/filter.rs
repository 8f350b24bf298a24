//! Record filter engine.
//!
//! Generic predicate filtering over ordered sequences of records, shared by
//! every tabular resource. A filter specification maps field names to
//! conditions; a record is kept when it satisfies every condition, and the
//! output always preserves the input order.
//!
//! # Coercion rules
//!
//! - Ordering operators (`< <= > >=`) coerce the record's field with an
//!   integer-prefix parse (`"0012"` is 12, `"abc"` and missing fields are 0).
//!   The operand must be numeric.
//! - Equality (`==`, `!=`, or a bare literal) coerces the *condition* to the
//!   field's native type, so the integer `0` matches the string `"0"` but
//!   not `"00"`.
//! - `=~` (or a pattern given as a literal) matches the field's text.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use vulcano_core::filter::{filter_records, FilterSpec, Record};
//!
//! let records: Vec<Record> = vec![
//!     json!({"user": "root", "uid": "0"}).as_object().unwrap().clone(),
//!     json!({"user": "alice", "uid": "1000"}).as_object().unwrap().clone(),
//! ];
//! let spec = FilterSpec::from_json(&json!({"uid": {">=": 1000}})).unwrap();
//! let kept = filter_records(&records, &spec);
//! assert_eq!(kept.len(), 1);
//! assert_eq!(kept[0]["user"], "alice");
//! ```

use std::fmt;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::FilterError;

/// A single record: field name to value.
pub type Record = serde_json::Map<String, JsonValue>;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `=~`
    Match,
}

impl FilterOp {
    /// Parses an operator as written in a filter specification.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownOperator`] for anything unsupported.
    pub fn parse(field: &str, op: &str) -> Result<Self, FilterError> {
        match op {
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "=~" => Ok(Self::Match),
            other => Err(FilterError::UnknownOperator {
                field: field.to_string(),
                operator: other.to_string(),
            }),
        }
    }

    /// Returns the operator's textual form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Match => "=~",
        }
    }

    const fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A JSON literal.
    Literal(JsonValue),
    /// A compiled pattern.
    Pattern(Regex),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// A validated condition on one field.
#[derive(Debug, Clone)]
pub struct Condition {
    op: FilterOp,
    operand: Operand,
}

impl Condition {
    /// Creates and validates a condition.
    ///
    /// # Errors
    ///
    /// Returns an error when an ordering operator has a non-numeric operand
    /// or `=~` is given something other than a pattern or pattern text.
    pub fn new(field: &str, op: FilterOp, operand: Operand) -> Result<Self, FilterError> {
        let operand = match (op, operand) {
            (FilterOp::Match, Operand::Literal(JsonValue::String(text))) => {
                Operand::Pattern(compile_pattern(field, &text)?)
            }
            (FilterOp::Match, Operand::Literal(other)) => {
                return Err(FilterError::InvalidPattern {
                    field: field.to_string(),
                    message: format!("expected pattern text, got {other}"),
                })
            }
            (op, Operand::Literal(value)) if op.is_ordering() && !value.is_number() => {
                return Err(FilterError::NonNumericOperand {
                    field: field.to_string(),
                    operator: op.as_str().to_string(),
                    value: value.to_string(),
                })
            }
            (op, Operand::Pattern(re)) if op.is_ordering() => {
                return Err(FilterError::NonNumericOperand {
                    field: field.to_string(),
                    operator: op.as_str().to_string(),
                    value: format!("/{}/", re.as_str()),
                })
            }
            (_, operand) => operand,
        };
        Ok(Self { op, operand })
    }

    /// Equality with a literal.
    #[must_use]
    pub fn equals(value: impl Into<JsonValue>) -> Self {
        Self {
            op: FilterOp::Eq,
            operand: Operand::Literal(value.into()),
        }
    }

    /// Pattern match.
    #[must_use]
    pub const fn pattern(regex: Regex) -> Self {
        Self {
            op: FilterOp::Match,
            operand: Operand::Pattern(regex),
        }
    }

    /// Parses a condition from JSON: either a literal, or a single-key
    /// object `{"op": operand}`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed operator objects, unknown operators or
    /// invalid operands.
    pub fn from_json(field: &str, json: &JsonValue) -> Result<Self, FilterError> {
        match json {
            JsonValue::Object(map) => {
                let mut entries = map.iter();
                match (entries.next(), entries.next()) {
                    (Some((op, operand)), None) => Self::new(
                        field,
                        FilterOp::parse(field, op)?,
                        Operand::Literal(operand.clone()),
                    ),
                    _ => Err(FilterError::Malformed(format!(
                        "condition for '{field}' must have exactly one operator, got {}",
                        map.len()
                    ))),
                }
            }
            literal => Ok(Self::equals(literal.clone())),
        }
    }

    /// Returns the operator.
    #[must_use]
    pub const fn op(&self) -> FilterOp {
        self.op
    }

    /// Evaluates the condition against a field value (`None` when the field
    /// is absent).
    #[must_use]
    pub fn matches(&self, field: Option<&JsonValue>) -> bool {
        match (&self.operand, self.op) {
            (Operand::Pattern(re), FilterOp::Ne) => !pattern_matches(re, field),
            (Operand::Pattern(re), _) => pattern_matches(re, field),
            (Operand::Literal(cond), FilterOp::Eq) => field.is_some_and(|f| literal_eq(f, cond)),
            (Operand::Literal(cond), FilterOp::Ne) => !field.is_some_and(|f| literal_eq(f, cond)),
            (Operand::Literal(cond), op) => {
                let lhs = integer_prefix(field);
                let rhs = cond.as_f64().unwrap_or_default();
                match op {
                    FilterOp::Lt => lhs < rhs,
                    FilterOp::Le => lhs <= rhs,
                    FilterOp::Gt => lhs > rhs,
                    FilterOp::Ge => lhs >= rhs,
                    FilterOp::Eq | FilterOp::Ne | FilterOp::Match => false,
                }
            }
        }
    }
}

/// An ordered list of field conditions, all of which must hold.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    clauses: Vec<(String, Condition)>,
}

impl FilterSpec {
    /// Creates an empty specification (keeps every record).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.push(field, condition);
        self
    }

    /// Adds a condition in place.
    pub fn push(&mut self, field: impl Into<String>, condition: Condition) {
        self.clauses.push((field.into(), condition));
    }

    /// Parses a specification from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error when `json` is not an object or any condition is
    /// invalid.
    pub fn from_json(json: &JsonValue) -> Result<Self, FilterError> {
        let map = json.as_object().ok_or_else(|| {
            FilterError::Malformed(format!("expected an object of conditions, got {json}"))
        })?;
        let mut spec = Self::new();
        for (field, condition) in map {
            spec.push(field.clone(), Condition::from_json(field, condition)?);
        }
        Ok(spec)
    }

    /// Returns the clauses in order.
    #[must_use]
    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Returns true when no conditions are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Tests a single record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses
            .iter()
            .all(|(field, condition)| condition.matches(record.get(field)))
    }

    /// Human-readable form, e.g. ` uid == 0 shell =~ /nologin/`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.clauses
            .iter()
            .map(|(field, c)| format!(" {field} {} {}", c.op, c.operand))
            .collect()
    }
}

/// Returns the records matching `spec`, preserving order.
#[must_use]
pub fn filter_records(records: &[Record], spec: &FilterSpec) -> Vec<Record> {
    records
        .iter()
        .filter(|record| spec.matches(record))
        .cloned()
        .collect()
}

fn compile_pattern(field: &str, text: &str) -> Result<Regex, FilterError> {
    Regex::new(text).map_err(|e| FilterError::InvalidPattern {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn field_text(field: &JsonValue) -> Option<String> {
    match field {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn pattern_matches(re: &Regex, field: Option<&JsonValue>) -> bool {
    field
        .and_then(field_text)
        .is_some_and(|text| re.is_match(&text))
}

/// Equality with the condition coerced to the field's native type.
#[allow(clippy::float_cmp)]
fn literal_eq(field: &JsonValue, cond: &JsonValue) -> bool {
    match (field, cond) {
        (JsonValue::String(s), JsonValue::String(c)) => s == c,
        (JsonValue::String(s), JsonValue::Number(n)) => *s == n.to_string(),
        (JsonValue::String(s), JsonValue::Bool(b)) => *s == b.to_string(),
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        (JsonValue::Number(a), JsonValue::String(c)) => c
            .trim()
            .parse::<f64>()
            .is_ok_and(|c| a.as_f64() == Some(c)),
        (JsonValue::Bool(a), JsonValue::String(c)) => *c == a.to_string(),
        (a, b) => a == b,
    }
}

/// Integer-prefix coercion: optional sign followed by digits, otherwise 0.
/// Prefixes too long for any integer type keep their magnitude.
fn integer_prefix(field: Option<&JsonValue>) -> f64 {
    match field {
        Some(JsonValue::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(JsonValue::String(s)) => {
            let s = s.trim_start();
            let (sign, digits) = match s.as_bytes().first() {
                Some(b'-') => (-1.0, &s[1..]),
                Some(b'+') => (1.0, &s[1..]),
                _ => (1.0, s),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end]
                .parse::<f64>()
                .map_or(0.0, |v| sign * v)
        }
        _ => 0.0,
    }
}
