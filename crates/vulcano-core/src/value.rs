//! Runtime values manipulated by profiles.
//!
//! A [`Value`] is what profile expressions evaluate to: plain data (strings,
//! numbers, lists, maps), compiled patterns, or handles to read-only
//! [`Resource`]s on the target.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::resource::Resource;

/// A profile-level value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list.
    List(Vec<Value>),
    /// String-keyed map (sorted by key).
    Map(BTreeMap<String, Value>),
    /// Compiled regular expression.
    Regex(Regex),
    /// Handle to a target resource.
    Resource(Arc<dyn Resource>),
}

impl Value {
    /// Returns the type name used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Regex(_) => "regex",
            Self::Resource(_) => "resource",
        }
    }

    /// `nil` and `false` are falsy, everything else is truthy.
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    /// Returns the string slice if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value for integers and floats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Renders the value the way it would be written in a profile.
    #[must_use]
    pub fn inspect(&self) -> String {
        match self {
            Self::Nil => "nil".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => format!("{s:?}"),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Self::inspect).collect();
                format!("[{}]", inner.join(", "))
            }
            Self::Map(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.inspect()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Self::Regex(re) => format!("/{}/", re.as_str()),
            Self::Resource(r) => r.to_string(),
        }
    }

    /// Converts into JSON for reports and record filtering.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Nil => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Self::Str(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Regex(re) => JsonValue::String(re.as_str().to_string()),
            Self::Resource(r) => JsonValue::String(r.to_string()),
        }
    }

    /// Builds a value from JSON data.
    #[must_use]
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Nil,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            JsonValue::String(s) => Self::Str(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Loose comparison used by the `cmp` matcher.
    ///
    /// Numbers compare numerically even when one side is numeric text,
    /// strings compare case-insensitively, lists compare element-wise.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a.eq_ignore_ascii_case(b),
            (Self::Str(s), n) | (n, Self::Str(s)) if n.as_f64().is_some() => s
                .trim()
                .parse::<f64>()
                .is_ok_and(|parsed| Some(parsed) == n.as_f64()),
            (Self::Str(s), Self::Bool(b)) | (Self::Bool(b), Self::Str(s)) => {
                s.eq_ignore_ascii_case(if *b { "true" } else { "false" })
            }
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Self::List(a), single) if a.len() == 1 => a[0].loose_eq(single),
            _ => self == other,
        }
    }

    /// Membership test used by the `include` matcher.
    ///
    /// # Errors
    ///
    /// Returns an error when the receiver cannot contain anything.
    pub fn contains(&self, needle: &Self) -> Result<bool> {
        match (self, needle) {
            (Self::List(items), _) => Ok(items.iter().any(|item| item == needle)),
            (Self::Str(haystack), Self::Str(n)) => Ok(haystack.contains(n.as_str())),
            (Self::Map(map), Self::Str(key)) => Ok(map.contains_key(key)),
            _ => Err(Error::InvalidArgument {
                method: "include".to_string(),
                reason: format!("{} cannot contain {}", self.type_name(), needle.type_name()),
            }),
        }
    }

    /// Emptiness test used by the `be_empty` matcher.
    ///
    /// # Errors
    ///
    /// Returns an error for values without a notion of emptiness.
    pub fn is_empty_value(&self) -> Result<bool> {
        match self {
            Self::Nil => Ok(true),
            Self::Str(s) => Ok(s.is_empty()),
            Self::List(items) => Ok(items.is_empty()),
            Self::Map(map) => Ok(map.is_empty()),
            other => Err(Error::InvalidArgument {
                method: "be_empty".to_string(),
                reason: format!("{} has no length", other.type_name()),
            }),
        }
    }

    /// Invokes a method or property on the value.
    ///
    /// Resources dispatch to [`Resource::call`]; plain data supports a small
    /// fixed set of read-only accessors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedMethod`] for unknown methods, or whatever
    /// the resource reports.
    pub fn call_method(&self, method: &str, args: &[Self]) -> Result<Self> {
        if let Self::Resource(resource) = self {
            return resource.call(method, args);
        }
        if !args.is_empty() {
            return Err(Error::InvalidArgument {
                method: method.to_string(),
                reason: format!("{} accessors take no arguments", self.type_name()),
            });
        }

        let undefined = || Error::UndefinedMethod {
            method: method.to_string(),
            target: self.type_name().to_string(),
        };

        match (self, method) {
            (Self::Map(map), key) if map.contains_key(key) => Ok(map[key].clone()),
            (Self::Map(map), "keys") => Ok(Self::List(
                map.keys().cloned().map(Self::Str).collect(),
            )),
            (Self::List(items), "count" | "length" | "size") => Ok(Self::Int(len_as_i64(items.len()))),
            (Self::Map(map), "count" | "length" | "size") => Ok(Self::Int(len_as_i64(map.len()))),
            (Self::Str(s), "length" | "size") => Ok(Self::Int(len_as_i64(s.chars().count()))),
            (Self::List(items), "first") => Ok(items.first().cloned().unwrap_or_default()),
            (Self::List(items), "last") => Ok(items.last().cloned().unwrap_or_default()),
            (Self::List(items), "uniq") => {
                let mut unique: Vec<Self> = Vec::with_capacity(items.len());
                for item in items {
                    if !unique.contains(item) {
                        unique.push(item.clone());
                    }
                }
                Ok(Self::List(unique))
            }
            (Self::Str(s), "lines") => Ok(Self::List(
                s.lines().map(|l| Self::Str(l.to_string())).collect(),
            )),
            (Self::Str(s), "strip") => Ok(Self::Str(s.trim().to_string())),
            _ => Err(undefined()),
        }
    }

    /// Indexes into a list (by integer, negative counts from the end) or a
    /// map (by key). Out-of-range lookups yield `nil`.
    ///
    /// # Errors
    ///
    /// Returns an error when the receiver is not indexable by `index`.
    pub fn index(&self, index: &Self) -> Result<Self> {
        match (self, index) {
            (Self::List(items), Self::Int(i)) => {
                let len = len_as_i64(items.len());
                let pos = if *i < 0 { len + i } else { *i };
                Ok(usize::try_from(pos)
                    .ok()
                    .and_then(|p| items.get(p))
                    .cloned()
                    .unwrap_or_default())
            }
            (Self::Map(map), Self::Str(key)) => Ok(map.get(key).cloned().unwrap_or_default()),
            (Self::Resource(resource), Self::Str(key)) => resource.call(key, &[]),
            _ => Err(Error::InvalidArgument {
                method: "[]".to_string(),
                reason: format!(
                    "cannot index {} with {}",
                    self.type_name(),
                    index.type_name()
                ),
            }),
        }
    }

    /// The `+` operator: numeric addition, string and list concatenation.
    ///
    /// # Errors
    ///
    /// Returns an error on type mismatch or integer overflow.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        let mismatch = || Error::InvalidArgument {
            method: "+".to_string(),
            reason: format!("cannot add {} to {}", rhs.type_name(), self.type_name()),
        };
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => a.checked_add(*b).map(Self::Int).ok_or_else(|| {
                Error::InvalidArgument {
                    method: "+".to_string(),
                    reason: "integer overflow".to_string(),
                }
            }),
            (Self::Str(a), Self::Str(b)) => Ok(Self::Str(format!("{a}{b}"))),
            (Self::List(a), Self::List(b)) => Ok(Self::List(a.iter().chain(b).cloned().collect())),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Ok(Self::Float(x + y)),
                _ => Err(mismatch()),
            },
        }
    }
}

fn len_as_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            (Self::Resource(a), Self::Resource(b)) => Arc::ptr_eq(a, b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            other => f.write_str(&other.inspect()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::from("1"));
    }

    #[test]
    fn test_loose_eq() {
        assert!(Value::from("0").loose_eq(&Value::Int(0)));
        assert!(Value::from("Root").loose_eq(&Value::from("root")));
        assert!(Value::from("TRUE").loose_eq(&Value::Bool(true)));
        assert!(Value::List(vec!["root".into()]).loose_eq(&Value::from("root")));
        assert!(!Value::from("abc").loose_eq(&Value::Int(0)));
    }

    #[test]
    fn test_contains() {
        let list = Value::List(vec!["root".into(), "bin".into()]);
        assert!(list.contains(&"bin".into()).unwrap());
        assert!(!list.contains(&"daemon".into()).unwrap());
        assert!(Value::from("/bin/bash").contains(&"bash".into()).unwrap());
        assert!(Value::Int(3).contains(&Value::Int(3)).is_err());
    }

    #[test]
    fn test_call_method_on_data() {
        let list = Value::List(vec![Value::Int(1), Value::Int(1), Value::Int(2)]);
        assert_eq!(list.call_method("count", &[]).unwrap(), Value::Int(3));
        assert_eq!(
            list.call_method("uniq", &[]).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert!(matches!(
            list.call_method("shadow", &[]),
            Err(Error::UndefinedMethod { .. })
        ));

        let map = Value::from_json(&json!({"name": "ubuntu"}));
        assert_eq!(map.call_method("name", &[]).unwrap(), Value::from("ubuntu"));
    }

    #[test]
    fn test_index() {
        let list = Value::List(vec!["a".into(), "b".into()]);
        assert_eq!(list.index(&Value::Int(-1)).unwrap(), Value::from("b"));
        assert_eq!(list.index(&Value::Int(7)).unwrap(), Value::Nil);
        assert!(list.index(&"a".into()).is_err());
    }

    #[test]
    fn test_add() {
        assert_eq!(
            Value::from("shell-").add(&"bin".into()).unwrap(),
            Value::from("shell-bin")
        );
        assert_eq!(Value::Int(2).add(&Value::Int(3)).unwrap(), Value::Int(5));
        assert!(Value::from("a").add(&Value::Int(1)).is_err());
        assert!(Value::Int(i64::MAX).add(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_inspect() {
        let v = Value::List(vec!["root".into(), Value::Int(0), Value::Nil]);
        assert_eq!(v.inspect(), r#"["root", 0, nil]"#);
        assert_eq!(Value::from("x").to_string(), "x");
    }

    #[test]
    fn test_json_conversion() {
        let json = json!({"users": ["root"], "count": 1, "ratio": 0.5, "ok": true, "none": null});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }
}
