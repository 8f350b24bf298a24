//! Built-in resources.
//!
//! These are the only names a profile can use to reach the target. Each
//! resource reads lazily through a [`Backend`] so constructing one during
//! profile evaluation performs no I/O.

mod file;
mod os;
mod passwd;

use std::sync::Arc;

pub use file::File;
pub use os::Os;
pub use passwd::{parse_passwd, Passwd};

use crate::backend::Backend;
use crate::error::{Error, FilterError, Result};
use crate::filter::{Condition, FilterOp, FilterSpec, Operand};
use crate::resource::Resource;
use crate::value::Value;

/// Names of every resource a profile may reference.
pub const RESOURCE_NAMES: &[&str] = &["passwd", "file", "os"];

/// Returns true if `name` is a built-in resource.
#[must_use]
pub fn is_resource(name: &str) -> bool {
    RESOURCE_NAMES.contains(&name)
}

/// Opens the named resource.
///
/// # Errors
///
/// Returns [`Error::UnknownResource`] for unknown names and
/// [`Error::InvalidArgument`] when the arguments do not fit the resource.
pub fn open(name: &str, args: &[Value], backend: &Arc<dyn Backend>) -> Result<Value> {
    let resource: Arc<dyn Resource> = match (name, args) {
        ("passwd", []) => Arc::new(Passwd::new(passwd::DEFAULT_PATH, Arc::clone(backend))),
        ("passwd", [Value::Str(path)]) => Arc::new(Passwd::new(path.clone(), Arc::clone(backend))),
        ("file", [Value::Str(path)]) => Arc::new(File::new(path.clone(), Arc::clone(backend))),
        ("os", []) => Arc::new(Os::new(Arc::clone(backend))),
        ("passwd" | "file" | "os", _) => {
            return Err(Error::InvalidArgument {
                method: name.to_string(),
                reason: format!(
                    "unexpected arguments ({})",
                    args.iter().map(Value::inspect).collect::<Vec<_>>().join(", ")
                ),
            })
        }
        (other, _) => return Err(Error::UnknownResource(other.to_string())),
    };
    Ok(Value::Resource(resource))
}

/// Builds a filter specification from a profile map such as
/// `{uid: {">=": 1000}, shell: regex("nologin")}`.
///
/// # Errors
///
/// Returns a [`FilterError`] for anything that is not a valid specification.
pub fn filter_spec_from_value(value: &Value) -> std::result::Result<FilterSpec, FilterError> {
    match value {
        Value::Map(map) => {
            let mut spec = FilterSpec::new();
            for (field, condition) in map {
                spec.push(field.clone(), condition_from_value(field, condition)?);
            }
            Ok(spec)
        }
        Value::Nil => Ok(FilterSpec::new()),
        other => Err(FilterError::Malformed(format!(
            "expected a map of conditions, got {}",
            other.inspect()
        ))),
    }
}

/// Builds one condition from a profile value.
///
/// # Errors
///
/// Returns a [`FilterError`] for malformed operator maps or operands.
pub fn condition_from_value(field: &str, value: &Value) -> std::result::Result<Condition, FilterError> {
    match value {
        Value::Regex(re) => Ok(Condition::pattern(re.clone())),
        Value::Map(map) => {
            let mut entries = map.iter();
            match (entries.next(), entries.next()) {
                (Some((op, operand)), None) => {
                    let operand = match operand {
                        Value::Regex(re) => Operand::Pattern(re.clone()),
                        other => Operand::Literal(other.to_json()),
                    };
                    Condition::new(field, FilterOp::parse(field, op)?, operand)
                }
                _ => Err(FilterError::Malformed(format!(
                    "condition for '{field}' must have exactly one operator, got {}",
                    map.len()
                ))),
            }
        }
        other => Ok(Condition::equals(other.to_json())),
    }
}
