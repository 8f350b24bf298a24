//! Matcher library.
//!
//! Matchers turn `should MATCHER ARGS` clauses into [`Assertion`]s. Arguments
//! are evaluated when the rule is compiled; the subject is only known at
//! execution time.

use regex::Regex;
use vulcano_core::{Assertion, Expectation, Value};

/// Built-in matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Strict equality.
    Eq,
    /// Loose equality: numeric, or case-insensitive text.
    Cmp,
    /// Subject contains the argument.
    Include,
    /// Subject text matches a regex.
    Match,
    /// Subject is empty.
    BeEmpty,
    /// Subject is contained in the argument.
    BeIn,
    /// Subject exists.
    Exist,
}

/// Every matcher name.
pub const MATCHER_NAMES: &[&str] = &["eq", "cmp", "include", "match", "be_empty", "be_in", "exist"];

impl Matcher {
    /// Looks up a matcher by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Self::Eq,
            "cmp" => Self::Cmp,
            "include" => Self::Include,
            "match" => Self::Match,
            "be_empty" => Self::BeEmpty,
            "be_in" => Self::BeIn,
            "exist" => Self::Exist,
            _ => return None,
        })
    }

    /// Name as written in profiles.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Cmp => "cmp",
            Self::Include => "include",
            Self::Match => "match",
            Self::BeEmpty => "be_empty",
            Self::BeIn => "be_in",
            Self::Exist => "exist",
        }
    }

    /// Number of arguments the matcher takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::BeEmpty | Self::Exist => 0,
            _ => 1,
        }
    }

    /// Builds an assertion.
    ///
    /// # Errors
    ///
    /// Returns a message for wrong arity or an invalid regex.
    pub fn build(self, args: Vec<Value>, negated: bool) -> Result<Assertion, String> {
        if args.len() != self.arity() {
            return Err(format!(
                "matcher `{}` takes {} argument(s), got {}",
                self.name(),
                self.arity(),
                args.len()
            ));
        }
        let expected = args.into_iter().next().unwrap_or_default();
        let expected = match (self, expected) {
            (Self::Match, Value::Str(pattern)) => Value::Regex(
                Regex::new(&pattern).map_err(|e| format!("invalid regex for `match`: {e}"))?,
            ),
            (Self::Match, Value::Regex(re)) => Value::Regex(re),
            (Self::Match, other) => {
                return Err(format!(
                    "matcher `match` needs a string or regex, got {}",
                    other.type_name()
                ))
            }
            (_, value) => value,
        };

        Ok(Assertion::new(move |subject| {
            let holds = self.test(subject, &expected)?;
            if holds != negated {
                Ok(Expectation::Met)
            } else {
                Ok(Expectation::Unmet(self.explain(subject, &expected, negated)))
            }
        }))
    }

    fn test(self, subject: &Value, expected: &Value) -> Result<bool, String> {
        match self {
            Self::Eq => Ok(subject == expected),
            Self::Cmp => Ok(subject.loose_eq(expected)),
            Self::Include => subject.contains(expected).map_err(|e| e.to_string()),
            Self::BeIn => expected.contains(subject).map_err(|e| e.to_string()),
            Self::BeEmpty => subject.is_empty_value().map_err(|e| e.to_string()),
            Self::Match => Ok(match (subject, expected) {
                (Value::Nil, _) => false,
                (subject, Value::Regex(re)) => re.is_match(&subject.to_string()),
                _ => false,
            }),
            Self::Exist => match subject {
                Value::Nil => Ok(false),
                Value::Resource(_) => subject
                    .call_method("exist", &[])
                    .map(|v| v.is_truthy())
                    .map_err(|e| e.to_string()),
                _ => Ok(true),
            },
        }
    }

    fn explain(self, subject: &Value, expected: &Value, negated: bool) -> String {
        let not = if negated { "not " } else { "" };
        if self.arity() == 0 {
            format!("expected {} {not}to {}", subject.inspect(), self.name())
        } else {
            format!(
                "expected {} {not}to {} {}",
                subject.inspect(),
                self.name(),
                expected.inspect()
            )
        }
    }
}
