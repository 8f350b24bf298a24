//! Executable test units.
//!
//! A [`TestUnit`] is the smallest item the execution engine schedules. Units
//! form an explicit tree: groups carry an optional deferred subject and own
//! child units; examples carry an opaque assertion; pending units are
//! skipped. Every unit carries the ID of the rule it was compiled from once
//! the compiler has stamped it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Where a unit was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source identifier (file path or inline name).
    pub source: String,
    /// 1-based line, already adjusted by the source's line offset.
    pub line: usize,
}

impl SourceLocation {
    /// Creates a location.
    #[must_use]
    pub fn new(source: impl Into<String>, line: usize) -> Self {
        Self {
            source: source.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// Deferred subject resolution. Receives the enclosing group's subject, if
/// any.
pub type SubjectFn = dyn Fn(Option<&Value>) -> Result<Value, String> + Send + Sync;

/// Deferred predicate over a resolved subject.
pub type AssertionFn = dyn Fn(&Value) -> Result<Expectation, String> + Send + Sync;

/// Result of applying an assertion to a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// The predicate held.
    Met,
    /// The predicate did not hold; carries the failure message.
    Unmet(String),
}

/// The subject of a group, resolved lazily at execution time.
#[derive(Clone)]
pub struct Subject {
    description: String,
    resolve: Arc<SubjectFn>,
}

impl Subject {
    /// Creates a subject from a resolver closure.
    pub fn new(
        description: impl Into<String>,
        resolve: impl Fn(Option<&Value>) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            resolve: Arc::new(resolve),
        }
    }

    /// Subject that is always the given value.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        Self::new(value.to_string(), move |_| Ok(value.clone()))
    }

    /// Returns the human readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Resolves the subject against the enclosing subject.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error message.
    pub fn resolve(&self, parent: Option<&Value>) -> Result<Value, String> {
        (self.resolve)(parent)
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// An opaque predicate scheduled by the engine.
#[derive(Clone)]
pub struct Assertion {
    check: Arc<AssertionFn>,
}

impl Assertion {
    /// Wraps a predicate closure.
    pub fn new(
        check: impl Fn(&Value) -> Result<Expectation, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            check: Arc::new(check),
        }
    }

    /// Applies the predicate.
    ///
    /// # Errors
    ///
    /// Returns an error message when the predicate itself faults, as
    /// opposed to an unmet expectation.
    pub fn evaluate(&self, subject: &Value) -> Result<Expectation, String> {
        (self.check)(subject)
    }
}

impl fmt::Debug for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Assertion(..)")
    }
}

/// What a unit does when executed.
#[derive(Debug, Clone)]
pub enum UnitKind {
    /// A group of child units sharing a subject.
    Group {
        /// Subject for the group's descendants.
        subject: Option<Subject>,
    },
    /// A leaf assertion.
    Example {
        /// Predicate applied to the nearest subject.
        assertion: Assertion,
    },
    /// A leaf that is reported as skipped.
    Pending {
        /// Why the unit is skipped.
        reason: String,
    },
}

/// A node of the executable tree.
#[derive(Debug, Clone)]
pub struct TestUnit {
    /// Human readable description.
    pub description: String,
    /// Owning rule, stamped by the compiler.
    pub rule_id: Option<String>,
    /// Declaration site.
    pub location: SourceLocation,
    /// Behaviour of this node.
    pub kind: UnitKind,
    /// Child units in declaration order.
    pub children: Vec<TestUnit>,
}

impl TestUnit {
    /// Creates a group.
    #[must_use]
    pub fn group(
        description: impl Into<String>,
        location: SourceLocation,
        subject: Option<Subject>,
    ) -> Self {
        Self::new(description, location, UnitKind::Group { subject })
    }

    /// Creates an example leaf.
    #[must_use]
    pub fn example(
        description: impl Into<String>,
        location: SourceLocation,
        assertion: Assertion,
    ) -> Self {
        Self::new(description, location, UnitKind::Example { assertion })
    }

    /// Creates a pending leaf.
    #[must_use]
    pub fn pending(
        description: impl Into<String>,
        location: SourceLocation,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            description,
            location,
            UnitKind::Pending {
                reason: reason.into(),
            },
        )
    }

    fn new(description: impl Into<String>, location: SourceLocation, kind: UnitKind) -> Self {
        Self {
            description: description.into(),
            rule_id: None,
            location,
            kind,
            children: Vec::new(),
        }
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Returns true for examples and pending units.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        !matches!(self.kind, UnitKind::Group { .. })
    }

    /// Visits this unit and all descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Mutable pre-order visit.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Self)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    /// Number of leaves in the subtree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |unit| {
            if unit.is_leaf() {
                count += 1;
            }
        });
        count
    }

    /// First unit in the subtree without a rule ID.
    #[must_use]
    pub fn first_unstamped(&self) -> Option<&Self> {
        let mut found = None;
        self.walk(&mut |unit| {
            if found.is_none() && unit.rule_id.is_none() {
                found = Some(unit);
            }
        });
        found
    }
}
