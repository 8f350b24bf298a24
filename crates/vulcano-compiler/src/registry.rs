//! Rule registry.
//!
//! A [`Registry`] is populated by evaluating one profile and read once
//! evaluation completes. Re-registering a rule ID replaces the earlier rule
//! (last write wins) but keeps the position of the first registration, so
//! execution order stays stable. A redeclaration whose body fails to evaluate
//! still wins: the earlier rule is dropped and only the failure remains.
//! Every overwrite is logged and recorded for the linter.
//!
//! Rules generated from top-level `describe` blocks are keyed by their
//! declaration site, so a loop yields the same ID on every iteration. Those
//! accumulate checks instead of replacing each other.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;
use vulcano_core::{SourceLocation, Value};

use crate::ast::{Expr, Stmt};
use crate::error::EvaluationError;
use crate::interp::{Env, Interpreter};

/// Captured evaluation state for deferred parts of a check.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Bindings visible at declaration.
    pub env: Env,
    /// Interpreter used to resolve subjects at execution time.
    pub interpreter: Interpreter,
    /// Source the check was declared in.
    pub source_id: Arc<str>,
    /// Line offset of the source.
    pub line_offset: usize,
}

impl Scope {
    /// Maps a parsed line to a reported location.
    #[must_use]
    pub fn location(&self, line: usize) -> SourceLocation {
        SourceLocation::new(self.source_id.as_ref(), adjust_line(line, self.line_offset))
    }
}

/// Applies a source's line offset to a parsed line.
#[must_use]
pub const fn adjust_line(line: usize, line_offset: usize) -> usize {
    (line + line_offset).saturating_sub(1)
}

/// The deferred body of a check.
#[derive(Debug, Clone)]
pub enum CheckBody {
    /// `describe SUBJECT do ... end`
    Describe {
        /// Subject expression, resolved at execution time.
        subject: Arc<Expr>,
        /// Group body.
        body: Arc<[Stmt]>,
        /// Captured state.
        scope: Scope,
    },
    /// `skip` directly inside a rule.
    Skip {
        /// Why the rule is skipped.
        reason: String,
    },
}

/// One assertion group within a rule.
#[derive(Debug, Clone)]
pub struct Check {
    /// Subject description.
    pub description: String,
    /// Extra describe arguments, evaluated at declaration.
    pub args: Vec<Value>,
    /// Declaration site.
    pub location: SourceLocation,
    /// Deferred body handed to the compiler.
    pub body: CheckBody,
}

/// A compliance requirement.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Rule ID, unique within a registry.
    pub id: String,
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub desc: Option<String>,
    /// Impact in `[0.0, 1.0]`.
    pub impact: Option<f64>,
    /// Tags.
    pub tags: Vec<String>,
    /// Declaration site.
    pub location: SourceLocation,
    /// True for rules generated from a top-level `describe`.
    pub generated: bool,
    /// Checks in declaration order.
    pub checks: Vec<Check>,
}

impl Rule {
    /// Creates an empty rule.
    #[must_use]
    pub fn new(id: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            id: id.into(),
            title: None,
            desc: None,
            impact: None,
            tags: Vec::new(),
            location,
            generated: false,
            checks: Vec::new(),
        }
    }
}

/// A rule that replaced an earlier rule with the same ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overwrite {
    /// The duplicated ID.
    pub rule_id: String,
    /// Where the replaced rule was declared.
    pub previous: SourceLocation,
    /// Where the replacing rule was declared.
    pub current: SourceLocation,
}

/// Rules of one profile in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    failures: Vec<EvaluationError>,
    overwrites: Vec<Overwrite>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule, returning the rule it replaced.
    pub fn register(&mut self, rule: Rule) -> Option<Rule> {
        if let Some(&pos) = self.index.get(&rule.id) {
            warn!(
                rule_id = %rule.id,
                previous = %self.rules[pos].location,
                current = %rule.location,
                "Rule redeclared; the later declaration replaces the earlier one"
            );
            self.overwrites.push(Overwrite {
                rule_id: rule.id.clone(),
                previous: self.rules[pos].location.clone(),
                current: rule.location.clone(),
            });
            return Some(std::mem::replace(&mut self.rules[pos], rule));
        }
        self.index.insert(rule.id.clone(), self.rules.len());
        self.rules.push(rule);
        None
    }

    /// Registers a rule generated from a top-level `describe`, appending its
    /// checks when a generated rule with the same ID already exists.
    pub fn register_generated(&mut self, rule: Rule) -> Option<Rule> {
        match self.index.get(&rule.id) {
            Some(&pos) if self.rules[pos].generated => {
                self.rules[pos].checks.extend(rule.checks);
                None
            }
            _ => self.register(rule),
        }
    }

    /// Drops the rule registered as `id` because its redeclaration at
    /// `current` failed to evaluate.
    pub fn discard(&mut self, id: &str, current: SourceLocation) -> Option<Rule> {
        let pos = self.index.remove(id)?;
        let rule = self.rules.remove(pos);
        for p in self.index.values_mut() {
            if *p > pos {
                *p -= 1;
            }
        }
        warn!(
            rule_id = id,
            previous = %rule.location,
            current = %current,
            "Rule redeclaration failed; the earlier declaration is dropped"
        );
        self.overwrites.push(Overwrite {
            rule_id: id.to_string(),
            previous: rule.location.clone(),
            current,
        });
        Some(rule)
    }

    /// Records a rule whose body failed to evaluate.
    pub fn record_failure(&mut self, error: EvaluationError) {
        warn!(
            rule_id = error.rule_id.as_deref().unwrap_or_default(),
            source = %error.source_id,
            line = error.line,
            message = %error.message,
            "Rule failed to evaluate"
        );
        self.failures.push(error);
    }

    /// Rules in registration order.
    pub fn all(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|r| (r.id.as_str(), r))
    }

    /// Rules in registration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Looks up a rule.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&pos| &self.rules[pos])
    }

    /// Rules whose bodies failed to evaluate.
    #[must_use]
    pub fn failures(&self) -> &[EvaluationError] {
        &self.failures
    }

    /// Recorded overwrites in the order they happened.
    #[must_use]
    pub fn overwrites(&self) -> &[Overwrite] {
        &self.overwrites
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rule is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
