//! Profile linting rules.
//!
//! This module provides lint rules for evaluated profiles. They flag
//! conditions that are legal but probably unintended, such as a rule ID
//! declared twice.

use serde::{Deserialize, Serialize};

use crate::registry::Registry;

/// Severity level for lint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational hint.
    Hint,
    /// Warning - may indicate a problem.
    Warning,
    /// Error - definitely a problem.
    Error,
}

impl Severity {
    /// Returns the string representation for display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hint => "hint",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A lint rule that can be applied to an evaluated profile.
#[derive(Debug, Clone)]
pub struct LintRule {
    /// Unique identifier for the lint.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Description of what the lint checks.
    pub description: &'static str,
    /// Severity of violations.
    pub severity: Severity,
    /// Whether the lint is enabled by default.
    pub enabled_by_default: bool,
}

/// A violation found by a lint rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintViolation {
    /// The lint that was violated.
    pub lint: String,
    /// Profile rule the violation concerns.
    pub rule_id: Option<String>,
    /// Severity of the violation.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Line number (1-based, if applicable).
    pub line: Option<usize>,
    /// Suggestion for fixing the violation.
    pub suggestion: Option<String>,
}

impl LintViolation {
    /// Creates a new lint violation.
    #[must_use]
    pub fn new(lint: &LintRule, message: impl Into<String>) -> Self {
        Self {
            lint: lint.id.to_string(),
            rule_id: None,
            severity: lint.severity,
            message: message.into(),
            line: None,
            suggestion: None,
        }
    }

    /// Sets the affected rule.
    #[must_use]
    pub fn for_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Sets the line number.
    #[must_use]
    pub const fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Overrides the lint's default severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Lint: a rule ID is declared more than once. A declaration that replaces
/// itself, as a loop with a constant ID does, is an error: only the last
/// iteration survives.
pub const LINT_DUPLICATE_RULE_ID: LintRule = LintRule {
    id: "duplicate-rule-id",
    name: "Duplicate Rule ID",
    description: "A later rule with the same ID silently replaces the earlier one",
    severity: Severity::Warning,
    enabled_by_default: true,
};

/// Lint: a rule has no checks.
pub const LINT_EMPTY_RULE: LintRule = LintRule {
    id: "empty-rule",
    name: "Empty Rule",
    description: "Rules without checks are always reported as skipped",
    severity: Severity::Warning,
    enabled_by_default: true,
};

/// Lint: a rule has no title.
pub const LINT_MISSING_TITLE: LintRule = LintRule {
    id: "missing-title",
    name: "Missing Title",
    description: "Rules should carry a human readable title",
    severity: Severity::Hint,
    enabled_by_default: true,
};

/// Lint: a `describe` appears outside any rule.
pub const LINT_GENERATED_RULE_ID: LintRule = LintRule {
    id: "generated-rule-id",
    name: "Generated Rule ID",
    description: "Top-level describe blocks get IDs that change when lines move",
    severity: Severity::Hint,
    enabled_by_default: true,
};

/// The default set of lint rules.
pub static DEFAULT_LINTS: &[&LintRule] = &[
    &LINT_DUPLICATE_RULE_ID,
    &LINT_EMPTY_RULE,
    &LINT_MISSING_TITLE,
    &LINT_GENERATED_RULE_ID,
];

/// A linter for evaluated profiles.
#[derive(Debug, Default)]
pub struct Linter {
    /// Enabled lint IDs.
    enabled: Vec<&'static str>,
}

impl Linter {
    /// Creates a new linter with the default lints.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: DEFAULT_LINTS
                .iter()
                .filter(|l| l.enabled_by_default)
                .map(|l| l.id)
                .collect(),
        }
    }

    /// Enables a lint by ID.
    pub fn enable(&mut self, lint_id: &'static str) {
        if !self.enabled.contains(&lint_id) {
            self.enabled.push(lint_id);
        }
    }

    /// Disables a lint by ID.
    pub fn disable(&mut self, lint_id: &str) {
        self.enabled.retain(|&id| id != lint_id);
    }

    /// Checks if a lint is enabled.
    #[must_use]
    pub fn is_enabled(&self, lint_id: &str) -> bool {
        self.enabled.contains(&lint_id)
    }

    /// Lints an evaluated registry.
    #[must_use]
    pub fn lint(&self, registry: &Registry) -> Vec<LintViolation> {
        let mut violations = Vec::new();

        if self.is_enabled(LINT_DUPLICATE_RULE_ID.id) {
            for overwrite in registry.overwrites() {
                let violation = if overwrite.previous == overwrite.current {
                    LintViolation::new(
                        &LINT_DUPLICATE_RULE_ID,
                        format!(
                            "rule '{}' at {} gets the same ID on every iteration; only the last one is kept",
                            overwrite.rule_id, overwrite.current
                        ),
                    )
                    .with_severity(Severity::Error)
                    .with_suggestion("Derive the rule ID from the loop variable")
                } else {
                    LintViolation::new(
                        &LINT_DUPLICATE_RULE_ID,
                        format!(
                            "rule '{}' declared at {} replaces the declaration at {}",
                            overwrite.rule_id, overwrite.current, overwrite.previous
                        ),
                    )
                    .with_suggestion("Give each rule a unique ID")
                };
                violations.push(
                    violation
                        .for_rule(&overwrite.rule_id)
                        .at_line(overwrite.current.line),
                );
            }
        }

        for rule in registry.rules() {
            if self.is_enabled(LINT_EMPTY_RULE.id) && rule.checks.is_empty() {
                violations.push(
                    LintViolation::new(&LINT_EMPTY_RULE, format!("rule '{}' has no checks", rule.id))
                        .for_rule(&rule.id)
                        .at_line(rule.location.line)
                        .with_suggestion("Add a describe block or remove the rule"),
                );
            }
            if rule.generated {
                if self.is_enabled(LINT_GENERATED_RULE_ID.id) {
                    violations.push(
                        LintViolation::new(
                            &LINT_GENERATED_RULE_ID,
                            format!("describe at {} is not inside a rule", rule.location),
                        )
                        .for_rule(&rule.id)
                        .at_line(rule.location.line)
                        .with_suggestion("Wrap the describe in `rule \"ID\" do ... end`"),
                    );
                }
            } else if self.is_enabled(LINT_MISSING_TITLE.id) && rule.title.is_none() {
                violations.push(
                    LintViolation::new(&LINT_MISSING_TITLE, format!("rule '{}' has no title", rule.id))
                        .for_rule(&rule.id)
                        .at_line(rule.location.line),
                );
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextConfig, ProfileContext};
    use std::sync::Arc;
    use vulcano_core::MockBackend;

    fn lint(source: &str) -> Vec<LintViolation> {
        let registry = ProfileContext::new(ContextConfig::new(Arc::new(MockBackend::new())))
            .evaluate(source, "p.vul", 1)
            .unwrap();
        Linter::new().lint(&registry)
    }

    fn ids(violations: &[LintViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.lint.as_str()).collect()
    }

    #[test]
    fn test_duplicate_rule_id() {
        let violations = lint(
            "rule 'r1' do\n  title 'a'\n  skip\nend\nrule 'r1' do\n  title 'b'\n  skip\nend\n",
        );
        assert_eq!(ids(&violations), ["duplicate-rule-id"]);
        assert_eq!(violations[0].line, Some(5));
        assert_eq!(violations[0].severity, Severity::Warning);
    }

    #[test]
    fn test_constant_id_in_loop_is_an_error() {
        let violations = lint("for u in ['a', 'b'] do\n  rule 'r1' do\n    title u\n    skip\n  end\nend\n");
        assert_eq!(ids(&violations), ["duplicate-rule-id"]);
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(violations[0].line, Some(2));
    }

    #[test]
    fn test_generated_rules_in_loop_are_not_duplicates() {
        let violations = lint("for u in [1, 2] do\n  describe u do\n    it { should eq 1 }\n  end\nend\n");
        assert_eq!(ids(&violations), ["generated-rule-id"]);
    }

    #[test]
    fn test_empty_rule_and_missing_title() {
        let violations = lint("rule 'r1' do\nend\n");
        assert_eq!(ids(&violations), ["empty-rule", "missing-title"]);
    }

    #[test]
    fn test_generated_rule() {
        let violations = lint("describe 1 do\n  it { should eq 1 }\nend\n");
        assert_eq!(ids(&violations), ["generated-rule-id"]);
        assert_eq!(violations[0].severity, Severity::Hint);
    }

    #[test]
    fn test_disable_lint() {
        let registry = ProfileContext::new(ContextConfig::new(Arc::new(MockBackend::new())))
            .evaluate("rule 'r1' do\nend\n", "p.vul", 1)
            .unwrap();
        let mut linter = Linter::new();
        linter.disable("missing-title");
        assert_eq!(ids(&linter.lint(&registry)), ["empty-rule"]);
        linter.enable("missing-title");
        assert!(linter.is_enabled("missing-title"));
    }

    #[test]
    fn test_violation_serializes() {
        let violations = lint("rule 'r1' do\nend\n");
        let json = serde_json::to_value(&violations[0]).unwrap();
        assert_eq!(json["lint"], "empty-rule");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["rule_id"], "r1");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Hint);
    }
}
