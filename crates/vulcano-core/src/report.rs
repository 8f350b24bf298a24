//! Result and summary types.
//!
//! These are the shapes handed to reporting sinks: per-leaf results, per-rule
//! verdicts and the run summary, including the errors that kept profiles or
//! rules from running.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::unit::SourceLocation;

/// Terminal outcome of one leaf unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Assertion met.
    Pass,
    /// Assertion not met.
    Fail,
    /// The unit faulted while executing.
    Error,
    /// The unit was not executed.
    Skip,
}

impl Outcome {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule-level judgment derived from its leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every leaf passed.
    Pass,
    /// At least one leaf failed or errored.
    Fail,
    /// Nothing failed, but not every leaf passed.
    Skip,
}

impl Verdict {
    /// Derives a verdict. A rule without leaves is skipped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vulcano_core::{Outcome, Verdict};
    ///
    /// assert_eq!(Verdict::from_outcomes(&[Outcome::Pass]), Verdict::Pass);
    /// assert_eq!(Verdict::from_outcomes(&[Outcome::Pass, Outcome::Error]), Verdict::Fail);
    /// assert_eq!(Verdict::from_outcomes(&[Outcome::Pass, Outcome::Skip]), Verdict::Skip);
    /// assert_eq!(Verdict::from_outcomes(&[]), Verdict::Skip);
    /// ```
    #[must_use]
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        if outcomes
            .iter()
            .any(|o| matches!(o, Outcome::Fail | Outcome::Error))
        {
            Self::Fail
        } else if !outcomes.is_empty() && outcomes.iter().all(|o| *o == Outcome::Pass) {
            Self::Pass
        } else {
            Self::Skip
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one executed leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafResult {
    /// Owning rule.
    pub rule_id: String,
    /// Full description (group descriptions joined with the leaf's).
    pub description: String,
    /// Outcome.
    pub outcome: Outcome,
    /// Failure, error or skip message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Declaration site.
    pub location: SourceLocation,
    /// Time spent resolving and asserting.
    pub duration: Duration,
}

/// Verdict and leaves of one rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    /// Rule ID.
    pub id: String,
    /// Profile the rule belongs to.
    pub profile_id: String,
    /// Rule title, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Rule impact, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    /// Where the rule was declared.
    pub source: SourceLocation,
    /// Rule verdict.
    pub verdict: Verdict,
    /// Leaf outcomes in execution order.
    pub leaf_outcomes: Vec<Outcome>,
    /// Leaf details in execution order.
    pub leaves: Vec<LeafResult>,
}

/// Rule counts by verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Rules that passed.
    pub passed: usize,
    /// Rules that failed.
    pub failed: usize,
    /// Rules that were skipped.
    pub skipped: usize,
}

impl Totals {
    /// Counts one verdict.
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.passed += 1,
            Verdict::Fail => self.failed += 1,
            Verdict::Skip => self.skipped += 1,
        }
    }

    /// Total number of rules.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Leaf counts by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafTotals {
    /// Leaves that passed.
    pub passed: usize,
    /// Leaves that failed.
    pub failed: usize,
    /// Leaves that errored.
    pub errored: usize,
    /// Leaves that were skipped.
    pub skipped: usize,
}

impl LeafTotals {
    /// Counts one outcome.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Fail => self.failed += 1,
            Outcome::Error => self.errored += 1,
            Outcome::Skip => self.skipped += 1,
        }
    }

    /// Total number of leaves.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.errored + self.skipped
    }
}

/// Stage at which a profile or rule was dropped from the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The reference could not be turned into content.
    Resolution,
    /// The profile (or one rule body) failed to evaluate.
    Evaluation,
    /// A rule could not be compiled into test units.
    Compilation,
    /// The run was cancelled before the rule was compiled.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolution => "resolution",
            Self::Evaluation => "evaluation",
            Self::Compilation => "compilation",
            Self::Cancelled => "cancelled",
        })
    }
}

/// A profile or rule that did not produce results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    /// Stage that failed.
    pub kind: ErrorKind,
    /// Profile reference or source ID.
    pub reference: String,
    /// Affected rule, when the error is rule-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Line within the source, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Error message.
    pub message: String,
}

impl RunError {
    /// Creates a profile-scoped error.
    #[must_use]
    pub fn new(kind: ErrorKind, reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            rule_id: None,
            line: None,
            message: message.into(),
        }
    }

    /// Sets the affected rule.
    #[must_use]
    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Sets the line.
    #[must_use]
    pub const fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error in {}", self.kind, self.reference)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        if let Some(rule_id) = &self.rule_id {
            write!(f, " (rule {rule_id})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A profile that took part in the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// Profile ID.
    pub id: String,
    /// Source identifier of the evaluated content.
    pub source: String,
    /// Hex SHA-256 of the content.
    pub sha256: String,
    /// Title from profile metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Version from profile metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Overall status of a run, in decreasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Some profile or rule could not be resolved, evaluated or compiled.
    Incomplete,
    /// At least one rule failed.
    Failed,
    /// Nothing failed but at least one rule was skipped.
    Skipped,
    /// Every rule passed.
    Passed,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Profiles evaluated.
    pub profiles: Vec<ProfileInfo>,
    /// Rule results in registration order.
    pub rule_results: Vec<RuleResult>,
    /// Rule counts.
    pub totals: Totals,
    /// Leaf counts.
    pub leaf_totals: LeafTotals,
    /// Profiles and rules that did not run.
    pub errors: Vec<RunError>,
}

impl RunSummary {
    /// Creates an empty summary stamped with a fresh run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            profiles: Vec::new(),
            rule_results: Vec::new(),
            totals: Totals::default(),
            leaf_totals: LeafTotals::default(),
            errors: Vec::new(),
        }
    }

    /// Returns the overall status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        if !self.errors.is_empty() {
            RunStatus::Incomplete
        } else if self.totals.failed > 0 {
            RunStatus::Failed
        } else if self.totals.skipped > 0 {
            RunStatus::Skipped
        } else {
            RunStatus::Passed
        }
    }

    /// Looks up a rule result by ID.
    #[must_use]
    pub fn rule(&self, id: &str) -> Option<&RuleResult> {
        self.rule_results.iter().find(|r| r.id == id)
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_from_outcomes() {
        use Outcome::{Error, Fail, Pass, Skip};
        assert_eq!(Verdict::from_outcomes(&[Pass, Pass]), Verdict::Pass);
        assert_eq!(Verdict::from_outcomes(&[Pass, Fail]), Verdict::Fail);
        assert_eq!(Verdict::from_outcomes(&[Skip, Error]), Verdict::Fail);
        assert_eq!(Verdict::from_outcomes(&[Skip, Skip]), Verdict::Skip);
        assert_eq!(Verdict::from_outcomes(&[Pass, Skip]), Verdict::Skip);
        assert_eq!(Verdict::from_outcomes(&[]), Verdict::Skip);
    }

    #[test]
    fn test_serialization_is_lowercase() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"pass\"");
        assert_eq!(serde_json::to_string(&Outcome::Error).unwrap(), "\"error\"");
        assert_eq!(
            serde_json::to_string(&ErrorKind::Evaluation).unwrap(),
            "\"evaluation\""
        );
    }

    #[test]
    fn test_status_precedence() {
        let mut summary = RunSummary::new();
        assert_eq!(summary.status(), RunStatus::Passed);

        summary.totals.record(Verdict::Skip);
        assert_eq!(summary.status(), RunStatus::Skipped);

        summary.totals.record(Verdict::Fail);
        assert_eq!(summary.status(), RunStatus::Failed);

        summary
            .errors
            .push(RunError::new(ErrorKind::Resolution, "missing.vul", "not found"));
        assert_eq!(summary.status(), RunStatus::Incomplete);
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError::new(ErrorKind::Compilation, "base.vul", "unknown matcher `equal`")
            .with_rule_id("r1")
            .with_line(4);
        assert_eq!(
            err.to_string(),
            "compilation error in base.vul:4 (rule r1): unknown matcher `equal`"
        );
    }

    #[test]
    fn test_totals() {
        let mut leaves = LeafTotals::default();
        for o in [Outcome::Pass, Outcome::Error, Outcome::Skip] {
            leaves.record(o);
        }
        assert_eq!(leaves.total(), 3);
        assert_eq!(leaves.errored, 1);
    }
}
