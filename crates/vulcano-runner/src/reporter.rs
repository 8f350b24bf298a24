//! Run reporting.
//!
//! This module provides formatters for run summaries.

use std::fmt::Write as FmtWrite;
use std::io::{self, Write};

use vulcano_core::{LeafResult, Outcome, RuleResult, RunStatus, RunSummary, Verdict};

/// Trait for reporting run summaries.
pub trait Reporter {
    /// Writes `summary` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if writing to output fails.
    fn report(&self, summary: &RunSummary, out: &mut dyn Write) -> io::Result<()>;
}

/// Console reporter with one line per rule and per leaf.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// Whether to use colors.
    use_colors: bool,
    /// Whether to print passing leaves too.
    verbose: bool,
}

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

impl ConsoleReporter {
    /// Creates a new console reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            use_colors: true,
            verbose: true,
        }
    }

    /// Sets whether to use colors.
    #[must_use]
    pub const fn with_colors(mut self, colors: bool) -> Self {
        self.use_colors = colors;
        self
    }

    /// Sets verbose mode.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn verdict_symbol(&self, verdict: Verdict) -> String {
        match verdict {
            Verdict::Pass => self.paint(GREEN, "✓"),
            Verdict::Fail => self.paint(RED, "✗"),
            Verdict::Skip => self.paint(YELLOW, "↺"),
        }
    }

    fn outcome_symbol(&self, outcome: Outcome) -> String {
        match outcome {
            Outcome::Pass => self.paint(GREEN, "✓"),
            Outcome::Fail | Outcome::Error => self.paint(RED, "✗"),
            Outcome::Skip => self.paint(YELLOW, "↺"),
        }
    }

    /// Formats a rule header line.
    fn format_rule(&self, rule: &RuleResult) -> String {
        let mut line = format!("  {} {}", self.verdict_symbol(rule.verdict), rule.id);
        if let Some(title) = &rule.title {
            let _ = write!(line, ": {title}");
        }
        line
    }

    /// Formats a leaf line with its message, if any.
    fn format_leaf(&self, leaf: &LeafResult) -> String {
        let mut line = format!("     {} {}", self.outcome_symbol(leaf.outcome), leaf.description);
        if leaf.outcome == Outcome::Error {
            line.push_str(" (error)");
        }
        if let Some(message) = &leaf.message {
            for text in message.lines() {
                let _ = write!(line, "\n       {text}");
            }
        }
        line
    }

    /// Formats the summary lines.
    fn format_summary(&self, summary: &RunSummary) -> String {
        let status = match summary.status() {
            RunStatus::Passed => self.paint(GREEN, "PASSED"),
            RunStatus::Skipped => self.paint(YELLOW, "SKIPPED"),
            RunStatus::Failed => self.paint(RED, "FAILED"),
            RunStatus::Incomplete => self.paint(RED, "INCOMPLETE"),
        };
        let totals = summary.totals;
        let leaves = summary.leaf_totals;
        format!(
            "\n{status}\nRule Summary: {} passed, {} failed, {} skipped\nTest Summary: {} passed, {} failed, {} errors, {} skipped ({:.2}s)",
            totals.passed,
            totals.failed,
            totals.skipped,
            leaves.passed,
            leaves.failed,
            leaves.errored,
            leaves.skipped,
            summary.duration.as_secs_f64()
        )
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, summary: &RunSummary, out: &mut dyn Write) -> io::Result<()> {
        let mut current_profile = None;
        for rule in &summary.rule_results {
            if current_profile != Some(rule.profile_id.as_str()) {
                let title = summary
                    .profiles
                    .iter()
                    .find(|p| p.id == rule.profile_id)
                    .and_then(|p| p.title.as_deref());
                match title {
                    Some(title) => writeln!(out, "\nProfile: {title} ({})", rule.profile_id)?,
                    None => writeln!(out, "\nProfile: {}", rule.profile_id)?,
                }
                writeln!(out, "{}", "─".repeat(50))?;
                current_profile = Some(rule.profile_id.as_str());
            }

            writeln!(out, "{}", self.format_rule(rule))?;
            for leaf in &rule.leaves {
                if self.verbose || leaf.outcome != Outcome::Pass {
                    writeln!(out, "{}", self.format_leaf(leaf))?;
                }
            }
        }

        if !summary.errors.is_empty() {
            writeln!(out, "\nErrors:")?;
            writeln!(out, "{}", "─".repeat(50))?;
            for error in &summary.errors {
                writeln!(out, "  {} {error}", self.paint(RED, "!"))?;
            }
        }

        writeln!(out, "{}", self.format_summary(summary))?;
        Ok(())
    }
}

/// JSON reporter that outputs the summary as JSON.
#[derive(Debug, Default)]
pub struct JsonReporter {
    /// Whether to pretty-print the JSON.
    pretty: bool,
}

impl JsonReporter {
    /// Creates a new JSON reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to pretty-print.
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Reporter for JsonReporter {
    fn report(&self, summary: &RunSummary, out: &mut dyn Write) -> io::Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(summary)
        } else {
            serde_json::to_string(summary)
        }
        .map_err(io::Error::other)?;

        writeln!(out, "{json}")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vulcano_core::{ErrorKind, RunError, SourceLocation, Totals};

    fn leaf(description: &str, outcome: Outcome, message: Option<&str>) -> LeafResult {
        LeafResult {
            rule_id: "r1".to_string(),
            description: description.to_string(),
            outcome,
            message: message.map(str::to_string),
            location: SourceLocation::new("p.vul", 3),
            duration: Duration::from_millis(1),
        }
    }

    fn sample_summary() -> RunSummary {
        let mut summary = RunSummary::new();
        summary.rule_results.push(RuleResult {
            id: "r1".to_string(),
            profile_id: "base".to_string(),
            title: Some("Root only".to_string()),
            impact: Some(1.0),
            source: SourceLocation::new("p.vul", 1),
            verdict: Verdict::Fail,
            leaf_outcomes: vec![Outcome::Pass, Outcome::Fail],
            leaves: vec![
                leaf("passwd users should include \"root\"", Outcome::Pass, None),
                leaf("passwd count should eq 1", Outcome::Fail, Some("expected 2 to eq 1")),
            ],
        });
        summary.totals = Totals {
            passed: 0,
            failed: 1,
            skipped: 0,
        };
        summary.leaf_totals.record(Outcome::Pass);
        summary.leaf_totals.record(Outcome::Fail);
        summary
    }

    #[test]
    fn test_console_reporter_rule_lines() {
        let reporter = ConsoleReporter::new().with_colors(false);
        let mut out = Vec::new();
        reporter.report(&sample_summary(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Profile: base"));
        assert!(text.contains("  ✗ r1: Root only"));
        assert!(text.contains("     ✓ passwd users should include \"root\""));
        assert!(text.contains("     ✗ passwd count should eq 1\n       expected 2 to eq 1"));
        assert!(text.contains("FAILED"));
        assert!(text.contains("Rule Summary: 0 passed, 1 failed, 0 skipped"));
        assert!(!text.contains("\x1b["));
    }

    #[test]
    fn test_console_reporter_quiet_hides_passing_leaves() {
        let reporter = ConsoleReporter::new().with_colors(false).with_verbose(false);
        let mut out = Vec::new();
        reporter.report(&sample_summary(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("should include"));
        assert!(text.contains("should eq 1"));
    }

    #[test]
    fn test_console_reporter_errors_section() {
        let mut summary = sample_summary();
        summary.errors.push(
            RunError::new(ErrorKind::Evaluation, "bad.vul", "undefined name `x`").with_line(4),
        );
        let mut out = Vec::new();
        ConsoleReporter::new()
            .with_colors(false)
            .report(&summary, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("! evaluation error in bad.vul:4: undefined name `x`"));
        assert!(text.contains("INCOMPLETE"));
    }

    #[test]
    fn test_console_reporter_colors() {
        let mut out = Vec::new();
        ConsoleReporter::new().report(&sample_summary(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\x1b[31m✗\x1b[0m"));
    }

    #[test]
    fn test_json_reporter() {
        let mut out = Vec::new();
        JsonReporter::new().report(&sample_summary(), &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["rule_results"][0]["id"], "r1");
        assert_eq!(json["rule_results"][0]["verdict"], "fail");
        assert_eq!(json["rule_results"][0]["leaf_outcomes"][1], "fail");
        assert_eq!(json["totals"]["failed"], 1);
        assert_eq!(json["leaf_totals"]["passed"], 1);
    }

    #[test]
    fn test_json_reporter_pretty() {
        let mut out = Vec::new();
        JsonReporter::new()
            .with_pretty(true)
            .report(&sample_summary(), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\n  \"run_id\""));
    }
}
