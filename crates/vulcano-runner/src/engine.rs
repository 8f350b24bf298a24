//! Execution engine.
//!
//! Executes registered rules in registration order. Each group resolves its
//! subject once, against the enclosing group's subject, and every leaf ends
//! in exactly one [`Outcome`]. A subject that fails to resolve turns every
//! leaf below it into an `error`; an unmet expectation is a `fail`.

use std::time::Instant;

use tracing::{debug, info, warn};
use vulcano_core::{Expectation, LeafResult, Outcome, TestUnit, UnitKind, Value};

use crate::world::RegisteredRule;

/// Leaves produced by one rule, in execution order.
#[derive(Debug, Clone)]
pub struct RuleRun {
    /// The executed rule.
    pub rule: RegisteredRule,
    /// Leaf results.
    pub leaves: Vec<LeafResult>,
}

/// Executes registered rules.
#[derive(Debug, Default, Clone)]
pub struct Executor {
    fail_fast: bool,
}

type Resolved = Result<Value, String>;

impl Executor {
    /// Creates an executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips all remaining leaves after the first fail or error.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Executes `rules` in order.
    #[must_use]
    pub fn run(&self, rules: Vec<RegisteredRule>) -> Vec<RuleRun> {
        let start = Instant::now();
        let mut state = State {
            fail_fast: self.fail_fast,
            stopped: false,
        };

        let runs: Vec<RuleRun> = rules
            .into_iter()
            .map(|rule| {
                let mut leaves = Vec::new();
                for unit in &rule.units {
                    state.execute(unit, &rule.info.id, None, &[], &mut leaves);
                }
                debug!(rule_id = %rule.info.id, leaves = leaves.len(), "Executed rule");
                RuleRun { rule, leaves }
            })
            .collect();

        info!(
            rules = runs.len(),
            duration_ms = start.elapsed().as_millis(),
            "Execution complete"
        );
        runs
    }
}

struct State {
    fail_fast: bool,
    stopped: bool,
}

impl State {
    fn execute(
        &mut self,
        unit: &TestUnit,
        owner: &str,
        subject: Option<&Resolved>,
        path: &[&str],
        out: &mut Vec<LeafResult>,
    ) {
        let mut path = path.to_vec();
        path.push(&unit.description);

        match &unit.kind {
            UnitKind::Group { subject: own } => {
                let resolved = match (own, subject) {
                    (_, _) if self.stopped => None,
                    (Some(_), Some(Err(e))) => Some(Err(e.clone())),
                    (Some(s), parent) => {
                        Some(s.resolve(parent.and_then(|p| p.as_ref().ok())))
                    }
                    (None, parent) => parent.cloned(),
                };
                if let Some(Err(e)) = &resolved {
                    warn!(rule_id = owner, subject = %unit.description, error = %e, "Subject failed to resolve");
                }
                for child in &unit.children {
                    self.execute(child, owner, resolved.as_ref(), &path, out);
                }
            }
            UnitKind::Example { assertion } => {
                let start = Instant::now();
                let (outcome, message) = if self.stopped {
                    (Outcome::Skip, Some("skipped after an earlier failure".to_string()))
                } else {
                    match subject {
                        Some(Ok(value)) => match assertion.evaluate(value) {
                            Ok(Expectation::Met) => (Outcome::Pass, None),
                            Ok(Expectation::Unmet(m)) => (Outcome::Fail, Some(m)),
                            Err(e) => (Outcome::Error, Some(e)),
                        },
                        Some(Err(e)) => (Outcome::Error, Some(e.clone())),
                        None => (Outcome::Error, Some("example has no subject".to_string())),
                    }
                };
                if self.fail_fast && matches!(outcome, Outcome::Fail | Outcome::Error) {
                    self.stopped = true;
                }
                out.push(leaf(unit, owner, &path, outcome, message, start));
            }
            UnitKind::Pending { reason } => {
                out.push(leaf(
                    unit,
                    owner,
                    &path,
                    Outcome::Skip,
                    Some(reason.clone()),
                    Instant::now(),
                ));
            }
        }
    }
}

fn leaf(
    unit: &TestUnit,
    owner: &str,
    path: &[&str],
    outcome: Outcome,
    message: Option<String>,
    start: Instant,
) -> LeafResult {
    LeafResult {
        rule_id: unit.rule_id.clone().unwrap_or_else(|| owner.to_string()),
        description: path.join(" "),
        outcome,
        message,
        location: unit.location.clone(),
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulcano_compiler::{propagate_rule_id, RuleInfo};
    use vulcano_core::{Assertion, SourceLocation, Subject};

    fn loc() -> SourceLocation {
        SourceLocation::new("p.vul", 1)
    }

    fn equals(expected: i64) -> Assertion {
        Assertion::new(move |v| {
            Ok(if *v == Value::Int(expected) {
                Expectation::Met
            } else {
                Expectation::Unmet(format!("expected {v} to eq {expected}"))
            })
        })
    }

    fn rule(id: &str, units: Vec<TestUnit>) -> RegisteredRule {
        let units = units
            .into_iter()
            .map(|mut u| {
                propagate_rule_id(&mut u, id);
                u
            })
            .collect();
        RegisteredRule {
            info: RuleInfo {
                profile_id: "p".to_string(),
                id: id.to_string(),
                title: None,
                impact: None,
                location: loc(),
            },
            units,
        }
    }

    fn group(value: i64, children: Vec<TestUnit>) -> TestUnit {
        children.into_iter().fold(
            TestUnit::group(value.to_string(), loc(), Some(Subject::constant(Value::Int(value)))),
            TestUnit::with_child,
        )
    }

    fn outcomes(run: &RuleRun) -> Vec<Outcome> {
        run.leaves.iter().map(|l| l.outcome).collect()
    }

    #[test]
    fn test_outcomes() {
        let runs = Executor::new().run(vec![rule(
            "r1",
            vec![group(
                1,
                vec![
                    TestUnit::example("is one", loc(), equals(1)),
                    TestUnit::example("is two", loc(), equals(2)),
                    TestUnit::pending("later", loc(), "not yet"),
                ],
            )],
        )]);
        assert_eq!(outcomes(&runs[0]), [Outcome::Pass, Outcome::Fail, Outcome::Skip]);
        assert_eq!(runs[0].leaves[0].description, "1 is one");
        assert_eq!(runs[0].leaves[1].message.as_deref(), Some("expected 1 to eq 2"));
        assert!(runs[0].leaves.iter().all(|l| l.rule_id == "r1"));
    }

    #[test]
    fn test_subject_error_is_error_outcome() {
        let broken = TestUnit::group(
            "broken",
            loc(),
            Some(Subject::new("broken", |_| Err("file not found".to_string()))),
        )
        .with_child(
            TestUnit::group(
                "nested",
                loc(),
                Some(Subject::new("nested", |p| Ok(p.cloned().unwrap_or_default()))),
            )
            .with_child(TestUnit::example("x", loc(), equals(1))),
        );
        let runs = Executor::new().run(vec![rule("r1", vec![broken])]);
        assert_eq!(outcomes(&runs[0]), [Outcome::Error]);
        assert_eq!(runs[0].leaves[0].message.as_deref(), Some("file not found"));
    }

    #[test]
    fn test_nested_subject_sees_parent() {
        let unit = group(3, vec![TestUnit::group(
            "doubled",
            loc(),
            Some(Subject::new("doubled", |p| match p {
                Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
                _ => Err("no parent".to_string()),
            })),
        )
        .with_child(TestUnit::example("is six", loc(), equals(6)))]);
        let runs = Executor::new().run(vec![rule("r1", vec![unit])]);
        assert_eq!(outcomes(&runs[0]), [Outcome::Pass]);
        assert_eq!(runs[0].leaves[0].description, "3 doubled is six");
    }

    #[test]
    fn test_fail_fast_skips_remaining() {
        let runs = Executor::new().with_fail_fast(true).run(vec![
            rule("r1", vec![group(1, vec![TestUnit::example("a", loc(), equals(2))])]),
            rule("r2", vec![group(1, vec![TestUnit::example("b", loc(), equals(1))])]),
        ]);
        assert_eq!(outcomes(&runs[0]), [Outcome::Fail]);
        assert_eq!(outcomes(&runs[1]), [Outcome::Skip]);
    }

    #[test]
    fn test_execution_order_is_registration_order() {
        let runs = Executor::new().run(vec![
            rule("z", vec![group(1, vec![TestUnit::example("a", loc(), equals(1))])]),
            rule("a", vec![group(1, vec![TestUnit::example("b", loc(), equals(1))])]),
        ]);
        let ids: Vec<_> = runs.iter().map(|r| r.rule.info.id.as_str()).collect();
        assert_eq!(ids, ["z", "a"]);
    }
}
