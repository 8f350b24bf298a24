//! Result aggregation.
//!
//! Groups leaf results by rule and derives one [`Verdict`] per rule plus
//! rule and leaf totals.

use tracing::warn;
use vulcano_core::{LeafTotals, RuleResult, Totals, Verdict};

use crate::engine::RuleRun;

/// Per-rule verdicts and totals of one execution.
#[derive(Debug, Default, Clone)]
pub struct Aggregate {
    /// Rule results in execution order.
    pub rule_results: Vec<RuleResult>,
    /// Rule counts by verdict.
    pub totals: Totals,
    /// Leaf counts by outcome.
    pub leaf_totals: LeafTotals,
}

impl Aggregate {
    /// Rule IDs and verdicts in execution order.
    pub fn verdicts(&self) -> impl Iterator<Item = (&str, Verdict)> {
        self.rule_results.iter().map(|r| (r.id.as_str(), r.verdict))
    }
}

/// Aggregates executed rules.
///
/// A leaf whose rule ID differs from the rule it was executed under is
/// dropped with a warning; it cannot be attributed.
#[must_use]
pub fn aggregate(runs: Vec<RuleRun>) -> Aggregate {
    let mut aggregate = Aggregate::default();

    for run in runs {
        let info = run.rule.info;
        let leaves: Vec<_> = run
            .leaves
            .into_iter()
            .filter(|leaf| {
                let owned = leaf.rule_id == info.id;
                if !owned {
                    warn!(rule_id = %info.id, leaf_rule_id = %leaf.rule_id, "Dropping misattributed leaf");
                }
                owned
            })
            .collect();

        let leaf_outcomes: Vec<_> = leaves.iter().map(|l| l.outcome).collect();
        for outcome in &leaf_outcomes {
            aggregate.leaf_totals.record(*outcome);
        }
        let verdict = Verdict::from_outcomes(&leaf_outcomes);
        aggregate.totals.record(verdict);

        aggregate.rule_results.push(RuleResult {
            id: info.id,
            profile_id: info.profile_id,
            title: info.title,
            impact: info.impact,
            source: info.location,
            verdict,
            leaf_outcomes,
            leaves,
        });
    }

    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vulcano_compiler::RuleInfo;
    use vulcano_core::{LeafResult, Outcome, SourceLocation};

    use crate::world::RegisteredRule;

    fn run(id: &str, outcomes: &[Outcome]) -> RuleRun {
        RuleRun {
            rule: RegisteredRule {
                info: RuleInfo {
                    profile_id: "p".to_string(),
                    id: id.to_string(),
                    title: Some(format!("Rule {id}")),
                    impact: Some(0.5),
                    location: SourceLocation::new("p.vul", 1),
                },
                units: Vec::new(),
            },
            leaves: outcomes
                .iter()
                .map(|&outcome| LeafResult {
                    rule_id: id.to_string(),
                    description: "leaf".to_string(),
                    outcome,
                    message: None,
                    location: SourceLocation::new("p.vul", 2),
                    duration: Duration::ZERO,
                })
                .collect(),
        }
    }

    #[test]
    fn test_verdicts_and_totals() {
        let aggregate = aggregate(vec![
            run("pass", &[Outcome::Pass, Outcome::Pass]),
            run("fail", &[Outcome::Pass, Outcome::Fail]),
            run("error", &[Outcome::Error, Outcome::Skip]),
            run("skip", &[Outcome::Skip]),
            run("empty", &[]),
        ]);

        let verdicts: Vec<_> = aggregate.verdicts().collect();
        assert_eq!(
            verdicts,
            [
                ("pass", Verdict::Pass),
                ("fail", Verdict::Fail),
                ("error", Verdict::Fail),
                ("skip", Verdict::Skip),
                ("empty", Verdict::Skip),
            ]
        );
        assert_eq!(
            aggregate.totals,
            Totals {
                passed: 1,
                failed: 2,
                skipped: 2
            }
        );
        assert_eq!(
            aggregate.leaf_totals,
            LeafTotals {
                passed: 3,
                failed: 1,
                errored: 1,
                skipped: 2
            }
        );
    }

    #[test]
    fn test_misattributed_leaf_is_dropped() {
        let mut r = run("r1", &[Outcome::Pass]);
        r.leaves[0].rule_id = "other".to_string();
        let aggregate = aggregate(vec![r]);
        assert!(aggregate.rule_results[0].leaves.is_empty());
        assert_eq!(aggregate.rule_results[0].verdict, Verdict::Skip);
    }

    #[test]
    fn test_rule_metadata_is_carried() {
        let aggregate = aggregate(vec![run("r1", &[Outcome::Pass])]);
        let result = &aggregate.rule_results[0];
        assert_eq!(result.title.as_deref(), Some("Rule r1"));
        assert_eq!(result.impact, Some(0.5));
        assert_eq!(result.profile_id, "p");
    }
}
