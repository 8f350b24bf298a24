//! Process-wide registration surface of the execution engine.
//!
//! The compiler registers each rule's units here. Registration is
//! append-only and order-preserving behind one coarse lock, so profiles
//! compiled from different threads never interleave within a rule.

use parking_lot::Mutex;
use tracing::debug;
use vulcano_compiler::{RuleInfo, UnitSink};
use vulcano_core::TestUnit;

/// A rule and its compiled units.
#[derive(Debug, Clone)]
pub struct RegisteredRule {
    /// Rule metadata.
    pub info: RuleInfo,
    /// Units in check order.
    pub units: Vec<TestUnit>,
}

/// Ordered collection of registered rules.
#[derive(Debug, Default)]
pub struct World {
    rules: Mutex<Vec<RegisteredRule>>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.lock().is_empty()
    }

    /// Removes and returns every registered rule in registration order.
    #[must_use]
    pub fn take(&self) -> Vec<RegisteredRule> {
        std::mem::take(&mut *self.rules.lock())
    }
}

impl UnitSink for World {
    fn register(&self, rule: RuleInfo, units: Vec<TestUnit>) -> Result<(), String> {
        for unit in &units {
            if let Some(orphan) = unit.first_unstamped() {
                return Err(format!(
                    "unit `{}` at {} carries no rule ID",
                    orphan.description, orphan.location
                ));
            }
            let mut foreign = None;
            unit.walk(&mut |u| {
                if foreign.is_none() && u.rule_id.as_deref() != Some(rule.id.as_str()) {
                    foreign = u.rule_id.clone();
                }
            });
            if let Some(other) = foreign {
                return Err(format!(
                    "unit `{}` is stamped with rule '{other}', expected '{}'",
                    unit.description, rule.id
                ));
            }
        }

        debug!(rule_id = %rule.id, profile_id = %rule.profile_id, units = units.len(), "Registered units");
        self.rules.lock().push(RegisteredRule { info: rule, units });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulcano_compiler::propagate_rule_id;
    use vulcano_core::{SourceLocation, Subject, Value};

    fn info(id: &str) -> RuleInfo {
        RuleInfo {
            profile_id: "p".to_string(),
            id: id.to_string(),
            title: None,
            impact: None,
            location: SourceLocation::new("p.vul", 1),
        }
    }

    fn tree() -> TestUnit {
        TestUnit::group(
            "root",
            SourceLocation::new("p.vul", 2),
            Some(Subject::constant(Value::Int(1))),
        )
        .with_child(TestUnit::pending("later", SourceLocation::new("p.vul", 3), "todo"))
    }

    #[test]
    fn test_register_preserves_order() {
        let world = World::new();
        for id in ["b", "a", "c"] {
            let mut unit = tree();
            propagate_rule_id(&mut unit, id);
            world.register(info(id), vec![unit]).unwrap();
        }
        let ids: Vec<_> = world.take().into_iter().map(|r| r.info.id).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert!(world.is_empty());
    }

    #[test]
    fn test_rejects_unstamped_units() {
        let world = World::new();
        let mut unit = tree();
        unit.rule_id = Some("r1".to_string());
        let err = world.register(info("r1"), vec![unit]).unwrap_err();
        assert!(err.contains("later"), "{err}");
        assert_eq!(world.len(), 0);
    }

    #[test]
    fn test_rejects_foreign_stamp() {
        let world = World::new();
        let mut unit = tree();
        propagate_rule_id(&mut unit, "other");
        assert!(world.register(info("r1"), vec![unit]).is_err());
    }
}
