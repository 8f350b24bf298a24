//! Integration tests for profile evaluation and compilation.
//!
//! These tests evaluate profile source end to end through the public API,
//! compile it into a collecting sink, and walk the produced unit trees.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use vulcano_compiler::{
    parse, CompileReport, Compiler, ContextConfig, Linter, ProfileContext, Registry, RuleInfo,
    UnitSink,
};
use vulcano_core::{Expectation, MockBackend, TestUnit, UnitKind, Value};

const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
bin:x:2:2:bin:/bin:/usr/sbin/nologin
";

#[derive(Default)]
struct CollectingSink {
    rules: Mutex<Vec<(RuleInfo, Vec<TestUnit>)>>,
}

impl UnitSink for CollectingSink {
    fn register(&self, rule: RuleInfo, units: Vec<TestUnit>) -> Result<(), String> {
        if let Some(unit) = units.iter().find_map(TestUnit::first_unstamped) {
            return Err(format!("unit `{}` has no rule ID", unit.description));
        }
        self.rules
            .lock()
            .map_err(|e| e.to_string())?
            .push((rule, units));
        Ok(())
    }
}

/// Outcome of one leaf, as seen by a minimal executor.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Leaf {
    Pass(String),
    Fail(String),
    Error(String),
    Skip(String),
}

fn evaluate(source: &str) -> Registry {
    let backend = Arc::new(MockBackend::new().with_file("/etc/passwd", PASSWD));
    ProfileContext::new(ContextConfig::new(backend))
        .evaluate(source, "profile.vul", 1)
        .unwrap()
}

fn compile(source: &str) -> (CompileReport, CollectingSink) {
    let registry = evaluate(source);
    let sink = CollectingSink::default();
    let report = Compiler::new().compile("test-profile", &registry, &sink);
    (report, sink)
}

fn run_unit(unit: &TestUnit, subject: Option<&Result<Value, String>>, out: &mut Vec<(String, Leaf)>) {
    let rule_id = unit.rule_id.clone().unwrap_or_default();
    match &unit.kind {
        UnitKind::Group { subject: Some(s) } => {
            let parent = subject.and_then(|r| r.as_ref().ok());
            let resolved = match subject {
                Some(Err(e)) => Err(e.clone()),
                _ => s.resolve(parent),
            };
            for child in &unit.children {
                run_unit(child, Some(&resolved), out);
            }
        }
        UnitKind::Group { subject: None } => {
            for child in &unit.children {
                run_unit(child, subject, out);
            }
        }
        UnitKind::Example { assertion } => {
            let leaf = match subject {
                Some(Ok(value)) => match assertion.evaluate(value) {
                    Ok(Expectation::Met) => Leaf::Pass(unit.description.clone()),
                    Ok(Expectation::Unmet(m)) => Leaf::Fail(m),
                    Err(e) => Leaf::Error(e),
                },
                Some(Err(e)) => Leaf::Error(e.clone()),
                None => Leaf::Error("no subject".to_string()),
            };
            out.push((rule_id, leaf));
        }
        UnitKind::Pending { reason } => out.push((rule_id, Leaf::Skip(reason.clone()))),
    }
}

fn run(sink: &CollectingSink) -> Vec<(String, Leaf)> {
    let mut out = Vec::new();
    for (_, units) in sink.rules.lock().unwrap().iter() {
        for unit in units {
            run_unit(unit, None, &mut out);
        }
    }
    out
}

// =============================================================================
// Rule ID handling
// =============================================================================

#[test]
fn test_duplicate_rule_id_last_write_wins() {
    let (report, sink) = compile(
        r#"
rule "r1" do
  describe 1 do
    it "first" { should eq 2 }
  end
end
rule "r1" do
  describe 1 do
    it "second" { should eq 1 }
  end
end
"#,
    );
    assert!(report.errors.is_empty());
    assert_eq!(report.compiled, ["r1"]);
    assert_eq!(run(&sink), [("r1".to_string(), Leaf::Pass("second".to_string()))]);
}

#[test]
fn test_nested_leaves_carry_rule_id() {
    let (report, sink) = compile(
        r#"
rule "users" do
  describe passwd do
    its("users") { should include "root" }
    describe passwd.uids(0) do
      its("users") { should eq ["root"] }
      its("count") { should eq 1 }
    end
  end
end
"#,
    );
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let leaves = run(&sink);
    assert_eq!(leaves.len(), 3);
    for (rule_id, leaf) in &leaves {
        assert_eq!(rule_id, "users");
        assert!(matches!(leaf, Leaf::Pass(_)), "{leaf:?}");
    }
}

// =============================================================================
// Evaluation and execution
// =============================================================================

#[test]
fn test_for_loop_generates_rules() {
    let (report, sink) = compile(
        r#"
for user in ["daemon", "bin"] do
  rule "shell-" + user do
    describe passwd.users(user) do
      its("shells") { should include "/usr/sbin/nologin" }
    end
  end
end
"#,
    );
    assert_eq!(report.compiled, ["shell-daemon", "shell-bin"]);
    let leaves = run(&sink);
    assert!(leaves.iter().all(|(_, l)| matches!(l, Leaf::Pass(_))), "{leaves:?}");
}

#[test]
fn test_unresolvable_subject_is_execution_error() {
    let (report, sink) = compile(
        r#"
rule "f1" do
  describe passwd.nope do
    it { should exist }
  end
end
"#,
    );
    assert!(report.errors.is_empty());
    let leaves = run(&sink);
    assert!(matches!(leaves.as_slice(), [(_, Leaf::Error(_))]), "{leaves:?}");
}

#[test]
fn test_failing_rule_does_not_stop_profile() {
    let registry = evaluate(
        r#"
rule "bad" do
  let x = passwd.nope
end
rule "good" do
  describe true do
    it { should eq true }
  end
end
"#,
    );
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.failures().len(), 1);
    assert_eq!(registry.failures()[0].rule_id.as_deref(), Some("bad"));
    assert_eq!(registry.failures()[0].line, 3);
}

#[test]
fn test_compile_error_reports_rule_and_continues() {
    let (report, sink) = compile(
        r#"
rule "broken" do
  describe 1 do
    it { should equal 1 }
  end
end
rule "fine" do
  describe 1 do
    it { should_not eq 2 }
  end
end
"#,
    );
    assert_eq!(report.compiled, ["fine"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].rule_id, "broken");
    assert!(report.errors[0].message.contains("equal"));
    assert_eq!(run(&sink).len(), 1);
}

#[test]
fn test_profile_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("base.vul");
    std::fs::write(
        &path,
        "rule 'r1' do\n  title 'passes'\n  describe true do\n    it { should eq true }\n  end\nend\n",
    )
    .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let registry = ProfileContext::new(ContextConfig::new(Arc::new(MockBackend::new())))
        .evaluate(&content, "base.vul", 1)
        .unwrap();
    assert!(Linter::new().lint(&registry).is_empty());
    assert_eq!(registry.get("r1").and_then(|r| r.title.as_deref()), Some("passes"));
}

// =============================================================================
// Parser robustness
// =============================================================================

proptest! {
    #[test]
    fn parse_never_panics(source in "\\PC{0,200}") {
        let _ = parse(&source);
    }

    #[test]
    fn parse_never_panics_on_keywords(
        words in prop::collection::vec(
            prop::sample::select(vec![
                "rule", "do", "end", "describe", "it", "its", "{", "}", "(", ")",
                "should", "eq", "'x'", "1", "\n", ",", ".", "[", "]", "+", "let", "=",
            ]),
            0..40,
        )
    ) {
        let _ = parse(&words.join(" "));
    }
}
