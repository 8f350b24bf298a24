//! End-to-end tests for the runner.
//!
//! These tests drive whole runs through the public API: resolve profiles
//! from inline content and temporary directories, execute them against an
//! in-memory target and inspect the summary.

use std::fs;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use vulcano_core::{ErrorKind, MockBackend, Outcome, ProfileRef, RunStatus, Totals, Verdict};
use vulcano_runner::{JsonReporter, Reporter, RunConfig, Runner};

const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
alice:x:1000:1000:Alice:/home/alice:/bin/bash
";

fn runner() -> Runner {
    Runner::new(
        RunConfig::default(),
        Arc::new(MockBackend::new().with_file("/etc/passwd", PASSWD)),
    )
}

fn summary_json(profile: &str) -> serde_json::Value {
    let summary = runner().run(&[ProfileRef::inline("inline", profile)]);
    let mut out = Vec::new();
    JsonReporter::new().report(&summary, &mut out).unwrap();
    serde_json::from_slice(&out).unwrap()
}

// =============================================================================
// End-to-end verdicts
// =============================================================================

#[test]
fn test_true_literal_passes() {
    let json = summary_json(
        r#"
rule "r1" do
  describe true do
    it { should eq true }
  end
end
"#,
    );
    assert_eq!(json["rule_results"][0]["id"], "r1");
    assert_eq!(json["rule_results"][0]["verdict"], "pass");
    assert_eq!(json["rule_results"][0]["leaf_outcomes"], json!(["pass"]));
    assert_eq!(json["totals"], json!({"passed": 1, "failed": 0, "skipped": 0}));
}

#[test]
fn test_false_literal_fails() {
    let json = summary_json(
        r#"
rule "r2" do
  describe false do
    it { should eq true }
  end
end
"#,
    );
    assert_eq!(json["rule_results"][0]["id"], "r2");
    assert_eq!(json["rule_results"][0]["verdict"], "fail");
    assert_eq!(json["rule_results"][0]["leaf_outcomes"], json!(["fail"]));
    assert_eq!(json["totals"], json!({"passed": 0, "failed": 1, "skipped": 0}));
}

#[test]
fn test_raising_rule_is_flagged_separately() {
    let summary = runner().run(&[ProfileRef::inline(
        "mixed.vul",
        r#"
rule "broken" do
  impact 4
end
rule "healthy" do
  describe passwd.uids(0) do
    its("users") { should eq ["root"] }
  end
end
"#,
    )]);

    assert_eq!(summary.rule_results.len(), 1);
    assert_eq!(summary.rule("healthy").map(|r| r.verdict), Some(Verdict::Pass));
    assert_eq!(summary.errors.len(), 1);
    let error = &summary.errors[0];
    assert_eq!(error.kind, ErrorKind::Evaluation);
    assert_eq!(error.rule_id.as_deref(), Some("broken"));
    assert_eq!(error.line, Some(3));
    assert_eq!(summary.status(), RunStatus::Incomplete);
    assert_ne!(summary.status(), RunStatus::Passed);
}

#[test]
fn test_duplicate_rule_second_declaration_runs() {
    let summary = runner().run(&[ProfileRef::inline(
        "dup.vul",
        r#"
rule "r1" do
  describe 1 do
    it { should eq 2 }
  end
end
rule "r1" do
  describe 1 do
    it { should eq 1 }
    it { should be_in [1, 2] }
  end
end
"#,
    )]);
    assert_eq!(summary.rule_results.len(), 1);
    assert_eq!(
        summary.rule_results[0].leaf_outcomes,
        [Outcome::Pass, Outcome::Pass]
    );
}

#[test]
fn test_nested_groups_attribute_every_leaf() {
    let summary = runner().run(&[ProfileRef::inline(
        "nested.vul",
        r#"
rule "accounts" do
  describe passwd do
    describe passwd.uids(0) do
      its("users") { should eq ["root"] }
    end
    describe passwd.shells(regex("nologin")) do
      its("users") { should eq ["daemon"] }
    end
    its("count") { should eq 3 }
  end
end
"#,
    )]);
    let rule = summary.rule("accounts").unwrap();
    assert_eq!(rule.leaves.len(), 3);
    assert!(rule.leaves.iter().all(|l| l.rule_id == "accounts"));
    assert_eq!(rule.verdict, Verdict::Pass);
}

#[test]
fn test_execution_error_is_distinct_from_failure() {
    let summary = runner().run(&[ProfileRef::inline(
        "err.vul",
        r#"
rule "e1" do
  describe passwd("/etc/missing") do
    its("users") { should be_empty }
  end
end
rule "f1" do
  describe passwd do
    its("count") { should eq 0 }
  end
end
"#,
    )]);
    assert_eq!(summary.rule("e1").unwrap().leaf_outcomes, [Outcome::Error]);
    assert_eq!(summary.rule("f1").unwrap().leaf_outcomes, [Outcome::Fail]);
    assert_eq!(summary.leaf_totals.errored, 1);
    assert_eq!(summary.leaf_totals.failed, 1);
    assert_eq!(summary.status(), RunStatus::Failed);
}

#[test]
fn test_skip_verdict() {
    let summary = runner().run(&[ProfileRef::inline(
        "skip.vul",
        "rule 's1' do\n  skip 'not applicable'\nend\n",
    )]);
    let rule = summary.rule("s1").unwrap();
    assert_eq!(rule.verdict, Verdict::Skip);
    assert_eq!(rule.leaves[0].message.as_deref(), Some("not applicable"));
    assert_eq!(summary.status(), RunStatus::Skipped);
}

// =============================================================================
// Directory profiles
// =============================================================================

#[test]
fn test_directory_profile_with_metadata() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("vulcano.yml"),
        "name: linux-baseline\ntitle: Linux Baseline\nversion: 2.1.0\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("10-users.vul"),
        "rule 'users-01' do\n  describe passwd.users do\n    it { should include 'alice' }\n  end\nend\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("20-shells.vul"),
        "rule 'shells-01' do\n  describe passwd.users('root') do\n    its('shells') { should eq ['/bin/bash'] }\n  end\nend\n",
    )
    .unwrap();

    let summary = runner().run(&[ProfileRef::Path(dir.path().to_path_buf())]);
    let ids: Vec<_> = summary.rule_results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["users-01", "shells-01"]);
    assert!(summary.rule_results.iter().all(|r| r.profile_id == "linux-baseline"));
    assert_eq!(summary.profiles.len(), 2);
    assert_eq!(summary.profiles[0].title.as_deref(), Some("Linux Baseline"));
    assert_eq!(summary.profiles[0].sha256.len(), 64);
    assert_eq!(summary.status(), RunStatus::Passed);
}

#[test]
fn test_line_offset_applies_to_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.vul");
    fs::write(&path, "rule 'r1' do\n  describe nope do\n    it { should exist }\n  end\nend\n").unwrap();

    let runner = Runner::new(
        RunConfig::new().with_line_offset(10),
        Arc::new(MockBackend::new()),
    );
    let summary = runner.run(&[ProfileRef::Path(path)]);
    assert_eq!(summary.errors[0].kind, ErrorKind::Evaluation);
    assert_eq!(summary.errors[0].line, Some(11));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn totals_match_verdicts(values in prop::collection::vec((0i64..3, 0i64..3), 1..12)) {
        let profile: String = values
            .iter()
            .enumerate()
            .map(|(i, (actual, expected))| {
                format!("rule 'r{i}' do\n  describe {actual} do\n    it {{ should eq {expected} }}\n  end\nend\n")
            })
            .collect();
        let summary = runner().run(&[ProfileRef::inline("gen", profile)]);

        let passed = values.iter().filter(|(a, e)| a == e).count();
        prop_assert_eq!(
            summary.totals,
            Totals { passed, failed: values.len() - passed, skipped: 0 }
        );
        prop_assert_eq!(summary.rule_results.len(), values.len());
        for (i, result) in summary.rule_results.iter().enumerate() {
            prop_assert_eq!(&result.id, &format!("r{i}"));
        }
    }
}
