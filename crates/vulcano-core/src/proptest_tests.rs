//! Property-based tests for vulcano-core.
//!
//! These tests use proptest to verify record filter invariants across many
//! randomly generated record sets.

use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};

use crate::filter::{filter_records, Condition, FilterOp, FilterSpec, Operand, Record};
use crate::resources::parse_passwd;
use crate::{Outcome, Verdict};

/// Strategy for generating passwd-like records.
fn record_strategy() -> impl Strategy<Value = Record> {
    (
        "[a-z][a-z0-9_]{0,12}",
        prop_oneof![Just("0".to_string()), "[0-9]{1,5}", "[a-z]{1,3}"],
        prop_oneof![
            Just("/bin/bash".to_string()),
            Just("/usr/sbin/nologin".to_string()),
            Just("/bin/zsh".to_string())
        ],
    )
        .prop_map(|(user, uid, shell)| {
            let JsonValue::Object(map) = json!({"user": user, "uid": uid, "shell": shell}) else {
                unreachable!("json! object literal");
            };
            map
        })
}

/// Strategy for generating filter specifications.
fn spec_strategy() -> impl Strategy<Value = FilterSpec> {
    let op = prop_oneof![
        Just(FilterOp::Lt),
        Just(FilterOp::Le),
        Just(FilterOp::Gt),
        Just(FilterOp::Ge),
        Just(FilterOp::Ne),
    ];
    prop_oneof![
        (op, 0i64..2000).prop_map(|(op, n)| {
            let condition = Condition::new("uid", op, Operand::Literal(json!(n)))
                .unwrap_or_else(|_| Condition::equals(n));
            FilterSpec::new().with("uid", condition)
        }),
        "(/bin/bash|/usr/sbin/nologin|/bin/zsh)"
            .prop_map(|shell| FilterSpec::new().with("shell", Condition::equals(shell))),
        Just(FilterSpec::new()),
    ]
}

/// Returns true when `sub` is a subsequence of `all`.
fn is_subsequence(sub: &[Record], all: &[Record]) -> bool {
    let mut it = all.iter();
    sub.iter().all(|r| it.any(|a| a == r))
}

proptest! {
    #[test]
    fn prop_filter_preserves_order(
        records in prop::collection::vec(record_strategy(), 0..30),
        spec in spec_strategy(),
    ) {
        let filtered = filter_records(&records, &spec);
        prop_assert!(is_subsequence(&filtered, &records));
        prop_assert!(filtered.iter().all(|r| spec.matches(r)));
    }

    #[test]
    fn prop_filter_is_idempotent(
        records in prop::collection::vec(record_strategy(), 0..30),
        spec in spec_strategy(),
    ) {
        let once = filter_records(&records, &spec);
        let twice = filter_records(&once, &spec);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_empty_spec_keeps_everything(records in prop::collection::vec(record_strategy(), 0..30)) {
        prop_assert_eq!(filter_records(&records, &FilterSpec::new()), records);
    }

    #[test]
    fn prop_integer_equality_is_exact_text(uid in 0u32..100_000) {
        let records = vec![record_for_uid(&uid.to_string()), record_for_uid(&format!("0{uid}"))];
        let spec = FilterSpec::new().with("uid", Condition::equals(uid));
        let filtered = filter_records(&records, &spec);
        prop_assert_eq!(filtered.len(), 1);
        let uid_text = uid.to_string();
        prop_assert_eq!(filtered[0]["uid"].as_str(), Some(uid_text.as_str()));
    }

    #[test]
    fn prop_parse_passwd_never_panics(content in "\\PC*") {
        let _ = parse_passwd(&content);
    }

    #[test]
    fn prop_verdict_fails_on_any_failure(
        outcomes in prop::collection::vec(
            prop_oneof![Just(Outcome::Pass), Just(Outcome::Skip), Just(Outcome::Fail), Just(Outcome::Error)],
            0..10,
        )
    ) {
        let verdict = Verdict::from_outcomes(&outcomes);
        let any_bad = outcomes.iter().any(|o| matches!(o, Outcome::Fail | Outcome::Error));
        prop_assert_eq!(verdict == Verdict::Fail, any_bad);
    }
}

fn record_for_uid(uid: &str) -> Record {
    let mut record = Record::new();
    record.insert("uid".to_string(), JsonValue::String(uid.to_string()));
    record
}
