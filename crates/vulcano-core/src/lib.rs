//! # Vulcano Core
//!
//! Core types and traits for the Vulcano compliance engine.
//!
//! This crate provides the data model shared across the Vulcano workspace:
//!
//! - [`Value`] - Runtime values produced by profile expressions
//! - [`Resource`] and [`Backend`] - Read-only access to the audited target
//! - [`resources`] - Built-in `passwd`, `file` and `os` resources
//! - [`filter`] - The record filter engine shared by tabular resources
//! - [`TestUnit`] - Executable test tree produced by the compiler
//! - [`RunSummary`] - Per-rule verdicts and run totals
//! - [`ProfileRef`] - Where profile content comes from
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vulcano_core::{resources, Backend, MockBackend, Value};
//!
//! let backend: Arc<dyn Backend> = Arc::new(
//!     MockBackend::new().with_file("/etc/passwd", "root:x:0:0:root:/root:/bin/bash\n"),
//! );
//!
//! let passwd = resources::open("passwd", &[], &backend).unwrap();
//! let users = passwd.call_method("users", &[]).unwrap();
//! assert_eq!(users, Value::List(vec![Value::from("root")]));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod filter;
pub mod profile;
pub mod report;
pub mod resource;
pub mod resources;
pub mod unit;
pub mod value;

#[cfg(test)]
mod proptest_tests;

pub use backend::{Backend, LocalBackend, MockBackend, OsInfo};
pub use error::{Error, FilterError, Result};
pub use filter::{filter_records, Condition, FilterOp, FilterSpec, Record};
pub use profile::{ProfileFetcher, ProfileMetadata, ProfileRef, RemoteRef};
pub use report::{
    ErrorKind, LeafResult, LeafTotals, Outcome, ProfileInfo, RuleResult, RunError, RunStatus,
    RunSummary, Totals, Verdict,
};
pub use resource::{RecordSource, Resource};
pub use unit::{Assertion, Expectation, SourceLocation, Subject, TestUnit, UnitKind};
pub use value::Value;
