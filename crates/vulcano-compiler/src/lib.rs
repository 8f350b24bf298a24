//! # Vulcano Compiler
//!
//! Profile evaluation and test compilation for the Vulcano compliance engine.
//!
//! This crate provides functionality for:
//!
//! - Parsing `.vul` profile source
//! - Evaluating profiles into a [`Registry`] of rules
//! - Compiling rules into executable [`TestUnit`](vulcano_core::TestUnit) trees
//! - Linting evaluated profiles
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vulcano_compiler::{ContextConfig, Linter, ProfileContext};
//! use vulcano_core::MockBackend;
//!
//! let source = r#"
//! rule "users-01" do
//!   title "root exists"
//!   describe passwd.users do
//!     it { should include "root" }
//!   end
//! end
//! "#;
//!
//! let ctx = ProfileContext::new(ContextConfig::new(Arc::new(MockBackend::new())));
//! let registry = ctx.evaluate(source, "inline", 1).unwrap();
//! assert_eq!(registry.len(), 1);
//! assert!(Linter::new().lint(&registry).is_empty());
//! ```

pub mod ast;
pub mod compiler;
pub mod context;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod lint;
pub mod matchers;
pub mod parser;
pub mod registry;

pub use compiler::{propagate_rule_id, CompileReport, Compiler, RuleInfo, UnitSink};
pub use context::{ContextConfig, ProfileContext};
pub use error::{CompilationError, EvaluationError, Result, ScriptError};
pub use lint::{LintRule, LintViolation, Linter, Severity};
pub use matchers::{Matcher, MATCHER_NAMES};
pub use parser::parse;
pub use registry::{Check, CheckBody, Overwrite, Registry, Rule};
