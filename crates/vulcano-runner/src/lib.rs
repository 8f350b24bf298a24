//! # Vulcano Runner
//!
//! Run orchestration for the Vulcano compliance engine.
//!
//! This crate provides functionality for:
//!
//! - Resolving profile references into source text
//! - Registering compiled test units in a shared [`World`]
//! - Executing units and aggregating per-rule verdicts
//! - Reporting run summaries to the console or as JSON
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vulcano_core::{MockBackend, ProfileRef, RunStatus};
//! use vulcano_runner::{ConsoleReporter, Reporter, RunConfig, Runner};
//!
//! let backend = Arc::new(
//!     MockBackend::new().with_file("/etc/passwd", "root:x:0:0:root:/root:/bin/bash\n"),
//! );
//! let profile = r#"
//! rule "passwd-01" do
//!   title "Only root has uid 0"
//!   describe passwd.uids(0) do
//!     its("users") { should eq ["root"] }
//!   end
//! end
//! "#;
//!
//! let runner = Runner::new(RunConfig::default(), backend);
//! let summary = runner.run(&[ProfileRef::inline("inline", profile)]);
//! assert_eq!(summary.status(), RunStatus::Passed);
//!
//! let mut out = Vec::new();
//! ConsoleReporter::new().with_colors(false).report(&summary, &mut out).unwrap();
//! ```

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod reporter;
pub mod runner;
pub mod targets;
pub mod world;

pub use aggregate::{aggregate, Aggregate};
pub use engine::{Executor, RuleRun};
pub use error::{ResolutionError, Result};
pub use reporter::{ConsoleReporter, JsonReporter, Reporter};
pub use runner::{CancelHandle, CheckReport, RunConfig, Runner};
pub use targets::{digest, Resolution, ResolvedSource, Resolver};
pub use world::{RegisteredRule, World};
