//! Run orchestration.
//!
//! A [`Runner`] drives one run end to end: resolve references, evaluate
//! each source in its own context, compile rules into a shared [`World`],
//! execute them and aggregate a [`RunSummary`]. Errors are recovered per
//! profile or per rule and listed in [`RunSummary::errors`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};
use vulcano_compiler::{
    Compiler, ContextConfig, EvaluationError, LintViolation, Linter, ProfileContext, Registry,
    Severity,
};
use vulcano_core::{Backend, ErrorKind, ProfileInfo, ProfileRef, RunError, RunSummary};

use crate::aggregate::aggregate;
use crate::engine::Executor;
use crate::targets::{ResolvedSource, Resolver};
use crate::world::World;

/// Configuration for a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Overrides the profile ID of every source.
    pub profile_id: Option<String>,
    /// Whether to evaluate profiles in parallel.
    pub parallel: bool,
    /// Number of parallel workers.
    pub workers: usize,
    /// Whether to skip remaining leaves after the first fail or error.
    pub fail_fast: bool,
    /// Line number of the first line of file and remote sources.
    pub line_offset: usize,
    /// Whether evaluation-time expressions may read the target.
    pub eager_resources: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            profile_id: None,
            parallel: false,
            workers: 4,
            fail_fast: false,
            line_offset: 1,
            eager_resources: true,
        }
    }
}

impl RunConfig {
    /// Creates a new run configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the profile ID override.
    #[must_use]
    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    /// Enables parallel evaluation.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the number of parallel workers.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets fail-fast mode.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Sets the default line offset.
    #[must_use]
    pub const fn with_line_offset(mut self, line_offset: usize) -> Self {
        self.line_offset = line_offset;
        self
    }

    /// Sets whether evaluation-time expressions may read the target.
    #[must_use]
    pub const fn with_eager_resources(mut self, eager: bool) -> Self {
        self.eager_resources = eager;
        self
    }
}

/// Cancels an in-flight run between rule compilations.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of checking profiles without executing them.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Profiles that were evaluated.
    pub profiles: Vec<ProfileInfo>,
    /// Number of rules that compiled.
    pub rules: usize,
    /// Resolution, evaluation and compilation errors.
    pub errors: Vec<RunError>,
    /// Lint findings with the source they were found in.
    pub violations: Vec<(String, LintViolation)>,
}

impl CheckReport {
    /// True when nothing failed and no finding has error severity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
            && !self
                .violations
                .iter()
                .any(|(_, v)| v.severity == Severity::Error)
    }
}

/// Drives runs.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use vulcano_core::{MockBackend, ProfileRef, Verdict};
/// use vulcano_runner::{RunConfig, Runner};
///
/// let runner = Runner::new(RunConfig::default(), Arc::new(MockBackend::new()));
/// let summary = runner.run(&[ProfileRef::inline(
///     "inline",
///     "rule 'r1' do\n  describe true do\n    it { should eq true }\n  end\nend\n",
/// )]);
/// assert_eq!(summary.rule("r1").map(|r| r.verdict), Some(Verdict::Pass));
/// ```
#[derive(Debug)]
pub struct Runner {
    config: RunConfig,
    backend: Arc<dyn Backend>,
    resolver: Resolver,
    cancel: CancelHandle,
}

impl Runner {
    /// Creates a runner that audits `backend`.
    #[must_use]
    pub fn new(config: RunConfig, backend: Arc<dyn Backend>) -> Self {
        let resolver = Resolver::new().with_line_offset(config.line_offset);
        Self {
            config,
            backend,
            resolver,
            cancel: CancelHandle::default(),
        }
    }

    /// Replaces the resolver, e.g. to add a remote fetcher.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver.with_line_offset(self.config.line_offset);
        self
    }

    /// Returns a handle that cancels this runner's runs.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns the run configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs `references` and summarizes the results.
    #[instrument(skip_all, fields(references = references.len()))]
    pub fn run(&self, references: &[ProfileRef]) -> RunSummary {
        let start = Instant::now();
        let mut summary = RunSummary::new();
        let world = World::new();

        let sources = self.resolve(references, &mut summary.errors);
        let evaluated = self.evaluate_all(&sources);
        let compiler = Compiler::new().with_cancel_flag(Arc::clone(&self.cancel.0));

        for (source, result) in sources.iter().zip(evaluated) {
            summary.profiles.push(profile_info(source));
            let Some(registry) = collect_evaluation(source, result, &mut summary.errors) else {
                continue;
            };
            let report = compiler.compile(&source.profile_id, &registry, &world);
            for e in report.errors {
                summary.errors.push(
                    RunError::new(ErrorKind::Compilation, &source.source_id, e.message)
                        .with_rule_id(e.rule_id)
                        .with_line(e.line),
                );
            }
            for rule_id in report.cancelled {
                summary.errors.push(
                    RunError::new(ErrorKind::Cancelled, &source.source_id, "run cancelled")
                        .with_rule_id(rule_id),
                );
            }
        }

        let runs = Executor::new()
            .with_fail_fast(self.config.fail_fast)
            .run(world.take());
        let aggregate = aggregate(runs);
        summary.rule_results = aggregate.rule_results;
        summary.totals = aggregate.totals;
        summary.leaf_totals = aggregate.leaf_totals;
        summary.duration = start.elapsed();

        info!(
            run_id = %summary.run_id,
            rules = summary.totals.total(),
            passed = summary.totals.passed,
            failed = summary.totals.failed,
            skipped = summary.totals.skipped,
            errors = summary.errors.len(),
            "Run complete"
        );
        summary
    }

    /// Resolves, evaluates, compiles and lints `references` without
    /// executing anything.
    #[instrument(skip_all, fields(references = references.len()))]
    pub fn check(&self, references: &[ProfileRef]) -> CheckReport {
        let mut report = CheckReport::default();
        let linter = Linter::new();
        let world = World::new();

        let sources = self.resolve(references, &mut report.errors);
        let evaluated = self.evaluate_all(&sources);
        for (source, result) in sources.iter().zip(evaluated) {
            report.profiles.push(profile_info(source));
            let Some(registry) = collect_evaluation(source, result, &mut report.errors) else {
                continue;
            };
            report.violations.extend(
                linter
                    .lint(&registry)
                    .into_iter()
                    .map(|v| (source.source_id.clone(), v)),
            );
            let compiled = Compiler::new().compile(&source.profile_id, &registry, &world);
            report.rules += compiled.compiled.len();
            for e in compiled.errors {
                report.errors.push(
                    RunError::new(ErrorKind::Compilation, &source.source_id, e.message)
                        .with_rule_id(e.rule_id)
                        .with_line(e.line),
                );
            }
        }

        info!(
            rules = report.rules,
            errors = report.errors.len(),
            findings = report.violations.len(),
            "Check complete"
        );
        report
    }

    fn resolve(&self, references: &[ProfileRef], errors: &mut Vec<RunError>) -> Vec<ResolvedSource> {
        let resolution = self.resolver.resolve(references);
        errors.extend(
            resolution
                .errors
                .into_iter()
                .map(|(reference, e)| RunError::new(ErrorKind::Resolution, reference, e.to_string())),
        );
        let mut sources = resolution.sources;
        if let Some(profile_id) = &self.config.profile_id {
            for source in &mut sources {
                source.profile_id.clone_from(profile_id);
            }
        }
        sources
    }

    /// Evaluates every source in its own context. Results are returned in
    /// source order whether or not evaluation ran in parallel.
    fn evaluate_all(&self, sources: &[ResolvedSource]) -> Vec<Result<Registry, EvaluationError>> {
        let context = ProfileContext::new(
            ContextConfig::new(Arc::clone(&self.backend))
                .with_eager_resources(self.config.eager_resources),
        );
        let evaluate = |source: &ResolvedSource| {
            debug!(source = %source.source_id, profile_id = %source.profile_id, "Evaluating profile");
            context.evaluate(&source.content, &source.source_id, source.line_offset)
        };

        if self.config.parallel && sources.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.workers.max(1))
                .build()
            {
                Ok(pool) => return pool.install(|| sources.par_iter().map(&evaluate).collect()),
                Err(e) => warn!(error = %e, "Failed to start worker pool; evaluating sequentially"),
            }
        }
        sources.iter().map(&evaluate).collect()
    }
}

fn profile_info(source: &ResolvedSource) -> ProfileInfo {
    ProfileInfo {
        id: source.profile_id.clone(),
        source: source.source_id.clone(),
        sha256: source.sha256.clone(),
        title: source.metadata.as_ref().and_then(|m| m.title.clone()),
        version: source.metadata.as_ref().and_then(|m| m.version.clone()),
    }
}

/// Records evaluation failures and returns the registry, if any.
fn collect_evaluation(
    source: &ResolvedSource,
    result: Result<Registry, EvaluationError>,
    errors: &mut Vec<RunError>,
) -> Option<Registry> {
    match result {
        Ok(registry) => {
            errors.extend(registry.failures().iter().map(|e| evaluation_error(source, e)));
            Some(registry)
        }
        Err(e) => {
            warn!(source = %source.source_id, line = e.line, error = %e.message, "Profile failed to evaluate");
            errors.push(evaluation_error(source, &e));
            None
        }
    }
}

fn evaluation_error(source: &ResolvedSource, e: &EvaluationError) -> RunError {
    let error = RunError::new(ErrorKind::Evaluation, &source.source_id, &e.message).with_line(e.line);
    match &e.rule_id {
        Some(rule_id) => error.with_rule_id(rule_id),
        None => error,
    }
}
