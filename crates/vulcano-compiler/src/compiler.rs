//! Test compiler.
//!
//! Turns the rules of an evaluated [`Registry`] into [`TestUnit`] trees,
//! stamps every unit with its rule ID, and hands each rule's units to a
//! [`UnitSink`]. A rule that fails to compile is reported and skipped; the
//! remaining rules are still compiled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use vulcano_core::{SourceLocation, Subject, TestUnit, Value};

use crate::ast::{Expr, Should, Stmt, StmtKind};
use crate::error::{CompilationError, ScriptError};
use crate::interp::Interpreter;
use crate::matchers::Matcher;
use crate::registry::{CheckBody, Registry, Rule, Scope};

/// Rule metadata registered alongside its units.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleInfo {
    /// Profile the rule belongs to.
    pub profile_id: String,
    /// Rule ID.
    pub id: String,
    /// Title.
    pub title: Option<String>,
    /// Impact.
    pub impact: Option<f64>,
    /// Declaration site.
    pub location: SourceLocation,
}

impl RuleInfo {
    /// Extracts the metadata of `rule`.
    #[must_use]
    pub fn from_rule(profile_id: &str, rule: &Rule) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            id: rule.id.clone(),
            title: rule.title.clone(),
            impact: rule.impact,
            location: rule.location.clone(),
        }
    }
}

/// Registration surface of the execution engine.
pub trait UnitSink {
    /// Registers the compiled units of one rule.
    ///
    /// # Errors
    ///
    /// Returns a message when the sink rejects the units.
    fn register(&self, rule: RuleInfo, units: Vec<TestUnit>) -> Result<(), String>;
}

/// Outcome of compiling one registry.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Rules registered with the sink, in order.
    pub compiled: Vec<String>,
    /// Rules that failed to compile.
    pub errors: Vec<CompilationError>,
    /// Rules not compiled because the run was cancelled.
    pub cancelled: Vec<String>,
}

/// Compiles registries into test units.
#[derive(Debug, Default, Clone)]
pub struct Compiler {
    cancel: Option<Arc<AtomicBool>>,
}

impl Compiler {
    /// Creates a compiler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a cancellation flag checked before each rule.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Compiles every rule of `registry` in registration order and
    /// registers the units with `sink`.
    pub fn compile(&self, profile_id: &str, registry: &Registry, sink: &dyn UnitSink) -> CompileReport {
        let mut report = CompileReport::default();

        for (rule_id, rule) in registry.all() {
            if self.is_cancelled() {
                report.cancelled.push(rule_id.to_string());
                continue;
            }

            let registered = self.compile_rule(rule).and_then(|units| {
                sink.register(RuleInfo::from_rule(profile_id, rule), units)
                    .map_err(|message| CompilationError {
                        rule_id: rule_id.to_string(),
                        source_id: rule.location.source.clone(),
                        line: rule.location.line,
                        message,
                    })
            });

            match registered {
                Ok(()) => {
                    debug!(rule_id, "Compiled rule");
                    report.compiled.push(rule_id.to_string());
                }
                Err(e) => {
                    warn!(rule_id, error = %e.message, "Rule failed to compile");
                    report.errors.push(e);
                }
            }
        }

        if !report.cancelled.is_empty() {
            info!(profile_id, cancelled = report.cancelled.len(), "Compilation cancelled");
        }
        report
    }

    /// Compiles one rule into stamped units, one per check.
    ///
    /// # Errors
    ///
    /// Returns a [`CompilationError`] for unknown matchers, wrong arity,
    /// failing matcher arguments, invalid regexes and checks without
    /// examples.
    pub fn compile_rule(&self, rule: &Rule) -> Result<Vec<TestUnit>, CompilationError> {
        let fail = |line: usize, message: String| CompilationError {
            rule_id: rule.id.clone(),
            source_id: rule.location.source.clone(),
            line,
            message,
        };

        let mut units = Vec::with_capacity(rule.checks.len());
        for check in &rule.checks {
            let mut unit = match &check.body {
                CheckBody::Skip { reason } => {
                    TestUnit::pending(check.description.clone(), check.location.clone(), reason.clone())
                }
                CheckBody::Describe {
                    subject,
                    body,
                    scope,
                } => {
                    let unit = TestUnit::group(
                        check.description.clone(),
                        check.location.clone(),
                        Some(deferred_subject(subject, scope)),
                    );
                    let unit = compile_body(unit, body, scope).map_err(|e| {
                        fail(scope.location(e.line).line, e.message)
                    })?;
                    if unit.leaf_count() == 0 {
                        return Err(fail(check.location.line, format!(
                            "describe `{}` has no examples",
                            check.description
                        )));
                    }
                    unit
                }
            };
            propagate_rule_id(&mut unit, &rule.id);
            units.push(unit);
        }
        Ok(units)
    }
}

/// Stamps `rule_id` on `unit` and every descendant, pre-order.
pub fn propagate_rule_id(unit: &mut TestUnit, rule_id: &str) {
    unit.walk_mut(&mut |u| u.rule_id = Some(rule_id.to_string()));
}

fn deferred_subject(expr: &Arc<Expr>, scope: &Scope) -> Subject {
    let expr = Arc::clone(expr);
    let env = scope.env.clone();
    let interpreter = scope.interpreter.clone();
    Subject::new(expr.render(), move |_| {
        interpreter.eval(&expr, &env).map_err(|e| e.message)
    })
}

fn attribute_subject(path: String) -> Subject {
    Subject::new(path.clone(), move |parent| {
        let mut value = parent.cloned().unwrap_or_default();
        for segment in path.split('.') {
            value = value.call_method(segment, &[]).map_err(|e| e.to_string())?;
        }
        Ok(value)
    })
}

/// Interpreter for compile-time values: matcher arguments, `its`
/// attributes and descriptions.
fn static_interpreter() -> Interpreter {
    Interpreter::without_resources("matcher arguments or descriptions")
}

fn compile_body(mut group: TestUnit, body: &[Stmt], scope: &Scope) -> Result<TestUnit, ScriptError> {
    let statics = static_interpreter();
    for stmt in body {
        let location = scope.location(stmt.line);
        match &stmt.kind {
            StmtKind::Describe {
                subject,
                args,
                body,
            } => {
                let mut description = subject.render();
                for arg in args {
                    description.push(' ');
                    description.push_str(&statics.eval(arg, &scope.env)?.to_string());
                }
                let nested = TestUnit::group(
                    description,
                    location,
                    Some(deferred_subject(&Arc::new(subject.clone()), scope)),
                );
                group.children.push(compile_body(nested, body, scope)?);
            }
            StmtKind::It {
                description,
                shoulds,
            } => {
                let label = description
                    .as_ref()
                    .map(|d| statics.eval(d, &scope.env).map(|v| v.to_string()))
                    .transpose()?;
                for should in shoulds {
                    let text = match (&label, shoulds.len()) {
                        (Some(label), 1) => label.clone(),
                        (Some(label), _) => format!("{label} {}", should.describe()),
                        (None, _) => should.describe(),
                    };
                    group
                        .children
                        .push(example(text, should, scope)?);
                }
            }
            StmtKind::Its { attribute, shoulds } => {
                let path = match statics.eval(attribute, &scope.env)? {
                    Value::Str(path) if !path.is_empty() => path,
                    other => {
                        return Err(ScriptError::new(
                            attribute.line,
                            format!("`its` needs an attribute name, got {}", other.inspect()),
                        ))
                    }
                };
                let mut its = TestUnit::group(path.clone(), location, Some(attribute_subject(path)));
                for should in shoulds {
                    its.children
                        .push(example(should.describe(), should, scope)?);
                }
                group.children.push(its);
            }
            StmtKind::Skip(reason) => {
                let reason = reason
                    .as_ref()
                    .map(|r| statics.eval(r, &scope.env).map(|v| v.to_string()))
                    .transpose()?
                    .unwrap_or_else(|| "skipped".to_string());
                group
                    .children
                    .push(TestUnit::pending(reason.clone(), location, reason));
            }
            _ => {
                return Err(ScriptError::new(
                    stmt.line,
                    format!("`{}` is not allowed inside `describe`", stmt.keyword()),
                ))
            }
        }
    }
    Ok(group)
}

fn example(description: String, should: &Should, scope: &Scope) -> Result<TestUnit, ScriptError> {
    let matcher = Matcher::from_name(&should.matcher).ok_or_else(|| {
        ScriptError::new(should.line, format!("unknown matcher `{}`", should.matcher))
    })?;
    let statics = static_interpreter();
    let args = should
        .args
        .iter()
        .map(|a| statics.eval(a, &scope.env))
        .collect::<Result<Vec<_>, _>>()?;
    let assertion = matcher
        .build(args, should.negated)
        .map_err(|message| ScriptError::new(should.line, message))?;
    Ok(TestUnit::example(description, scope.location(should.line), assertion))
}
