//! Profile evaluation context.
//!
//! A [`ProfileContext`] evaluates one unit of profile source against a fresh
//! [`Registry`] and returns it. Profile code can only declare rules and
//! checks and read resources; it has no other way to affect the process.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use vulcano_core::{Backend, SourceLocation, Value};

use crate::ast::{Expr, Stmt, StmtKind};
use crate::error::{EvaluationError, Result, ScriptError};
use crate::interp::{check_names, Env, Interpreter};
use crate::parser::parse;
use crate::registry::{adjust_line, Check, CheckBody, Registry, Rule, Scope};

/// Configuration for profile evaluation.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Backend resources read through.
    pub backend: Arc<dyn Backend>,
    /// Whether `let`/`for` expressions may read resources during
    /// evaluation. Describe subjects always may, at execution time.
    pub eager_resources: bool,
}

impl ContextConfig {
    /// Creates a configuration for `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            eager_resources: true,
        }
    }

    /// Sets whether evaluation-time expressions may read resources.
    #[must_use]
    pub const fn with_eager_resources(mut self, allowed: bool) -> Self {
        self.eager_resources = allowed;
        self
    }
}

/// Evaluates profile source into a [`Registry`].
#[derive(Debug, Clone)]
pub struct ProfileContext {
    config: ContextConfig,
}

impl ProfileContext {
    /// Creates a context.
    #[must_use]
    pub const fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Evaluates `content`. Reported lines are shifted so that the first line
    /// of `content` is `line_offset`.
    ///
    /// Syntax errors and runtime errors outside any rule fail the whole
    /// profile. A runtime error inside a rule body drops only that rule and
    /// is recorded in [`Registry::failures`].
    ///
    /// # Errors
    ///
    /// Returns an [`EvaluationError`] attributed to `source_id` and line.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use vulcano_compiler::{ContextConfig, ProfileContext};
    /// use vulcano_core::MockBackend;
    ///
    /// let ctx = ProfileContext::new(ContextConfig::new(Arc::new(MockBackend::new())));
    /// let registry = ctx
    ///     .evaluate("rule 'r1' do\n  describe true do\n    it { should eq true }\n  end\nend\n", "inline", 1)
    ///     .unwrap();
    /// assert_eq!(registry.len(), 1);
    /// ```
    #[instrument(skip(self, content))]
    pub fn evaluate(&self, content: &str, source_id: &str, line_offset: usize) -> Result<Registry> {
        let line_offset = line_offset.max(1);
        let attribute = |e: ScriptError, rule_id: Option<String>| EvaluationError {
            source_id: source_id.to_string(),
            line: adjust_line(e.line, line_offset),
            rule_id,
            message: e.message,
        };

        let stmts = parse(content).map_err(|e| attribute(e, None))?;

        let eager = if self.config.eager_resources {
            Interpreter::new(Arc::clone(&self.config.backend))
        } else {
            Interpreter::without_resources("evaluation-time expressions")
        };
        let mut eval = Evaluation {
            eager,
            deferred: Interpreter::new(Arc::clone(&self.config.backend)),
            source_id: Arc::from(source_id),
            line_offset,
            registry: Registry::new(),
        };

        let mut env = Env::new();
        eval.top_level(&stmts, &mut env)
            .map_err(|e| attribute(e, None))?;

        info!(
            rules = eval.registry.len(),
            failed = eval.registry.failures().len(),
            "Profile evaluated"
        );
        Ok(eval.registry)
    }
}

struct Evaluation {
    eager: Interpreter,
    deferred: Interpreter,
    source_id: Arc<str>,
    line_offset: usize,
    registry: Registry,
}

type Step = std::result::Result<(), ScriptError>;

impl Evaluation {
    fn location(&self, line: usize) -> SourceLocation {
        SourceLocation::new(
            self.source_id.as_ref(),
            adjust_line(line, self.line_offset),
        )
    }

    fn scope(&self, env: &Env) -> Scope {
        Scope {
            env: env.clone(),
            interpreter: self.deferred.clone(),
            source_id: Arc::clone(&self.source_id),
            line_offset: self.line_offset,
        }
    }

    fn top_level(&mut self, stmts: &[Stmt], env: &mut Env) -> Step {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Let { name, value } => {
                    let value = self.eager.eval(value, env)?;
                    env.bind(name.clone(), value);
                }
                StmtKind::For { var, iter, body } => {
                    for item in self.iterate(iter, env)? {
                        let mut inner = env.clone();
                        inner.bind(var.clone(), item);
                        self.top_level(body, &mut inner)?;
                    }
                }
                StmtKind::Rule { id, body } => {
                    let id = rule_id(&self.eager.eval(id, env)?, id.line)?;
                    let mut rule = Rule::new(id, self.location(stmt.line));
                    let mut inner = env.clone();
                    match self.rule_body(body, &mut rule, &mut inner) {
                        Ok(()) => {
                            debug!(rule_id = %rule.id, checks = rule.checks.len(), "Registered rule");
                            self.registry.register(rule);
                        }
                        Err(e) => {
                            self.registry.discard(&rule.id, rule.location.clone());
                            self.fail_rule(rule.id, e);
                        }
                    }
                }
                StmtKind::Describe { .. } => {
                    let location = self.location(stmt.line);
                    let mut rule = Rule::new(format!("(generated from {location})"), location);
                    rule.generated = true;
                    match self.check(stmt, env) {
                        Ok(check) => {
                            rule.checks.push(check);
                            self.registry.register_generated(rule);
                        }
                        Err(e) => self.fail_rule(rule.id, e),
                    }
                }
                _ => {
                    return Err(ScriptError::new(
                        stmt.line,
                        format!("`{}` is only allowed inside a rule", stmt.keyword()),
                    ))
                }
            }
        }
        Ok(())
    }

    fn fail_rule(&mut self, rule_id: String, e: ScriptError) {
        self.registry.record_failure(EvaluationError {
            source_id: self.source_id.to_string(),
            line: adjust_line(e.line, self.line_offset),
            rule_id: Some(rule_id),
            message: e.message,
        });
    }

    fn rule_body(&self, stmts: &[Stmt], rule: &mut Rule, env: &mut Env) -> Step {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Title(e) => rule.title = Some(self.text(e, env)?),
                StmtKind::Desc(e) => rule.desc = Some(self.text(e, env)?),
                StmtKind::Impact(e) => rule.impact = Some(self.impact(e, env)?),
                StmtKind::Tag(exprs) => {
                    for e in exprs {
                        match self.eager.eval(e, env)? {
                            Value::List(items) => {
                                rule.tags.extend(items.iter().map(ToString::to_string));
                            }
                            value => rule.tags.push(value.to_string()),
                        }
                    }
                }
                StmtKind::Let { name, value } => {
                    let value = self.eager.eval(value, env)?;
                    env.bind(name.clone(), value);
                }
                StmtKind::For { var, iter, body } => {
                    for item in self.iterate(iter, env)? {
                        let mut inner = env.clone();
                        inner.bind(var.clone(), item);
                        self.rule_body(body, rule, &mut inner)?;
                    }
                }
                StmtKind::Describe { .. } => rule.checks.push(self.check(stmt, env)?),
                StmtKind::Skip(reason) => {
                    let reason = match reason {
                        Some(e) => self.text(e, env)?,
                        None => "skipped".to_string(),
                    };
                    rule.checks.push(Check {
                        description: reason.clone(),
                        args: Vec::new(),
                        location: self.location(stmt.line),
                        body: CheckBody::Skip { reason },
                    });
                }
                StmtKind::Rule { .. } => {
                    return Err(ScriptError::new(stmt.line, "rules cannot be nested"))
                }
                StmtKind::It { .. } | StmtKind::Its { .. } => {
                    return Err(ScriptError::new(
                        stmt.line,
                        format!("`{}` must appear inside `describe`", stmt.keyword()),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Captures a describe statement as a check.
    fn check(&self, stmt: &Stmt, env: &Env) -> std::result::Result<Check, ScriptError> {
        let StmtKind::Describe {
            subject,
            args,
            body,
        } = &stmt.kind
        else {
            return Err(ScriptError::new(stmt.line, "expected `describe`"));
        };

        check_names(subject, env)?;
        validate_describe_body(body, env)?;
        let args = args
            .iter()
            .map(|e| self.eager.eval(e, env))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut description = subject.render();
        for arg in &args {
            description.push(' ');
            description.push_str(&arg.to_string());
        }

        Ok(Check {
            description,
            args,
            location: self.location(stmt.line),
            body: CheckBody::Describe {
                subject: Arc::new(subject.clone()),
                body: Arc::from(body.as_slice()),
                scope: self.scope(env),
            },
        })
    }

    fn iterate(&self, expr: &Expr, env: &Env) -> std::result::Result<Vec<Value>, ScriptError> {
        match self.eager.eval(expr, env)? {
            Value::List(items) => Ok(items),
            Value::Map(map) => Ok(map.into_keys().map(Value::Str).collect()),
            other => Err(ScriptError::new(
                expr.line,
                format!("cannot iterate over {}", other.type_name()),
            )),
        }
    }

    fn text(&self, expr: &Expr, env: &Env) -> std::result::Result<String, ScriptError> {
        Ok(self.eager.eval(expr, env)?.to_string())
    }

    fn impact(&self, expr: &Expr, env: &Env) -> std::result::Result<f64, ScriptError> {
        let value = self.eager.eval(expr, env)?;
        match value.as_f64() {
            Some(impact) if (0.0..=1.0).contains(&impact) => Ok(impact),
            _ => Err(ScriptError::new(
                expr.line,
                format!("impact must be a number between 0.0 and 1.0, got {}", value.inspect()),
            )),
        }
    }
}

fn rule_id(value: &Value, line: usize) -> std::result::Result<String, ScriptError> {
    match value {
        Value::Str(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::Int(n) => Ok(n.to_string()),
        other => Err(ScriptError::new(
            line,
            format!("rule ID must be a non-empty string, got {}", other.inspect()),
        )),
    }
}

/// Describe bodies may only contain `describe`, `it`, `its` and `skip`, and
/// every name they reference must resolve.
fn validate_describe_body(body: &[Stmt], env: &Env) -> Step {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Describe {
                subject,
                args,
                body,
            } => {
                check_names(subject, env)?;
                for arg in args {
                    check_names(arg, env)?;
                }
                validate_describe_body(body, env)?;
            }
            StmtKind::It {
                description,
                shoulds,
            } => {
                if let Some(d) = description {
                    check_names(d, env)?;
                }
                for should in shoulds {
                    for arg in &should.args {
                        check_names(arg, env)?;
                    }
                }
            }
            StmtKind::Its { attribute, shoulds } => {
                check_names(attribute, env)?;
                for should in shoulds {
                    for arg in &should.args {
                        check_names(arg, env)?;
                    }
                }
            }
            StmtKind::Skip(Some(reason)) => check_names(reason, env)?,
            StmtKind::Skip(None) => {}
            _ => {
                return Err(ScriptError::new(
                    stmt.line,
                    format!("`{}` is not allowed inside `describe`", stmt.keyword()),
                ))
            }
        }
    }
    Ok(())
}
