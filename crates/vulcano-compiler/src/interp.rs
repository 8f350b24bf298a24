//! Expression interpreter.
//!
//! Expressions can only reach the bindings in their [`Env`], plain value
//! methods, `regex(...)` and the built-in resources. Whether resources are
//! reachable is decided by the [`Interpreter`]'s [`ResourceAccess`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use vulcano_core::{resources, Backend, Value};

use crate::ast::{Expr, ExprKind};
use crate::error::ScriptError;
use crate::parser::MAX_NESTING;

/// Lexical bindings visible to an expression.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: BTreeMap<String, Value>,
}

impl Env {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds (or rebinds) a name.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Looks up a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Returns true if `name` is bound.
    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

/// Whether expressions may open resources.
#[derive(Clone)]
pub enum ResourceAccess {
    /// Resources read through this backend.
    Backend(Arc<dyn Backend>),
    /// Resource references are errors; the string names the context.
    Denied(&'static str),
}

impl fmt::Debug for ResourceAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(backend) => f.debug_tuple("Backend").field(backend).finish(),
            Self::Denied(context) => f.debug_tuple("Denied").field(context).finish(),
        }
    }
}

/// Evaluates expressions.
#[derive(Debug, Clone)]
pub struct Interpreter {
    access: ResourceAccess,
}

impl Interpreter {
    /// Interpreter that opens resources through `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            access: ResourceAccess::Backend(backend),
        }
    }

    /// Interpreter that rejects resource references.
    #[must_use]
    pub const fn without_resources(context: &'static str) -> Self {
        Self {
            access: ResourceAccess::Denied(context),
        }
    }

    /// Returns the resource access policy.
    #[must_use]
    pub const fn access(&self) -> &ResourceAccess {
        &self.access
    }

    /// Evaluates an expression.
    ///
    /// # Errors
    ///
    /// Returns a [`ScriptError`] at the offending sub-expression's line for
    /// undefined names, denied resources, failing method calls and
    /// expressions nested deeper than [`MAX_NESTING`].
    pub fn eval(&self, expr: &Expr, env: &Env) -> Result<Value, ScriptError> {
        self.eval_nested(expr, env, 0)
    }

    fn eval_nested(&self, expr: &Expr, env: &Env, depth: usize) -> Result<Value, ScriptError> {
        let fail = |message: String| ScriptError::new(expr.line, message);
        if depth >= MAX_NESTING {
            return Err(fail(format!(
                "expression nesting too deep (more than {MAX_NESTING} levels)"
            )));
        }
        let depth = depth + 1;
        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|e| self.eval_nested(e, env, depth))
                    .collect::<Result<_, _>>()?,
            )),
            ExprKind::Map(entries) => Ok(Value::Map(
                entries
                    .iter()
                    .map(|(k, e)| Ok((k.clone(), self.eval_nested(e, env, depth)?)))
                    .collect::<Result<_, ScriptError>>()?,
            )),
            ExprKind::Ident(name) => match env.get(name) {
                Some(value) => Ok(value.clone()),
                None if resources::is_resource(name) => self.open(name, &[], expr.line),
                None => Err(fail(format!("undefined name `{name}`"))),
            },
            ExprKind::Call { name, args } => {
                let args = self.eval_args(args, env, depth)?;
                match name.as_str() {
                    "regex" => match args.as_slice() {
                        [Value::Str(pattern)] => Regex::new(pattern)
                            .map(Value::Regex)
                            .map_err(|e| fail(format!("invalid regex: {e}"))),
                        _ => Err(fail("`regex` takes one string argument".to_string())),
                    },
                    n if resources::is_resource(n) => self.open(n, &args, expr.line),
                    n => Err(fail(format!("undefined function `{n}`"))),
                }
            }
            ExprKind::Method {
                receiver,
                name,
                args,
            } => {
                let receiver = self.eval_nested(receiver, env, depth)?;
                let args = self.eval_args(args, env, depth)?;
                receiver
                    .call_method(name, &args)
                    .map_err(|e| fail(e.to_string()))
            }
            ExprKind::Index { target, index } => {
                let target = self.eval_nested(target, env, depth)?;
                let index = self.eval_nested(index, env, depth)?;
                target.index(&index).map_err(|e| fail(e.to_string()))
            }
            ExprKind::Add(lhs, rhs) => {
                let lhs = self.eval_nested(lhs, env, depth)?;
                let rhs = self.eval_nested(rhs, env, depth)?;
                lhs.add(&rhs).map_err(|e| fail(e.to_string()))
            }
        }
    }

    fn eval_args(&self, args: &[Expr], env: &Env, depth: usize) -> Result<Vec<Value>, ScriptError> {
        args.iter().map(|e| self.eval_nested(e, env, depth)).collect()
    }

    fn open(&self, name: &str, args: &[Value], line: usize) -> Result<Value, ScriptError> {
        match &self.access {
            ResourceAccess::Backend(backend) => resources::open(name, args, backend)
                .map_err(|e| ScriptError::new(line, e.to_string())),
            ResourceAccess::Denied(context) => Err(ScriptError::new(
                line,
                format!("resource `{name}` cannot be used in {context}"),
            )),
        }
    }
}

/// Checks that every name `expr` references is bound in `env`, a resource,
/// or `regex`.
///
/// # Errors
///
/// Returns the first unresolvable name.
pub fn check_names(expr: &Expr, env: &Env) -> Result<(), ScriptError> {
    let mut error = None;
    expr.walk(&mut |e| {
        if error.is_some() {
            return;
        }
        match &e.kind {
            ExprKind::Ident(name) if !env.is_bound(name) && !resources::is_resource(name) => {
                error = Some(ScriptError::new(e.line, format!("undefined name `{name}`")));
            }
            ExprKind::Call { name, .. } if name != "regex" && !resources::is_resource(name) => {
                error = Some(ScriptError::new(
                    e.line,
                    format!("undefined function `{name}`"),
                ));
            }
            _ => {}
        }
    });
    error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::StmtKind;
    use vulcano_core::MockBackend;

    fn expr(source: &str) -> Expr {
        let stmts = parse(&format!("let x = {source}")).unwrap();
        match stmts.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Let { value, .. }) => value,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn interpreter() -> Interpreter {
        Interpreter::new(Arc::new(
            MockBackend::new().with_file("/etc/passwd", "root:x:0:0::/root:/bin/sh\n"),
        ))
    }

    #[test]
    fn test_literals_and_concat() {
        let v = interpreter()
            .eval(&expr("'shell-' + 'bin'"), &Env::new())
            .unwrap();
        assert_eq!(v, Value::from("shell-bin"));
        let v = interpreter().eval(&expr("[1, 2] + [3]"), &Env::new()).unwrap();
        assert_eq!(v.call_method("count", &[]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_bindings_and_index() {
        let mut env = Env::new();
        env.bind("admins", Value::from(vec![Value::from("root")]));
        let v = interpreter().eval(&expr("admins[0]"), &env).unwrap();
        assert_eq!(v, Value::from("root"));
    }

    #[test]
    fn test_resource_method_chain() {
        let v = interpreter()
            .eval(&expr("passwd.uids(0).users"), &Env::new())
            .unwrap();
        assert_eq!(v, Value::List(vec![Value::from("root")]));
    }

    #[test]
    fn test_denied_resources() {
        let err = Interpreter::without_resources("matcher arguments")
            .eval(&expr("os.family"), &Env::new())
            .unwrap_err();
        assert_eq!(err.message, "resource `os` cannot be used in matcher arguments");
    }

    #[test]
    fn test_undefined_name() {
        let err = interpreter().eval(&expr("nobody"), &Env::new()).unwrap_err();
        assert!(err.message.contains("undefined name `nobody`"));
    }

    #[test]
    fn test_check_names() {
        let mut env = Env::new();
        env.bind("user", Value::from("bin"));
        assert!(check_names(&expr("passwd.users(user)"), &env).is_ok());
        assert!(check_names(&expr("shadow.users"), &env).is_err());
        assert!(check_names(&expr("command('id')"), &env).is_err());
    }

    #[test]
    fn test_built_ast_nested_too_deep() {
        let mut expr = Expr::new(1, ExprKind::Int(1));
        for _ in 0..MAX_NESTING {
            expr = Expr::new(1, ExprKind::List(vec![expr]));
        }
        let err = interpreter().eval(&expr, &Env::new()).unwrap_err();
        assert!(err.message.contains("nesting too deep"), "{}", err.message);

        let ExprKind::List(mut items) = expr.kind else {
            panic!("expected list");
        };
        assert!(interpreter().eval(&items.remove(0), &Env::new()).is_ok());
    }

    #[test]
    fn test_regex_builtin() {
        let v = interpreter().eval(&expr("regex('^/bin')"), &Env::new()).unwrap();
        assert!(matches!(v, Value::Regex(_)));
        assert!(interpreter().eval(&expr("regex('(')"), &Env::new()).is_err());
    }
}
