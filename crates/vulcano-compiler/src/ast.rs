//! Syntax tree of the profile language.

/// An expression with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// 1-based line in the parsed text.
    pub line: usize,
    /// Expression kind.
    pub kind: ExprKind,
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `nil`
    Nil,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// `[a, b]`
    List(Vec<Expr>),
    /// `{key: value}`, keys in source order.
    Map(Vec<(String, Expr)>),
    /// Variable or argument-less resource.
    Ident(String),
    /// `name(args)`
    Call {
        /// Function or resource name.
        name: String,
        /// Arguments; keyword arguments are folded into a trailing map.
        args: Vec<Expr>,
    },
    /// `receiver.name` or `receiver.name(args)`
    Method {
        /// Receiver expression.
        receiver: Box<Expr>,
        /// Method name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `target[index]`
    Index {
        /// Indexed expression.
        target: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// `lhs + rhs`
    Add(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Creates an expression.
    #[must_use]
    pub const fn new(line: usize, kind: ExprKind) -> Self {
        Self { line, kind }
    }

    /// Visits this expression and its sub-expressions in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        match &self.kind {
            ExprKind::List(items) => items.iter().for_each(|e| e.walk(visit)),
            ExprKind::Map(entries) => entries.iter().for_each(|(_, e)| e.walk(visit)),
            ExprKind::Call { args, .. } => args.iter().for_each(|e| e.walk(visit)),
            ExprKind::Method { receiver, args, .. } => {
                receiver.walk(visit);
                args.iter().for_each(|e| e.walk(visit));
            }
            ExprKind::Index { target, index } => {
                target.walk(visit);
                index.walk(visit);
            }
            ExprKind::Add(lhs, rhs) => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            ExprKind::Nil
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Ident(_) => {}
        }
    }

    /// Source-like rendering used in unit descriptions.
    #[must_use]
    pub fn render(&self) -> String {
        let list = |items: &[Self]| items.iter().map(Self::render).collect::<Vec<_>>().join(", ");
        match &self.kind {
            ExprKind::Nil => "nil".to_string(),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Int(n) => n.to_string(),
            ExprKind::Float(n) => n.to_string(),
            ExprKind::Str(s) => format!("{s:?}"),
            ExprKind::List(items) => format!("[{}]", list(items)),
            ExprKind::Map(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.render()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Call { name, args } => format!("{name}({})", list(args)),
            ExprKind::Method {
                receiver,
                name,
                args,
            } if args.is_empty() => format!("{}.{name}", receiver.render()),
            ExprKind::Method {
                receiver,
                name,
                args,
            } => format!("{}.{name}({})", receiver.render(), list(args)),
            ExprKind::Index { target, index } => {
                format!("{}[{}]", target.render(), index.render())
            }
            ExprKind::Add(lhs, rhs) => format!("{} + {}", lhs.render(), rhs.render()),
        }
    }
}

/// A `should` / `should_not` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Should {
    /// 1-based line.
    pub line: usize,
    /// `should_not`
    pub negated: bool,
    /// Matcher name.
    pub matcher: String,
    /// Matcher arguments.
    pub args: Vec<Expr>,
}

impl Should {
    /// Description such as `should eq 1`.
    #[must_use]
    pub fn describe(&self) -> String {
        let verb = if self.negated { "should not" } else { "should" };
        if self.args.is_empty() {
            format!("{verb} {}", self.matcher)
        } else {
            let args: Vec<String> = self.args.iter().map(Expr::render).collect();
            format!("{verb} {} {}", self.matcher, args.join(", "))
        }
    }
}

/// A statement with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// 1-based line in the parsed text.
    pub line: usize,
    /// Statement kind.
    pub kind: StmtKind,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `rule ID do ... end` (also `control`).
    Rule {
        /// Rule ID expression.
        id: Expr,
        /// Rule body.
        body: Vec<Stmt>,
    },
    /// `title EXPR`
    Title(Expr),
    /// `desc EXPR`
    Desc(Expr),
    /// `impact EXPR`
    Impact(Expr),
    /// `tag EXPR, ...`
    Tag(Vec<Expr>),
    /// `let NAME = EXPR`
    Let {
        /// Bound name.
        name: String,
        /// Bound value.
        value: Expr,
    },
    /// `for NAME in EXPR do ... end`
    For {
        /// Loop variable.
        var: String,
        /// Iterated expression.
        iter: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `describe SUBJECT [, EXPR...] do ... end`
    Describe {
        /// Subject expression, evaluated at execution time.
        subject: Expr,
        /// Extra arguments, evaluated at declaration time.
        args: Vec<Expr>,
        /// Group body.
        body: Vec<Stmt>,
    },
    /// `it [DESC] { should ... }`
    It {
        /// Optional description.
        description: Option<Expr>,
        /// Expectations.
        shoulds: Vec<Should>,
    },
    /// `its(ATTR) { should ... }`
    Its {
        /// Attribute of the enclosing subject.
        attribute: Expr,
        /// Expectations.
        shoulds: Vec<Should>,
    },
    /// `skip [REASON]`
    Skip(Option<Expr>),
}

impl Stmt {
    /// Creates a statement.
    #[must_use]
    pub const fn new(line: usize, kind: StmtKind) -> Self {
        Self { line, kind }
    }

    /// Keyword that introduces the statement.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self.kind {
            StmtKind::Rule { .. } => "rule",
            StmtKind::Title(_) => "title",
            StmtKind::Desc(_) => "desc",
            StmtKind::Impact(_) => "impact",
            StmtKind::Tag(_) => "tag",
            StmtKind::Let { .. } => "let",
            StmtKind::For { .. } => "for",
            StmtKind::Describe { .. } => "describe",
            StmtKind::It { .. } => "it",
            StmtKind::Its { .. } => "its",
            StmtKind::Skip(_) => "skip",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::new(1, ExprKind::Ident(name.into()))
    }

    #[test]
    fn test_render_method_chain() {
        let expr = Expr::new(
            1,
            ExprKind::Method {
                receiver: Box::new(ident("passwd")),
                name: "uids".into(),
                args: vec![Expr::new(1, ExprKind::Int(0))],
            },
        );
        assert_eq!(expr.render(), "passwd.uids(0)");
    }

    #[test]
    fn test_walk_visits_nested() {
        let expr = Expr::new(
            1,
            ExprKind::Add(
                Box::new(ident("a")),
                Box::new(Expr::new(1, ExprKind::List(vec![ident("b")]))),
            ),
        );
        let mut names = Vec::new();
        expr.walk(&mut |e| {
            if let ExprKind::Ident(n) = &e.kind {
                names.push(n.clone());
            }
        });
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_should_describe() {
        let should = Should {
            line: 1,
            negated: true,
            matcher: "include".into(),
            args: vec![Expr::new(1, ExprKind::Str("x".into()))],
        };
        assert_eq!(should.describe(), "should not include \"x\"");
    }
}
