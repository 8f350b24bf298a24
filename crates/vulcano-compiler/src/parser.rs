//! Profile language parser.
//!
//! This module turns profile source into a list of [`Stmt`]s. The grammar is
//! line oriented: statements end at a newline or `;`, blocks are delimited
//! by `do ... end`, and expectation blocks use braces.

use tracing::debug;

use crate::ast::{Expr, ExprKind, Should, Stmt, StmtKind};
use crate::error::ScriptError;
use crate::lexer::{tokenize, Spanned, Token};

/// Words that cannot be bound with `let` or `for`.
pub const RESERVED: &[&str] = &[
    "rule", "control", "do", "end", "title", "desc", "impact", "tag", "let", "for", "in",
    "describe", "it", "its", "should", "should_not", "skip", "true", "false", "nil",
];

/// Deepest nesting of blocks and expressions a profile may use.
pub const MAX_NESTING: usize = 128;

type ParseResult<T> = Result<T, ScriptError>;

/// Parses profile source into statements.
///
/// # Errors
///
/// Returns the first syntax error with its line.
///
/// # Examples
///
/// ```rust
/// use vulcano_compiler::parser::parse;
///
/// let stmts = parse("rule \"r1\" do\n  describe 1 do\n    it { should eq 1 }\n  end\nend\n").unwrap();
/// assert_eq!(stmts.len(), 1);
/// ```
pub fn parse(source: &str) -> ParseResult<Vec<Stmt>> {
    let tokens = tokenize(source)?;
    debug!(tokens = tokens.len(), "Parsing profile source");
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let stmts = parser.block(&[])?;
    parser.expect(&Token::Eof)?;
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .or_else(|| self.tokens.last())
            .map_or(&Token::Eof, |s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(w) if w == word)
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ScriptError::new(self.line(), message))
    }

    fn unexpected<T>(&self, wanted: &str) -> ParseResult<T> {
        self.error(format!("expected {wanted}, found {}", self.peek()))
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        if self.peek() == token {
            self.advance();
            Ok(())
        } else {
            self.unexpected(&token.to_string())
        }
    }

    fn expect_keyword(&mut self, word: &str) -> ParseResult<()> {
        if self.is_keyword(word) {
            self.advance();
            Ok(())
        } else {
            self.unexpected(&format!("`{word}`"))
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return self.error(format!("nesting too deep (more than {MAX_NESTING} levels)"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == Token::Newline {
            self.advance();
        }
    }

    fn name(&mut self) -> ParseResult<String> {
        match self.peek().clone() {
            Token::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                self.advance();
                Ok(name)
            }
            Token::Ident(name) => self.error(format!("`{name}` is a reserved word")),
            _ => self.unexpected("a name"),
        }
    }

    /// Statements up to (not including) `end`, or end of input when
    /// `terminators` is empty.
    fn block(&mut self, terminators: &[&str]) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if terminators.iter().any(|t| self.is_keyword(t)) {
                break;
            }
            if *self.peek() == Token::Eof {
                if terminators.is_empty() {
                    break;
                }
                return self.error("unexpected end of input, missing `end`");
            }
            stmts.push(self.statement()?);
            match self.peek() {
                Token::Newline | Token::Eof => {}
                Token::Ident(w) if terminators.contains(&w.as_str()) => {}
                _ => return self.unexpected("end of statement"),
            }
        }
        Ok(stmts)
    }

    fn do_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect_keyword("do")?;
        let body = self.nested(|p| p.block(&["end"]))?;
        self.expect_keyword("end")?;
        Ok(body)
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        let line = self.line();
        let Token::Ident(keyword) = self.peek().clone() else {
            return self.unexpected("a statement");
        };

        let kind = match keyword.as_str() {
            "rule" | "control" => {
                self.advance();
                let id = self.expr()?;
                let body = self.do_block()?;
                StmtKind::Rule { id, body }
            }
            "title" => {
                self.advance();
                StmtKind::Title(self.expr()?)
            }
            "desc" => {
                self.advance();
                StmtKind::Desc(self.expr()?)
            }
            "impact" => {
                self.advance();
                StmtKind::Impact(self.expr()?)
            }
            "tag" => {
                self.advance();
                StmtKind::Tag(self.expr_list()?)
            }
            "let" => {
                self.advance();
                let name = self.name()?;
                self.expect(&Token::Assign)?;
                StmtKind::Let {
                    name,
                    value: self.expr()?,
                }
            }
            "for" => {
                self.advance();
                let var = self.name()?;
                self.expect_keyword("in")?;
                let iter = self.expr()?;
                let body = self.do_block()?;
                StmtKind::For { var, iter, body }
            }
            "describe" => {
                self.advance();
                let mut args = self.expr_list()?;
                let subject = args.remove(0);
                let body = self.do_block()?;
                StmtKind::Describe {
                    subject,
                    args,
                    body,
                }
            }
            "it" => {
                self.advance();
                let description = if *self.peek() == Token::LBrace {
                    None
                } else {
                    Some(self.expr()?)
                };
                StmtKind::It {
                    description,
                    shoulds: self.should_block()?,
                }
            }
            "its" => {
                self.advance();
                self.expect(&Token::LParen)?;
                let attribute = self.expr()?;
                self.expect(&Token::RParen)?;
                StmtKind::Its {
                    attribute,
                    shoulds: self.should_block()?,
                }
            }
            "skip" => {
                self.advance();
                let reason = match self.peek() {
                    Token::Newline | Token::Eof => None,
                    Token::Ident(w) if w == "end" => None,
                    _ => Some(self.expr()?),
                };
                StmtKind::Skip(reason)
            }
            "should" | "should_not" => {
                return self.error(format!("`{keyword}` must appear inside `it {{ }}` or `its() {{ }}`"))
            }
            other => return self.error(format!("unknown statement `{other}`")),
        };
        Ok(Stmt::new(line, kind))
    }

    fn should_block(&mut self) -> ParseResult<Vec<Should>> {
        self.expect(&Token::LBrace)?;
        let mut shoulds = Vec::new();
        loop {
            self.skip_newlines();
            if *self.peek() == Token::RBrace {
                break;
            }
            shoulds.push(self.should()?);
            if !matches!(self.peek(), Token::Newline | Token::RBrace) {
                return self.unexpected("`}` or end of line");
            }
        }
        self.expect(&Token::RBrace)?;
        if shoulds.is_empty() {
            return self.error("expectation block has no `should`");
        }
        Ok(shoulds)
    }

    fn should(&mut self) -> ParseResult<Should> {
        let line = self.line();
        let negated = match self.peek() {
            Token::Ident(w) if w == "should" => false,
            Token::Ident(w) if w == "should_not" => true,
            _ => return self.unexpected("`should` or `should_not`"),
        };
        self.advance();
        let Token::Ident(matcher) = self.advance() else {
            return Err(ScriptError::new(line, "expected a matcher name"));
        };
        let args = if matches!(self.peek(), Token::Newline | Token::RBrace | Token::Eof) {
            Vec::new()
        } else {
            self.expr_list()?
        };
        Ok(Should {
            line,
            negated,
            matcher,
            args,
        })
    }

    fn expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![self.expr()?];
        while *self.peek() == Token::Comma {
            self.advance();
            self.skip_newlines();
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        self.nested(Self::sum)
    }

    fn sum(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.postfix()?;
        while *self.peek() == Token::Plus {
            self.advance();
            self.skip_newlines();
            let rhs = self.postfix()?;
            lhs = Expr::new(lhs.line, ExprKind::Add(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let Token::Ident(name) = self.advance() else {
                        return self.error("expected a method name after `.`");
                    };
                    let args = if *self.peek() == Token::LParen {
                        self.call_args()?
                    } else {
                        Vec::new()
                    };
                    expr = Expr::new(
                        expr.line,
                        ExprKind::Method {
                            receiver: Box::new(expr),
                            name,
                            args,
                        },
                    );
                }
                Token::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.expr()?;
                    self.skip_newlines();
                    self.expect(&Token::RBracket)?;
                    expr = Expr::new(
                        expr.line,
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        let kind = match self.advance() {
            Token::Int(n) => ExprKind::Int(n),
            Token::Float(n) => ExprKind::Float(n),
            Token::Str(s) => ExprKind::Str(s),
            Token::Minus => match self.advance() {
                Token::Int(n) => ExprKind::Int(-n),
                Token::Float(n) => ExprKind::Float(-n),
                _ => return Err(ScriptError::new(line, "expected a number after `-`")),
            },
            Token::LParen => {
                self.skip_newlines();
                let inner = self.expr()?;
                self.skip_newlines();
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => {
                let mut items = Vec::new();
                self.skip_newlines();
                while *self.peek() != Token::RBracket {
                    items.push(self.expr()?);
                    self.skip_newlines();
                    if *self.peek() == Token::Comma {
                        self.advance();
                        self.skip_newlines();
                    } else {
                        break;
                    }
                }
                self.expect(&Token::RBracket)?;
                ExprKind::List(items)
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                self.skip_newlines();
                while *self.peek() != Token::RBrace {
                    entries.push(self.map_entry()?);
                    self.skip_newlines();
                    if *self.peek() == Token::Comma {
                        self.advance();
                        self.skip_newlines();
                    } else {
                        break;
                    }
                }
                self.expect(&Token::RBrace)?;
                ExprKind::Map(entries)
            }
            Token::Ident(word) => {
                if word == "true" || word == "false" {
                    ExprKind::Bool(word == "true")
                } else if word == "nil" {
                    ExprKind::Nil
                } else if RESERVED.contains(&word.as_str()) {
                    return Err(ScriptError::new(line, format!("unexpected keyword `{word}`")));
                } else if *self.peek() == Token::LParen {
                    ExprKind::Call {
                        args: self.call_args()?,
                        name: word,
                    }
                } else {
                    ExprKind::Ident(word)
                }
            }
            other => {
                return Err(ScriptError::new(
                    line,
                    format!("expected an expression, found {other}"),
                ))
            }
        };
        Ok(Expr::new(line, kind))
    }

    fn map_entry(&mut self) -> ParseResult<(String, Expr)> {
        let key = match self.advance() {
            Token::Ident(k) | Token::Str(k) => k,
            other => {
                return Err(ScriptError::new(
                    self.line(),
                    format!("expected a map key, found {other}"),
                ))
            }
        };
        self.expect(&Token::Colon)?;
        self.skip_newlines();
        Ok((key, self.expr()?))
    }

    /// `(a, b, key: v)`: keyword arguments are folded into one trailing map.
    fn call_args(&mut self) -> ParseResult<Vec<Expr>> {
        let line = self.line();
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        self.skip_newlines();
        while *self.peek() != Token::RParen {
            let is_keyword = matches!(self.peek(), Token::Ident(_) | Token::Str(_))
                && *self.peek_at(1) == Token::Colon;
            if is_keyword {
                keywords.push(self.map_entry()?);
            } else if keywords.is_empty() {
                args.push(self.expr()?);
            } else {
                return self.error("positional argument after keyword arguments");
            }
            self.skip_newlines();
            if *self.peek() == Token::Comma {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        if !keywords.is_empty() {
            args.push(Expr::new(line, ExprKind::Map(keywords)));
        }
        Ok(args)
    }
}
