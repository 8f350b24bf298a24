//! Tokenizer for profile source.

use std::fmt;

use crate::error::ScriptError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword.
    Ident(String),
    /// String literal with escapes resolved.
    Str(String),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `+`
    Plus,
    /// `-` (only as a numeric sign)
    Minus,
    /// `=`
    Assign,
    /// Statement separator: newline or `;`.
    Newline,
    /// End of input.
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "`{s}`"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Int(n) => write!(f, "integer {n}"),
            Self::Float(n) => write!(f, "float {n}"),
            Self::LParen => f.write_str("`(`"),
            Self::RParen => f.write_str("`)`"),
            Self::LBracket => f.write_str("`[`"),
            Self::RBracket => f.write_str("`]`"),
            Self::LBrace => f.write_str("`{`"),
            Self::RBrace => f.write_str("`}`"),
            Self::Comma => f.write_str("`,`"),
            Self::Dot => f.write_str("`.`"),
            Self::Colon => f.write_str("`:`"),
            Self::Plus => f.write_str("`+`"),
            Self::Minus => f.write_str("`-`"),
            Self::Assign => f.write_str("`=`"),
            Self::Newline => f.write_str("end of line"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

/// A token and the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// 1-based line.
    pub line: usize,
}

/// Splits source text into tokens. Comments run from `#` to end of line.
///
/// # Errors
///
/// Returns a [`ScriptError`] for unterminated strings, bad escapes,
/// malformed numbers and stray characters.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        let start = line;
        let token = match c {
            '\n' | ';' => {
                chars.next();
                if c == '\n' {
                    line += 1;
                }
                Token::Newline
            }
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '#' => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
                continue;
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        None => return Err(ScriptError::new(start, "unterminated string")),
                        Some(q) if q == c => break,
                        Some('\\') => {
                            let escaped = match chars.next() {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('\\') => '\\',
                                Some('"') => '"',
                                Some('\'') => '\'',
                                Some(other) => {
                                    return Err(ScriptError::new(
                                        line,
                                        format!("unknown escape `\\{other}`"),
                                    ))
                                }
                                None => return Err(ScriptError::new(start, "unterminated string")),
                            };
                            text.push(escaped);
                        }
                        Some(ch) => {
                            if ch == '\n' {
                                line += 1;
                            }
                            text.push(ch);
                        }
                    }
                }
                Token::Str(text)
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '_' {
                        text.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        // `1.to_s` style calls are not numbers
                        let mut ahead = chars.clone();
                        ahead.next();
                        if ahead.peek().is_some_and(char::is_ascii_digit) {
                            is_float = true;
                            text.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                let digits = text.replace('_', "");
                if is_float {
                    Token::Float(digits.parse().map_err(|_| {
                        ScriptError::new(start, format!("invalid number `{text}`"))
                    })?)
                } else {
                    Token::Int(digits.parse().map_err(|_| {
                        ScriptError::new(start, format!("invalid number `{text}`"))
                    })?)
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '?' || d == '!' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            _ => {
                chars.next();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    ':' => Token::Colon,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '=' => Token::Assign,
                    other => {
                        return Err(ScriptError::new(
                            start,
                            format!("unexpected character `{other}`"),
                        ))
                    }
                }
            }
        };
        tokens.push(Spanned { token, line: start });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}
