use std::fmt;
use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn start(&self) -> usize {
        self.start
    }

    pub const fn end(&self) -> usize {
        self.end
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Node,
    If,
    Then,
    Else,
    True,
    False,
    Identifier(String),
    Integer(i32),
    AtLast,
    Equals,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,
    Shr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Node => "node",
            Self::If => "if",
            Self::Then => "then",
            Self::Else => "else",
            Self::True => "true",
            Self::False => "false",
            Self::Identifier(name) => return write!(f, "identifier `{name}`"),
            Self::Integer(value) => return write!(f, "integer `{value}`"),
            Self::AtLast => "@last",
            Self::Equals => "=",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Amp => "&",
            Self::AmpAmp => "&&",
            Self::Pipe => "|",
            Self::PipePipe => "||",
            Self::Caret => "^",
            Self::LParen => "(",
            Self::RParen => ")",
        };
        write!(f, "`{text}`")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexerError {
    #[error("unexpected character `{ch}` at column {column}")]
    UnexpectedCharacter { ch: char, column: usize, span: Span },
    #[error("integer literal `{literal}` does not fit in 32 bits")]
    IntegerOverflow { literal: String, span: Span },
    #[error("expected `@last` after `@`")]
    BadAnnotation { span: Span },
}

impl LexerError {
    pub const fn span(&self) -> Span {
        match self {
            Self::UnexpectedCharacter { span, .. }
            | Self::IntegerOverflow { span, .. }
            | Self::BadAnnotation { span } => *span,
        }
    }
}

pub type LexResult<T> = Result<T, Vec<LexerError>>;

/// Splits one REPL line into tokens. Errors are collected rather than
/// stopping at the first one.
pub fn tokenize(source: &str) -> LexResult<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut idx = 0usize;

    while idx < bytes.len() {
        let start = idx;
        let byte = bytes[idx];

        if byte.is_ascii_whitespace() {
            idx += 1;
            continue;
        }
        // comment runs to the end of the line
        if byte == b'#' {
            break;
        }

        if byte.is_ascii_digit() {
            while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                idx += 1;
            }
            let literal = &source[start..idx];
            let span = Span::new(start, idx);
            match literal.parse::<i32>() {
                Ok(value) => tokens.push(Token {
                    kind: TokenKind::Integer(value),
                    span,
                }),
                Err(_) => errors.push(LexerError::IntegerOverflow {
                    literal: literal.to_string(),
                    span,
                }),
            }
            continue;
        }

        if byte.is_ascii_alphabetic() || byte == b'_' {
            while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
                idx += 1;
            }
            let word = &source[start..idx];
            let kind = match word {
                "node" => TokenKind::Node,
                "if" => TokenKind::If,
                "then" => TokenKind::Then,
                "else" => TokenKind::Else,
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                _ => TokenKind::Identifier(word.to_string()),
            };
            tokens.push(Token {
                kind,
                span: Span::new(start, idx),
            });
            continue;
        }

        if byte == b'@' {
            if source[idx + 1..].starts_with("last") {
                idx += 5;
                tokens.push(Token {
                    kind: TokenKind::AtLast,
                    span: Span::new(start, idx),
                });
            } else {
                idx += 1;
                errors.push(LexerError::BadAnnotation {
                    span: Span::new(start, idx),
                });
            }
            continue;
        }

        let next = bytes.get(idx + 1).copied();
        let (kind, width) = match (byte, next) {
            (b'=', Some(b'=')) => (TokenKind::EqEq, 2),
            (b'!', Some(b'=')) => (TokenKind::NotEq, 2),
            (b'<', Some(b'=')) => (TokenKind::LtEq, 2),
            (b'>', Some(b'=')) => (TokenKind::GtEq, 2),
            (b'<', Some(b'<')) => (TokenKind::Shl, 2),
            (b'>', Some(b'>')) => (TokenKind::Shr, 2),
            (b'&', Some(b'&')) => (TokenKind::AmpAmp, 2),
            (b'|', Some(b'|')) => (TokenKind::PipePipe, 2),
            (b'=', _) => (TokenKind::Equals, 1),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'&', _) => (TokenKind::Amp, 1),
            (b'|', _) => (TokenKind::Pipe, 1),
            (b'^', _) => (TokenKind::Caret, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            _ => {
                let ch = source[idx..].chars().next().unwrap_or('\u{fffd}');
                idx += ch.len_utf8();
                errors.push(LexerError::UnexpectedCharacter {
                    ch,
                    column: start + 1,
                    span: Span::new(start, idx),
                });
                continue;
            }
        };
        idx += width;
        tokens.push(Token {
            kind,
            span: Span::new(start, idx),
        });
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}
