pub mod ast;
pub mod lexer;
pub mod parser;

use std::fmt;

pub use ast::{BinOp, Expr, Stmt, UnaryOp, UpdateOp};
pub use parser::{parse_expression, parse_program};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Syntax,
    /// 语法合法，但超出可转换的子集
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 源码中的字节偏移
    pub pos: usize,
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, pos: usize) -> Self {
        Self {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            pos,
        }
    }

    pub fn unsupported(message: impl Into<String>, pos: usize) -> Self {
        Self {
            kind: ParseErrorKind::Unsupported,
            message: message.into(),
            pos,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParseErrorKind::Syntax => write!(f, "{} (at {})", self.message, self.pos),
            ParseErrorKind::Unsupported => {
                write!(f, "unsupported {} (at {})", self.message, self.pos)
            }
        }
    }
}

impl std::error::Error for ParseError {}
