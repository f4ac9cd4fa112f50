//! Compile-time error type. Every error cites the file and the original
//! source line (post line-map), never the processed line.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{file}:{line}: {kind}")]
pub struct CompileError {
    pub file: String,
    pub line: u32,
    pub kind: ErrorKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("{0} without a matching IF")]
    DanglingElse(String),
    #[error("END without a matching IF or WHILE")]
    DanglingEnd,
    #[error("{0} inside a WHILE block")]
    ElseInWhile(String),
    #[error("{0} after ELSE")]
    AfterElse(String),
    #[error("unclosed {0} block")]
    UnclosedBlock(String),
    #[error("{0} requires a condition")]
    MissingCondition(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("{0}")]
    Parse(String),
    #[error("cannot read include file {name:?}: {reason}")]
    IncludeRead { name: String, reason: String },
    #[error("includes nested deeper than {0} levels")]
    IncludeDepth(usize),
}
