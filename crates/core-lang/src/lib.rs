//! Script compiler: preprocessor, lexer, parser, and include resolver.
//!
//! Compilation is a straight pipeline. The preprocessor rewrites the
//! IF/ELSEIF/ELSE/WHILE/END control-flow macros into labels plus
//! `BRANCH`/`GOTO`, carrying a processed-line -> original-line map so every
//! later diagnostic cites source lines the author actually wrote. The lexer
//! and parser then build an immutable [`Program`] that VM instances share.

pub mod ast;
mod error;
mod include;
mod lexer;
mod parser;
mod preprocess;

pub use ast::{
    canonical_label, AccessSeg, AssignOp, IfVariant, IncDecOp, Node, NodeKind, Op, Program,
};
pub use error::{CompileError, ErrorKind};
pub use include::IncludeResolver;
pub use lexer::{tokenize, tokenize_str, Token, TokenKind};
pub use parser::{parse_expression_text, parse_program};
pub use preprocess::{preprocess, LineMap, Preprocessed};

/// Compile one source text (no include resolution) through the full
/// preprocess -> lex -> parse pipeline.
pub fn compile_source(source: &str, file: &str) -> Result<Program, CompileError> {
    compile_source_seeded(source, file, "")
}

pub(crate) fn compile_source_seeded(
    source: &str,
    file: &str,
    label_prefix: &str,
) -> Result<Program, CompileError> {
    let pre = preprocess::preprocess_seeded(source, file, label_prefix)?;
    let tokens = tokenize(&pre.lines, Some(&pre.map), file)?;
    parse_program(tokens, file)
}

/// Compile a file and inline its `INCLUDE` tree relative to `base_path`.
pub fn compile_file(
    path: &std::path::Path,
    base_path: &std::path::Path,
) -> Result<Program, CompileError> {
    let file = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|e| CompileError {
        file: file.clone(),
        line: 0,
        kind: ErrorKind::IncludeRead {
            name: file.clone(),
            reason: e.to_string(),
        },
    })?;
    let program = compile_source(&source, &file)?;
    IncludeResolver::new(base_path).resolve(program)
}
