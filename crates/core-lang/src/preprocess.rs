//! Control-flow macro expansion.
//!
//! `IF/ELSEIF/ELSE/WHILE/END` are rewritten into fresh `::N` labels plus the
//! `BRANCH`/`GOTO` primitives before the lexer ever runs. `BRANCH "<expr>"
//! <label>` jumps when the expression does not evaluate to 1, so the label a
//! frame tracks as `cond_label` is always the "condition was false" target.
//! Every emitted line records the original line it came from.

use crate::error::{CompileError, ErrorKind};

/// Processed-line -> original-line map. Indices are 1-based on both sides.
#[derive(Debug, Clone, Default)]
pub struct LineMap {
    entries: Vec<u32>,
}

impl LineMap {
    fn push(&mut self, original: u32) {
        self.entries.push(original);
    }

    /// Original line for a processed line, defaulting to the processed index
    /// when no entry exists.
    pub fn original(&self, processed: u32) -> u32 {
        if processed == 0 {
            return 0;
        }
        self.entries
            .get(processed as usize - 1)
            .copied()
            .unwrap_or(processed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct Preprocessed {
    pub lines: Vec<String>,
    pub map: LineMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    If { at_else: bool },
    While,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    cond_label: String,
    end_label: String,
    line: u32,
}

impl Frame {
    fn name(&self) -> &'static str {
        match self.kind {
            FrameKind::If { .. } => "IF",
            FrameKind::While => "WHILE",
        }
    }
}

struct Expander {
    out: Vec<String>,
    map: LineMap,
    next_label: u32,
    label_prefix: String,
    stack: Vec<Frame>,
    file: String,
}

impl Expander {
    fn emit(&mut self, line: String, original: u32) {
        self.out.push(line);
        self.map.push(original);
    }

    fn fresh_label(&mut self) -> String {
        let n = self.next_label;
        self.next_label += 1;
        format!("::{}{n}", self.label_prefix)
    }

    fn err(&self, line: u32, kind: ErrorKind) -> CompileError {
        CompileError {
            file: self.file.clone(),
            line,
            kind,
        }
    }
}

/// Expand the control-flow macros in `source`. All other lines, including
/// empty lines and `#` comments, pass through verbatim.
pub fn preprocess(source: &str, file: &str) -> Result<Preprocessed, CompileError> {
    preprocess_seeded(source, file, "")
}

/// Like [`preprocess`], but generated labels carry `prefix` (`::<prefix>N`).
/// The include resolver uses a per-file prefix so inlined files cannot collide
/// with the including script's synthetic labels.
pub(crate) fn preprocess_seeded(
    source: &str,
    file: &str,
    prefix: &str,
) -> Result<Preprocessed, CompileError> {
    let mut x = Expander {
        out: Vec::new(),
        map: LineMap::default(),
        next_label: 1,
        label_prefix: prefix.to_string(),
        stack: Vec::new(),
        file: file.to_string(),
    };

    for (idx, raw) in source.lines().enumerate() {
        let original = idx as u32 + 1;
        let trimmed = raw.trim_start();
        let (head, rest) = split_first_word(trimmed);
        match head.to_ascii_uppercase().as_str() {
            "IF" => {
                let expr = require_condition(&x, rest, original, "IF")?;
                let cond = x.fresh_label();
                let end = x.fresh_label();
                x.emit(format!("BRANCH \"{}\" {cond}", escape_expr(&expr)), original);
                x.stack.push(Frame {
                    kind: FrameKind::If { at_else: false },
                    cond_label: cond,
                    end_label: end,
                    line: original,
                });
            }
            "ELSEIF" => {
                let expr = require_condition(&x, rest, original, "ELSEIF")?;
                let frame = match x.stack.last() {
                    Some(f) => f,
                    None => return Err(x.err(original, ErrorKind::DanglingElse("ELSEIF".into()))),
                };
                match frame.kind {
                    FrameKind::While => {
                        return Err(x.err(original, ErrorKind::ElseInWhile("ELSEIF".into())))
                    }
                    FrameKind::If { at_else: true } => {
                        return Err(x.err(original, ErrorKind::AfterElse("ELSEIF".into())))
                    }
                    FrameKind::If { at_else: false } => {}
                }
                let end = frame.end_label.clone();
                let old_cond = frame.cond_label.clone();
                let new_cond = x.fresh_label();
                x.stack.last_mut().unwrap().cond_label = new_cond.clone();
                x.emit(format!("GOTO {end}"), original);
                x.emit(old_cond, original);
                x.emit(
                    format!("BRANCH \"{}\" {new_cond}", escape_expr(&expr)),
                    original,
                );
            }
            "ELSE" => {
                let frame = match x.stack.last() {
                    Some(f) => f,
                    None => return Err(x.err(original, ErrorKind::DanglingElse("ELSE".into()))),
                };
                match frame.kind {
                    FrameKind::While => {
                        return Err(x.err(original, ErrorKind::ElseInWhile("ELSE".into())))
                    }
                    FrameKind::If { at_else: true } => {
                        return Err(x.err(original, ErrorKind::AfterElse("ELSE".into())))
                    }
                    FrameKind::If { at_else: false } => {}
                }
                let end = frame.end_label.clone();
                let cond = frame.cond_label.clone();
                x.stack.last_mut().unwrap().kind = FrameKind::If { at_else: true };
                x.emit(format!("GOTO {end}"), original);
                x.emit(cond, original);
            }
            "WHILE" => {
                let expr = require_condition(&x, rest, original, "WHILE")?;
                let cond = x.fresh_label();
                let end = x.fresh_label();
                x.emit(cond.clone(), original);
                x.emit(format!("BRANCH \"{}\" {end}", escape_expr(&expr)), original);
                x.stack.push(Frame {
                    kind: FrameKind::While,
                    cond_label: cond,
                    end_label: end,
                    line: original,
                });
            }
            "END" => {
                let frame = match x.stack.pop() {
                    Some(f) => f,
                    None => return Err(x.err(original, ErrorKind::DanglingEnd)),
                };
                match frame.kind {
                    FrameKind::While => {
                        x.emit(format!("GOTO {}", frame.cond_label), original);
                    }
                    FrameKind::If { at_else } => {
                        if !at_else {
                            x.emit(frame.cond_label.clone(), original);
                        }
                    }
                }
                x.emit(frame.end_label, original);
            }
            _ => x.emit(raw.to_string(), original),
        }
    }

    if let Some(frame) = x.stack.last() {
        return Err(CompileError {
            file: x.file,
            line: frame.line,
            kind: ErrorKind::UnclosedBlock(frame.name().into()),
        });
    }

    Ok(Preprocessed {
        lines: x.out,
        map: x.map,
    })
}

fn require_condition(
    x: &Expander,
    rest: &str,
    line: u32,
    directive: &str,
) -> Result<String, CompileError> {
    let expr = rest.trim();
    if expr.is_empty() {
        Err(x.err(line, ErrorKind::MissingCondition(directive.into())))
    } else {
        Ok(expr.to_string())
    }
}

fn split_first_word(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], &line[i..]),
        None => (line, ""),
    }
}

/// Escape an expression for embedding in a double-quoted `BRANCH` argument.
fn escape_expr(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    for ch in expr.chars() {
        if ch == '\\' || ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
