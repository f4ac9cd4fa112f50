//! Tokenizer for processed script source.
//!
//! Runs over the preprocessor's output; every token carries the *original*
//! source line looked up through the line map (falling back to the processed
//! index when no map is supplied, e.g. for runtime-parsed expressions).

use crate::error::{CompileError, ErrorKind};
use crate::preprocess::LineMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    /// `:name` or `::N`, full text including the colons.
    LabelRef(String),
    Dollar,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    AmpAssign,
    PlusPlus,
    MinusMinus,
    Plus,
    Minus,
    Star,
    Slash,
    Amp,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    file: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        self.column += 1;
        Some(ch)
    }

    fn push(&mut self, kind: TokenKind, column: u32) {
        self.tokens.push(Token {
            kind,
            line: self.line,
            column,
        });
    }

    fn err(&self, kind: ErrorKind) -> CompileError {
        CompileError {
            file: self.file.to_string(),
            line: self.line,
            kind,
        }
    }

    fn lex_line(&mut self) -> Result<(), CompileError> {
        while let Some(ch) = self.peek() {
            let column = self.column;
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '#' => {
                    // Comment to end of line.
                    self.pos = self.chars.len();
                }
                '"' => self.lex_string()?,
                '0'..='9' => self.lex_number(),
                'a'..='z' | 'A'..='Z' | '_' => self.lex_ident(),
                '$' => {
                    self.bump();
                    self.push(TokenKind::Dollar, column);
                }
                '%' => {
                    self.bump();
                    self.push(TokenKind::Percent, column);
                }
                ':' => {
                    if self.peek2() == Some('=') {
                        self.bump();
                        self.bump();
                        self.push(TokenKind::Assign, column);
                    } else {
                        self.lex_label(column)?;
                    }
                }
                '+' => {
                    self.bump();
                    match self.peek() {
                        Some('+') => {
                            self.bump();
                            self.push(TokenKind::PlusPlus, column);
                        }
                        Some('=') => {
                            self.bump();
                            self.push(TokenKind::PlusAssign, column);
                        }
                        _ => self.push(TokenKind::Plus, column),
                    }
                }
                '-' => {
                    self.bump();
                    match self.peek() {
                        Some('-') => {
                            self.bump();
                            self.push(TokenKind::MinusMinus, column);
                        }
                        Some('=') => {
                            self.bump();
                            self.push(TokenKind::MinusAssign, column);
                        }
                        _ => self.push(TokenKind::Minus, column),
                    }
                }
                '*' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::StarAssign, column);
                    } else {
                        self.push(TokenKind::Star, column);
                    }
                }
                '/' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::SlashAssign, column);
                    } else {
                        self.push(TokenKind::Slash, column);
                    }
                }
                '&' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::AmpAssign, column);
                    } else {
                        self.push(TokenKind::Amp, column);
                    }
                }
                '<' => {
                    self.bump();
                    match self.peek() {
                        Some('>') => {
                            self.bump();
                            self.push(TokenKind::Ne, column);
                        }
                        Some('=') => {
                            self.bump();
                            self.push(TokenKind::Le, column);
                        }
                        _ => self.push(TokenKind::Lt, column),
                    }
                }
                '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::Ge, column);
                    } else {
                        self.push(TokenKind::Gt, column);
                    }
                }
                '!' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::Ne, column);
                    } else {
                        return Err(self.err(ErrorKind::UnexpectedChar('!')));
                    }
                }
                '=' => {
                    self.bump();
                    self.push(TokenKind::Eq, column);
                }
                '.' => {
                    self.bump();
                    self.push(TokenKind::Dot, column);
                }
                '[' => {
                    self.bump();
                    self.push(TokenKind::LBracket, column);
                }
                ']' => {
                    self.bump();
                    self.push(TokenKind::RBracket, column);
                }
                '(' => {
                    self.bump();
                    self.push(TokenKind::LParen, column);
                }
                ')' => {
                    self.bump();
                    self.push(TokenKind::RParen, column);
                }
                ',' => {
                    self.bump();
                    self.push(TokenKind::Comma, column);
                }
                other => return Err(self.err(ErrorKind::UnexpectedChar(other))),
            }
        }
        Ok(())
    }

    fn lex_string(&mut self) -> Result<(), CompileError> {
        let column = self.column;
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err(ErrorKind::UnterminatedString)),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => return Err(self.err(ErrorKind::UnterminatedString)),
                },
                Some(ch) => out.push(ch),
            }
        }
        self.push(TokenKind::Str(out), column);
        Ok(())
    }

    fn lex_number(&mut self) {
        let column = self.column;
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                out.push(ch);
                self.bump();
            } else if ch == '.' && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
                out.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Number(out), column);
    }

    fn lex_ident(&mut self) {
        let column = self.column;
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                out.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Ident(out), column);
    }

    fn lex_label(&mut self, column: u32) -> Result<(), CompileError> {
        let mut out = String::new();
        out.push(self.bump().unwrap()); // ':'
        if self.peek() == Some(':') {
            out.push(self.bump().unwrap());
        }
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                out.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        if out.trim_start_matches(':').is_empty() {
            return Err(self.err(ErrorKind::UnexpectedChar(':')));
        }
        self.push(TokenKind::LabelRef(out), column);
        Ok(())
    }
}

/// Tokenize processed source lines. Token lines are original source lines
/// when `map` is present.
pub fn tokenize(
    lines: &[String],
    map: Option<&LineMap>,
    file: &str,
) -> Result<Vec<Token>, CompileError> {
    let mut lexer = Lexer {
        chars: Vec::new(),
        pos: 0,
        line: 0,
        column: 1,
        file,
        tokens: Vec::new(),
    };
    for (idx, line) in lines.iter().enumerate() {
        let processed = idx as u32 + 1;
        lexer.line = match map {
            Some(m) => m.original(processed),
            None => processed,
        };
        lexer.chars = line.chars().collect();
        lexer.pos = 0;
        lexer.column = 1;
        lexer.lex_line()?;
        let col = lexer.column;
        lexer.push(TokenKind::Newline, col);
    }
    let line = lexer.line;
    lexer.tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        column: 1,
    });
    Ok(lexer.tokens)
}

/// Tokenize a standalone text fragment (no line map; lines are 1-based over
/// the fragment itself). Used to re-parse string-form expressions at runtime.
pub fn tokenize_str(text: &str, file: &str) -> Result<Vec<Token>, CompileError> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    tokenize(&lines, None, file)
}
