//! Error types surfaced at the template boundary.
//!
//! Every stage reports a human-readable message plus the [`SourcePos`] of the
//! syntax node that caused it.  Nothing is recovered inside the core: an error
//! aborts the current parse, compile or evaluation pass.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::config::ConfigError;

// ── SourcePos ─────────────────────────────────────────────────────────────────

/// Where a syntax node came from.
///
/// `file == None` marks a position synthesized by the engine itself (system
/// functions, compile-time constant evaluation), displayed as `<internal>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub file: Option<Rc<str>>,
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(file: Rc<str>, line: usize, column: usize) -> Self {
        Self { file: Some(file), line, column }
    }

    pub fn internal() -> Self {
        Self::default()
    }

    pub fn is_internal(&self) -> bool {
        self.file.is_none()
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            None => write!(f, "<internal>"),
            Some(file) => write!(f, "file {file} in line {}:{}", self.line, self.column),
        }
    }
}

// ── Stage errors ──────────────────────────────────────────────────────────────

/// Invalid template syntax.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} @ {pos}")]
pub struct ParseError {
    pub message: String,
    pub pos: SourcePos,
}

/// The syntax tree is structurally invalid (malformed literal, builtin
/// rebind, failing `const` initializer).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} @ {pos}")]
pub struct CompileError {
    pub message: String,
    pub pos: SourcePos,
}

/// A semantic failure while evaluating a compiled template.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} @ {pos}")]
pub struct RuntimeError {
    pub message: String,
    pub pos: SourcePos,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: SourcePos) -> Self {
        Self { message: message.into(), pos }
    }
}

impl CompileError {
    pub fn new(message: impl Into<String>, pos: SourcePos) -> Self {
        Self { message: message.into(), pos }
    }
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, pos: SourcePos) -> Self {
        Self { message: message.into(), pos }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, SourcePos::internal())
    }

    /// Attach `pos` if the error was raised without one (operator and
    /// coercion helpers don't know where they are called from).
    pub fn at(mut self, pos: &SourcePos) -> Self {
        if self.pos.is_internal() {
            self.pos = pos.clone();
        }
        self
    }
}

// ── Boundary error ────────────────────────────────────────────────────────────

/// Any failure of the parse → compile → render pipeline or its I/O.
#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("context error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ── Tests ─────────────────────────────────────────────────────────────────────
