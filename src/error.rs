//! Centralised error hierarchy and diagnostics sink for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the [`LoxError`] variants defined here.
//! This enables a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter‑operation with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The module **does not** print diagnostics itself.  Stages hand them to a
//! [`Reporter`], and the host decides how to format them and which exit code
//! they imply.

use std::fmt;
use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the offending construct started.
        line: usize,
    },

    /// Syntactic (parser) error.  `location` is either `at 'lexeme'` or `at end`.
    #[error("[line {line}] Error {location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis failure (redeclaration, invalid `return`, …).
    #[error("[line {line}] Error {location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error carrying the offending token's line.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, msg={}",
            token.line, message
        );

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Runtime error: line={}, msg={}",
            token.line, message
        );

        LoxError::Runtime {
            message,
            line: token.line,
        }
    }

    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            LoxError::Lex { .. } => Stage::Scan,
            LoxError::Parse { .. } => Stage::Parse,
            LoxError::Resolve { .. } => Stage::Resolve,
            LoxError::Runtime { .. } | LoxError::Io(_) | LoxError::Utf8(_) => Stage::Runtime,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        "at end".to_string()
    } else {
        format!("at '{}'", token.lexeme)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics
// ─────────────────────────────────────────────────────────────────────────────

/// Which pass raised a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Parse,
    Resolve,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single report handed to a [`Reporter`].
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    pub line: usize,
    /// `at 'lexeme'` / `at end`, when a token is available.
    pub location: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// Non‑fatal static warning attached to `token`.
    pub fn warning<S: Into<String>>(stage: Stage, token: &Token, msg: S) -> Self {
        Diagnostic {
            stage,
            severity: Severity::Warning,
            line: token.line,
            location: Some(location_of(token)),
            message: msg.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<LoxError> for Diagnostic {
    fn from(err: LoxError) -> Self {
        let stage = err.stage();

        let (line, location, message) = match err {
            LoxError::Lex { message, line } => (line, None, message),
            LoxError::Parse {
                message,
                location,
                line,
            }
            | LoxError::Resolve {
                message,
                location,
                line,
            } => (line, Some(location), message),
            LoxError::Runtime { message, line } => (line, None, message),
            other => (0, None, other.to_string()),
        };

        Diagnostic {
            stage,
            severity: Severity::Error,
            line,
            location,
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stage == Stage::Runtime {
            return write!(f, "{}\n[line {}]", self.message, self.line);
        }

        let label = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };

        match &self.location {
            Some(location) => write!(
                f,
                "[line {}] {} {}: {}",
                self.line, label, location, self.message
            ),
            None => write!(f, "[line {}] {}: {}", self.line, label, self.message),
        }
    }
}

/// Sink every stage reports into.  Implementations format/print and latch
/// whatever "had error" state their host needs.
pub trait Reporter {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// A [`Reporter`] that simply keeps everything it is given.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Forward everything collected so far to another sink.
    pub fn drain_into(&mut self, reporter: &mut dyn Reporter) {
        for diagnostic in self.items.drain(..) {
            reporter.report(diagnostic);
        }
    }
}

impl Reporter for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }
}
