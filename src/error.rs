//! The two failure kinds the driver distinguishes, plus the I/O error
//! surfaced when a source file can't be read.

use std::fmt;

/// How a compile error's offending token should be rendered, distinct from
/// the error's message.
#[derive(Debug, Clone)]
pub enum ErrorSite {
    /// Ordinary token: `Error at 'lexeme'`.
    Lexeme(String),
    /// Reached end of file: `Error at the end`.
    End,
    /// A synthetic scanner error token; the lexeme is suppressed since it
    /// already carries the message.
    Suppressed,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("({line}:{column}) {site}: {message}")]
pub struct CompileError {
    pub line: u32,
    pub column: u32,
    pub site: ErrorSite,
    pub message: String,
}

impl fmt::Display for ErrorSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSite::Lexeme(lexeme) => write!(f, "Error at '{lexeme}'"),
            ErrorSite::End => write!(f, "Error at the end"),
            ErrorSite::Suppressed => write!(f, "Error"),
        }
    }
}

/// A runtime trap. `line` is resolved from the chunk's line table at the
/// point of the fault.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}\n[line {line}] in script")]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
}

/// I/O failures at the driver boundary (file not found, not readable, …).
/// Mapped to exit code 74 by the driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("couldn't read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
