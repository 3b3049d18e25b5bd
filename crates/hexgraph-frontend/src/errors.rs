//! Error types for reading, parsing, and validating graph sources.

use std::path::PathBuf;

use thiserror::Error;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

/// Errors that can occur while loading a graph source or label table.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FrontendError {
    /// The source file could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax error during parsing.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Well-formed source that is inconsistent with the expected label count.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl FrontendError {
    pub(crate) fn at(position: SourcePosition, message: impl std::fmt::Display) -> Self {
        Self::ValidationError(format!(
            "{} (at {}:{})",
            message, position.line, position.column
        ))
    }
}
