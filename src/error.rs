//! Error types for xmlscan operations.

use thiserror::Error;

use crate::model::TextPosition;

/// Errors that can occur while reading or analyzing an XML file.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("XML parsing error: {0}")]
    Parse(#[from] ParseError),

    #[error("Highlighting error: {0}")]
    Highlight(#[from] HighlightError),
}

/// A well-formedness violation, carrying the best-known source position.
///
/// One parse error aborts the whole-document build; the parser never
/// returns a partial tree with guessed positions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (line {}, column {})", position.line, position.column)]
pub struct ParseError {
    pub position: TextPosition,
    pub message: String,
}

impl ParseError {
    pub fn new(position: TextPosition, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// A recoverable highlighting failure. Highlighting is omitted for the
/// file; the rest of the analysis is unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HighlightError {
    pub message: String,
}

impl HighlightError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
