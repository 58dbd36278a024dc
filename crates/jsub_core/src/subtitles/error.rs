//! Subtitle error types.

use std::path::PathBuf;

/// Errors that can occur while reading or writing subtitle files.
#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    /// Failed to read subtitle file.
    #[error("Failed to read file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write subtitle file.
    #[error("Failed to write file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Parse error.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

/// Errors that can occur during SRT parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Invalid or malformed time format.
    #[error("Invalid time format at line {line}: '{value}'")]
    InvalidTime { line: usize, value: String },

    /// Entry index that is not a number.
    #[error("Invalid index at line {line}: '{value}'")]
    InvalidIndex { line: usize, value: String },

    /// Entry without a timing line.
    #[error("Missing timing line for entry at line {line}")]
    MissingTiming { line: usize },
}

impl SubtitleError {
    pub fn read(path: PathBuf, source: std::io::Error) -> Self {
        Self::ReadError { path, source }
    }

    pub fn write(path: PathBuf, source: std::io::Error) -> Self {
        Self::WriteError { path, source }
    }
}

impl ParseError {
    pub fn invalid_time(line: usize, value: impl Into<String>) -> Self {
        Self::InvalidTime {
            line,
            value: value.into(),
        }
    }

    pub fn invalid_index(line: usize, value: impl Into<String>) -> Self {
        Self::InvalidIndex {
            line,
            value: value.into(),
        }
    }
}
