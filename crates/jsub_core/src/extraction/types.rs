//! Types for audio extraction.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::io::{CancelToken, RunError};
use crate::models::FailureCategory;

/// File name of the extracted audio inside the job work directory.
pub const AUDIO_FILE_NAME: &str = "audio_16k.wav";

/// Sample rate the recognizer expects.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Error type for extraction operations.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Input missing or not readable.
    #[error("Cannot read {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    /// The container has no audio stream.
    #[error("No audio stream found in {0}")]
    NoAudioStream(PathBuf),

    /// An external tool exited with an error.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// An external tool could not be started.
    #[error("Failed to run {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// The tool succeeded but produced no usable audio.
    #[error("Extracted audio missing or empty: {0}")]
    OutputMissing(PathBuf),

    #[error("Audio extraction was cancelled")]
    Cancelled,
}

impl ExtractionError {
    /// Create a command failed error.
    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Who has to act on this failure.
    pub fn category(&self) -> FailureCategory {
        match self {
            ExtractionError::Unreadable { .. }
            | ExtractionError::NoAudioStream(_)
            | ExtractionError::CommandFailed { .. } => FailureCategory::Input,
            ExtractionError::Spawn { .. } | ExtractionError::Cancelled => {
                FailureCategory::Environment
            }
            ExtractionError::OutputMissing(_) => FailureCategory::Filesystem,
        }
    }
}

impl From<RunError> for ExtractionError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::Cancelled { .. } => ExtractionError::Cancelled,
            RunError::Spawn { tool, source } => ExtractionError::Spawn {
                tool,
                message: source.to_string(),
            },
            RunError::Io { tool, source } => ExtractionError::Spawn {
                tool,
                message: source.to_string(),
            },
        }
    }
}

/// Result type for extraction operations.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Turns a video into mono 16 kHz PCM audio.
pub trait AudioExtractor: Send + Sync {
    /// Extract the first audio stream of `video` into `work_dir`.
    ///
    /// Returns the path of the written WAV file. Must stop promptly and
    /// return [`ExtractionError::Cancelled`] once `cancel` fires. Diagnostic
    /// output from the tools goes to `on_output`, one line per call.
    fn extract(
        &self,
        video: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
        on_output: &dyn Fn(&str),
    ) -> ExtractionResult<PathBuf>;
}
