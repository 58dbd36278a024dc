//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Job → Step → Adapter → Detail

use std::io;

use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::models::{FailureCategory, Stage};
use crate::recognition::RecognitionError;
use crate::subtitles::SubtitleError;

/// Top-level pipeline error with job context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        stage: Stage,
        #[source]
        source: StepError,
    },

    /// Input validation failed before the pipeline started.
    #[error("Job '{job_name}' failed validation: {message}")]
    ValidationFailed { job_name: String, message: String },

    /// Pipeline was cancelled.
    #[error("Job '{job_name}' was cancelled")]
    Cancelled { job_name: String },

    /// Failed to set up the job (work directory, logger, ...).
    #[error("Job '{job_name}' setup failed: {message}")]
    SetupFailed { job_name: String, message: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        stage: Stage,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            stage,
            source,
        }
    }

    /// Create a validation failed error.
    pub fn validation_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(job_name: impl Into<String>) -> Self {
        Self::Cancelled {
            job_name: job_name.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// A required earlier step did not record its output.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Subtitle(#[from] SubtitleError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The cancel token fired while the step was running.
    #[error("Step was cancelled")]
    Cancelled,

    /// Generic step error with message.
    #[error("{0}")]
    Other(String),
}

impl StepError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create a precondition failed error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether this error is a cancellation surfacing from an adapter.
    pub fn is_cancelled(&self) -> bool {
        match self {
            StepError::Cancelled => true,
            StepError::Extraction(ExtractionError::Cancelled) => true,
            StepError::Recognition(e) => e.is_cancelled(),
            _ => false,
        }
    }

    /// Category reported by the failing adapter, if it knows better than
    /// the stage default.
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            StepError::Extraction(e) => Some(e.category()),
            StepError::Recognition(e) => Some(e.category()),
            StepError::Subtitle(_) | StepError::IoError { .. } => Some(FailureCategory::Filesystem),
            _ => None,
        }
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_cancellation_is_detected() {
        assert!(StepError::Cancelled.is_cancelled());
        assert!(StepError::from(ExtractionError::Cancelled).is_cancelled());
        assert!(StepError::from(RecognitionError::cancelled()).is_cancelled());
        assert!(!StepError::other("boom").is_cancelled());
    }

    #[test]
    fn adapter_category_wins() {
        let err = StepError::from(RecognitionError::corrupt_audio("bad wav"));
        assert_eq!(err.category(), Some(FailureCategory::Input));
        assert_eq!(StepError::invalid_output("x").category(), None);
    }

    #[test]
    fn step_failed_message_names_step() {
        let err = PipelineError::step_failed(
            "job-1",
            "Transcribe",
            Stage::Transcribing,
            StepError::from(RecognitionError::model_load("missing model")),
        );
        let msg = err.to_string();
        assert!(msg.contains("Transcribe"));
        assert!(msg.contains("missing model"));
    }
}
