//! Job snapshots and terminal results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::capability::CapabilityDescriptor;
use super::enums::Stage;

/// Why a job failed, in terms the operator can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Bad input file or configuration; the job never started.
    Validation,
    /// Audio could not be extracted from the video.
    Extraction,
    /// Speech recognition failed (after the retry, if any).
    Recognition,
    /// The subtitle file could not be written.
    Write,
    /// Anything else (setup of work directories, logger, ...).
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Validation => write!(f, "validation error"),
            FailureKind::Extraction => write!(f, "extraction error"),
            FailureKind::Recognition => write!(f, "recognition error"),
            FailureKind::Write => write!(f, "write error"),
            FailureKind::Internal => write!(f, "internal error"),
        }
    }
}

impl FailureKind {
    /// Default category for this kind. Adapters may refine it
    /// (a missing ffmpeg is an environment problem, not an input one).
    pub fn category(&self) -> FailureCategory {
        match self {
            FailureKind::Validation | FailureKind::Extraction => FailureCategory::Input,
            FailureKind::Recognition | FailureKind::Internal => FailureCategory::Environment,
            FailureKind::Write => FailureCategory::Filesystem,
        }
    }
}

/// Who has to fix the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    /// Fix your input file or settings.
    Input,
    /// Hardware, model or external tool problem.
    Environment,
    /// Disk or permission problem.
    Filesystem,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::Input => write!(f, "check the input file or settings"),
            FailureCategory::Environment => write!(f, "hardware or environment issue"),
            FailureCategory::Filesystem => write!(f, "disk or permissions issue"),
        }
    }
}

/// Structured terminal failure: where, why and what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Stage the failure happened in.
    pub stage: Stage,
    pub kind: FailureKind,
    pub category: FailureCategory,
    /// Human-readable message.
    pub message: String,
}

impl JobFailure {
    pub fn new(
        stage: Stage,
        kind: FailureKind,
        category: FailureCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            kind,
            category,
            message: message.into(),
        }
    }
}

impl JobFailure {
    /// Failure using the kind's default category.
    pub fn of_kind(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(stage, kind, kind.category(), message)
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} during {} ({}): {}",
            self.kind, self.stage, self.category, self.message
        )
    }
}

/// Immutable view of a pipeline job, as seen by the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Unique job identifier.
    pub id: String,
    /// Input video.
    pub video_path: PathBuf,
    /// Destination subtitle file.
    pub output_path: PathBuf,
    pub stage: Stage,
    /// Overall progress in `[0, 1]`.
    pub progress: f64,
    /// Estimated seconds remaining, `None` while unknown.
    pub eta_seconds: Option<f64>,
    /// Recognition attempt (1, or 2 after a CPU retry).
    pub attempt: u32,
    /// Capability in use for the current attempt.
    pub capability: Option<CapabilityDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    /// When the job was submitted.
    pub submitted_at: String,
}

impl JobSnapshot {
    /// Create the snapshot for a freshly submitted job.
    pub fn new(id: impl Into<String>, video_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            video_path,
            output_path,
            stage: Stage::Idle,
            progress: 0.0,
            eta_seconds: None,
            attempt: 1,
            capability: None,
            error: None,
            submitted_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Terminal result, delivered exactly once per job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded {
        output_path: PathBuf,
        subtitle_count: usize,
        capability: CapabilityDescriptor,
    },
    Failed(JobFailure),
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    /// Terminal stage matching this outcome.
    pub fn stage(&self) -> Stage {
        match self {
            JobOutcome::Succeeded { .. } => Stage::Done,
            JobOutcome::Failed(_) => Stage::Failed,
            JobOutcome::Cancelled => Stage::Cancelled,
        }
    }
}
