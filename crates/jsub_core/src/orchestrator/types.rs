//! Core types for the orchestrator pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::extraction::AudioExtractor;
use crate::io::CancelToken;
use crate::logging::JobLogger;
use crate::models::{CapabilityDescriptor, RawSegment, Stage, Subtitle};
use crate::recognition::Recognizer;

/// Update pushed from the pipeline to whoever drives it.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineUpdate {
    /// In-stage progress; `fraction` is in `[0, 1]`.
    Progress {
        stage: Stage,
        fraction: f64,
        message: String,
    },
    /// Recognition is being retried with a different capability.
    Retry {
        attempt: u32,
        capability: CapabilityDescriptor,
    },
}

/// Progress callback type for reporting pipeline progress.
pub type ProgressCallback = Box<dyn Fn(PipelineUpdate) + Send + Sync>;

/// File locations of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    /// Input video.
    pub video: PathBuf,
    /// Destination subtitle file.
    pub output: PathBuf,
    /// Job-private temporary directory.
    pub work_dir: PathBuf,
}

/// External collaborators used by the steps.
#[derive(Clone)]
pub struct Adapters {
    pub extractor: Arc<dyn AudioExtractor>,
    pub recognizer: Arc<dyn Recognizer>,
}

/// Read-only context passed to pipeline steps.
///
/// Contains job configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    /// Application settings.
    pub settings: Settings,
    /// Job name/identifier.
    pub job_name: String,
    pub paths: JobPaths,
    pub adapters: Adapters,
    /// Capability detected for this process.
    pub capability: CapabilityDescriptor,
    /// Per-job logger.
    pub logger: Arc<JobLogger>,
    /// Cooperative cancellation.
    pub cancel: CancelToken,
    /// Optional progress callback.
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    /// Create a new context for a job.
    pub fn new(
        settings: Settings,
        job_name: impl Into<String>,
        paths: JobPaths,
        adapters: Adapters,
        capability: CapabilityDescriptor,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            settings,
            job_name: job_name.into(),
            paths,
            adapters,
            capability,
            logger,
            cancel: CancelToken::new(),
            progress_callback: None,
        }
    }

    /// Use an externally owned cancel token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Override the detected capability.
    pub fn with_capability(mut self, capability: CapabilityDescriptor) -> Self {
        self.capability = capability;
        self
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report in-stage progress to the callback (if set).
    pub fn report_progress(&self, stage: Stage, fraction: f64, message: &str) {
        self.notify(PipelineUpdate::Progress {
            stage,
            fraction,
            message: message.to_string(),
        });
    }

    /// Report a recognition retry to the callback (if set).
    pub fn report_retry(&self, attempt: u32, capability: &CapabilityDescriptor) {
        self.notify(PipelineUpdate::Retry {
            attempt,
            capability: capability.clone(),
        });
    }

    fn notify(&self, update: PipelineUpdate) {
        if let Some(ref callback) = self.progress_callback {
            callback(update);
        }
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// Each step writes its own section; later steps only read earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    /// Unique job identifier.
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    /// Extracted audio (from the Extract step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    /// Audio duration in seconds, when the WAV header is readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
    /// Recognizer output (from the Transcribe step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<RawSegment>>,
    /// Formatted subtitles (from the Format step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<Vec<Subtitle>>,
    /// Recognition attempt (1, or 2 after a CPU retry).
    pub attempt: u32,
    /// Capability the successful recognition ran with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_used: Option<CapabilityDescriptor>,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            attempt: 1,
            ..Default::default()
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio_path.is_some()
    }

    pub fn has_segments(&self) -> bool {
        self.segments.is_some()
    }

    pub fn subtitle_count(&self) -> usize {
        self.subtitles.as_ref().map_or(0, Vec::len)
    }
}
