//! Types for the recognition adapter.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TranscriptionSettings;
use crate::io::CancelToken;
use crate::models::{CapabilityDescriptor, FailureCategory, Precision, RawSegment};

/// Voice activity detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VadParams {
    pub model: PathBuf,
    pub threshold: f64,
    pub min_speech_ms: u32,
    pub min_silence_ms: u32,
}

/// Decoding parameters handed to the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeParams {
    pub language: String,
    pub initial_prompt: String,
    pub beam_size: u32,
    pub temperature: f64,
    /// 0 lets the recognizer decide.
    pub threads: u32,
    /// Present only when VAD is enabled and a VAD model is configured.
    pub vad: Option<VadParams>,
}

impl DecodeParams {
    pub fn from_settings(settings: &TranscriptionSettings) -> Self {
        let vad = (settings.vad_enabled && !settings.vad_model.trim().is_empty()).then(|| {
            VadParams {
                model: PathBuf::from(&settings.vad_model),
                threshold: settings.vad_threshold,
                min_speech_ms: settings.vad_min_speech_ms,
                min_silence_ms: settings.vad_min_silence_ms,
            }
        });

        Self {
            language: settings.language.clone(),
            initial_prompt: settings.initial_prompt.clone(),
            beam_size: settings.beam_size,
            temperature: settings.temperature,
            threads: settings.threads,
            vad,
        }
    }
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self::from_settings(&TranscriptionSettings::default())
    }
}

/// Model files per precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    pub default: PathBuf,
    pub float16: Option<PathBuf>,
    pub int8: Option<PathBuf>,
    pub float32: Option<PathBuf>,
}

impl ModelSet {
    pub fn from_settings(settings: &TranscriptionSettings) -> Self {
        let optional = |s: &str| (!s.trim().is_empty()).then(|| PathBuf::from(s));
        Self {
            default: PathBuf::from(&settings.model),
            float16: optional(&settings.model_float16),
            int8: optional(&settings.model_int8),
            float32: optional(&settings.model_float32),
        }
    }

    /// Model file for a precision, falling back to the default model.
    pub fn for_precision(&self, precision: Precision) -> &Path {
        let specific = match precision {
            Precision::Float16 => self.float16.as_deref(),
            Precision::Int8 => self.int8.as_deref(),
            Precision::Float32 => self.float32.as_deref(),
        };
        specific.unwrap_or(&self.default)
    }
}

/// One recognition call.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    /// Mono 16 kHz WAV.
    pub audio_path: PathBuf,
    /// Device and precision for this attempt.
    pub capability: CapabilityDescriptor,
    pub params: DecodeParams,
}

/// Classification of a recognition failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionErrorKind {
    /// Device memory exhausted; retrying on CPU may succeed.
    GpuOutOfMemory,
    /// Model file missing or unloadable.
    ModelLoad,
    /// Audio could not be decoded.
    CorruptAudio,
    /// The recognizer exited with an error.
    CommandFailed,
    /// Output could not be parsed.
    Parse,
    Cancelled,
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecognitionErrorKind::GpuOutOfMemory => "GPU out of memory",
            RecognitionErrorKind::ModelLoad => "model load failed",
            RecognitionErrorKind::CorruptAudio => "corrupt audio",
            RecognitionErrorKind::CommandFailed => "recognizer failed",
            RecognitionErrorKind::Parse => "unreadable recognizer output",
            RecognitionErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Recognition failure. `recoverable` is true only for device memory
/// exhaustion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RecognitionError {
    pub kind: RecognitionErrorKind,
    pub message: String,
    pub recoverable: bool,
}

impl RecognitionError {
    pub fn new(kind: RecognitionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: kind == RecognitionErrorKind::GpuOutOfMemory,
        }
    }

    pub fn gpu_out_of_memory(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::GpuOutOfMemory, message)
    }

    pub fn model_load(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::ModelLoad, message)
    }

    pub fn corrupt_audio(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::CorruptAudio, message)
    }

    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::CommandFailed, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(RecognitionErrorKind::Parse, message)
    }

    pub fn cancelled() -> Self {
        Self::new(RecognitionErrorKind::Cancelled, "recognition was cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == RecognitionErrorKind::Cancelled
    }

    /// Who has to act on this failure.
    pub fn category(&self) -> FailureCategory {
        match self.kind {
            RecognitionErrorKind::CorruptAudio => FailureCategory::Input,
            _ => FailureCategory::Environment,
        }
    }
}

/// Result type for recognition.
pub type RecognitionResult<T> = Result<T, RecognitionError>;

/// Speech recognizer: 16 kHz mono audio in, timestamped segments out.
pub trait Recognizer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Transcribe the request's audio.
    ///
    /// `progress` receives fractions in `[0, 1]`, non-decreasing. Must stop
    /// promptly with a `Cancelled` error once `cancel` fires. Diagnostic
    /// output other than progress goes to `on_output`, one line per call.
    fn transcribe(
        &self,
        request: &RecognitionRequest,
        progress: &dyn Fn(f64),
        cancel: &CancelToken,
        on_output: &dyn Fn(&str),
    ) -> RecognitionResult<Vec<RawSegment>>;
}
