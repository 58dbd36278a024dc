//! Job orchestration: from a video file to a written subtitle file.
//!
//! A job runs a fixed sequence of steps, each owning one stage:
//!
//! ```text
//! JobWorker (one job at a time, own thread)
//!     └── Pipeline
//!         ├── Step: Extract     (video -> 16 kHz mono WAV)
//!         ├── Step: Transcribe  (WAV -> raw segments, one CPU retry)
//!         ├── Step: Format      (segments -> subtitles)
//!         └── Step: Write       (subtitles -> .srt, atomic replace)
//! ```
//!
//! The worker reports everything over a channel of [`WorkerEvent`]s and
//! ends every job with exactly one [`WorkerEvent::Finished`].
//!
//! # Example
//!
//! ```ignore
//! use jsub_core::orchestrator::{JobWorker, WorkerEvent};
//!
//! let worker = JobWorker::from_settings(settings, capability);
//! let handle = worker.submit("movie.mkv")?;
//! for event in handle.events().iter() {
//!     if let WorkerEvent::Finished(outcome) = event {
//!         println!("{:?}", outcome);
//!         break;
//!     }
//! }
//! ```

mod errors;
mod pipeline;
pub mod progress;
mod step;
pub mod steps;
mod types;
mod worker;

#[cfg(test)]
mod test_support;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use progress::{ProgressEvent, ProgressTracker, StageWeights};
pub use step::PipelineStep;
pub use steps::{ExtractStep, FormatStep, TranscribeStep, WriteStep};
pub use types::{
    Adapters, Context, JobPaths, JobState, PipelineUpdate, ProgressCallback,
};
pub use worker::{
    output_path_for, validate_video, JobHandle, JobWorker, SubmitError, WorkerEvent,
    SUPPORTED_EXTENSIONS,
};

/// Create the standard subtitle pipeline.
///
/// 1. Extract - decode the audio track to a WAV in the work directory
/// 2. Transcribe - run speech recognition
/// 3. Format - clean, merge and lay out subtitles
/// 4. Write - write the SRT file
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ExtractStep::new())
        .with_step(TranscribeStep::new())
        .with_step(FormatStep::new())
        .with_step(WriteStep::new())
}
