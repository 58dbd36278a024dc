//! Single-slot job worker.
//!
//! The worker owns at most one running job. Submitting validates the input,
//! claims the slot and starts a dedicated thread that runs the standard
//! pipeline. Everything the shell needs arrives over one channel, in order:
//! state changes, progress events, log lines, and finally exactly one
//! [`WorkerEvent::Finished`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::Mutex;
use tempfile::TempDir;
use thiserror::Error;

use crate::config::{PathSettings, Settings};
use crate::extraction::FfmpegExtractor;
use crate::io::CancelToken;
use crate::logging::{JobLogger, LogConfig};
use crate::models::{
    CapabilityDescriptor, FailureKind, JobFailure, JobOutcome, JobSnapshot, Stage,
};
use crate::recognition::WhisperCliRecognizer;

use super::create_standard_pipeline;
use super::errors::PipelineError;
use super::progress::{ProgressEvent, ProgressTracker, StageWeights};
use super::types::{Adapters, Context, JobPaths, JobState, PipelineUpdate};

/// Video containers accepted by [`JobWorker::submit`].
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["mkv", "mp4"];

/// Message from the worker thread to the shell.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Progress(ProgressEvent),
    /// Stage, attempt or terminal status changed.
    StateChanged(JobSnapshot),
    /// One formatted job log line.
    Log(String),
    /// Terminal result. Always the last event of a job.
    Finished(JobOutcome),
}

/// Why a job was not started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Another job is running; jobs are not queued.
    #[error("A job is already running")]
    Busy,

    /// The input was rejected before any work started.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to start worker thread: {0}")]
    Spawn(String),
}

/// Check that `path` is an existing `.mkv`/`.mp4` file.
pub fn validate_video(path: &Path) -> Result<(), SubmitError> {
    if !path.is_file() {
        return Err(SubmitError::Validation(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)));
    if !supported {
        return Err(SubmitError::Validation(format!(
            "Unsupported file type: {} (expected .mkv or .mp4)",
            path.display()
        )));
    }

    Ok(())
}

/// Subtitle path for a video: `<stem>.srt` next to the input, or inside
/// `paths.output_dir` when set.
pub fn output_path_for(video: &Path, paths: &PathSettings) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subtitles".to_string());
    let file_name = format!("{}.srt", stem);

    if paths.output_dir.trim().is_empty() {
        video.with_file_name(file_name)
    } else {
        PathBuf::from(&paths.output_dir).join(file_name)
    }
}

/// Runs one subtitle job at a time on a background thread.
pub struct JobWorker {
    settings: Settings,
    adapters: Adapters,
    capability: CapabilityDescriptor,
    log_dir: PathBuf,
    weights: StageWeights,
    active: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl JobWorker {
    /// Create a worker with explicit adapters.
    pub fn new(settings: Settings, adapters: Adapters, capability: CapabilityDescriptor) -> Self {
        let log_dir = PathBuf::from(&settings.paths.logs_folder);
        Self {
            settings,
            adapters,
            capability,
            log_dir,
            weights: StageWeights::default(),
            active: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a worker using ffmpeg and whisper-cli as configured.
    pub fn from_settings(settings: Settings, capability: CapabilityDescriptor) -> Self {
        let adapters = Adapters {
            extractor: Arc::new(FfmpegExtractor::from_settings(&settings.tools)),
            recognizer: Arc::new(WhisperCliRecognizer::from_settings(
                &settings.tools,
                &settings.transcription,
            )),
        };
        Self::new(settings, adapters, capability)
    }

    /// Write job logs to `dir` instead of the configured logs folder.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn capability(&self) -> &CapabilityDescriptor {
        &self.capability
    }

    /// Whether a job currently occupies the slot.
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Validate `video` and start a job for it.
    ///
    /// Fails with [`SubmitError::Validation`] without starting any work, or
    /// [`SubmitError::Busy`] while another job runs.
    pub fn submit(&self, video: impl AsRef<Path>) -> Result<JobHandle, SubmitError> {
        let video = video.as_ref().to_path_buf();
        validate_video(&video)?;

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubmitError::Busy);
        }

        let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let output = output_path_for(&video, &self.settings.paths);
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();

        let run = JobRun {
            id: id.clone(),
            video,
            output: output.clone(),
            settings: self.settings.clone(),
            adapters: self.adapters.clone(),
            capability: self.capability.clone(),
            log_dir: self.log_dir.clone(),
            weights: self.weights,
            cancel: cancel.clone(),
        };
        let active = Arc::clone(&self.active);

        let thread = thread::Builder::new()
            .name(format!("jsub-{}", id))
            .spawn(move || {
                let guard = SlotGuard(active);
                let outcome = run.execute(&tx);
                // Free the slot before the shell hears about the result
                drop(guard);
                let _ = tx.send(WorkerEvent::Finished(outcome));
            });

        match thread {
            Ok(thread) => {
                tracing::info!("Submitted {}", id);
                Ok(JobHandle {
                    id,
                    output_path: output,
                    events: rx,
                    cancel,
                    thread: Some(thread),
                })
            }
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                Err(SubmitError::Spawn(e.to_string()))
            }
        }
    }
}

/// Releases the worker slot when the job thread ends, even on panic.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shell-side handle of a submitted job.
pub struct JobHandle {
    id: String,
    output_path: PathBuf,
    events: Receiver<WorkerEvent>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the subtitle file will be written.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Event stream of this job.
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Request cancellation. The job ends with [`JobOutcome::Cancelled`]
    /// unless it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this job, for signal handlers.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drain events until the terminal result and join the thread.
    pub fn wait(mut self) -> JobOutcome {
        let outcome = self.events.iter().find_map(|event| match event {
            WorkerEvent::Finished(outcome) => Some(outcome),
            _ => None,
        });
        self.join();

        outcome.unwrap_or_else(|| {
            JobOutcome::Failed(JobFailure::of_kind(
                Stage::Failed,
                FailureKind::Internal,
                "worker thread stopped without a result",
            ))
        })
    }

    /// Wait for the job thread to exit.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Job thread for {} panicked", self.id);
            }
        }
    }
}

/// Everything the job thread owns.
struct JobRun {
    id: String,
    video: PathBuf,
    output: PathBuf,
    settings: Settings,
    adapters: Adapters,
    capability: CapabilityDescriptor,
    log_dir: PathBuf,
    weights: StageWeights,
    cancel: CancelToken,
}

impl JobRun {
    fn job_name(&self) -> String {
        let stem = self
            .video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}_{}", self.id, stem)
    }

    fn execute(self, tx: &Sender<WorkerEvent>) -> JobOutcome {
        let mut snapshot = JobSnapshot::new(&self.id, self.video.clone(), self.output.clone());
        snapshot.capability = Some(self.capability.clone());
        let sink = Arc::new(EventSink {
            tx: tx.clone(),
            tracker: Mutex::new(ProgressTracker::new(&self.id, self.weights, Instant::now())),
            snapshot: Mutex::new(snapshot.clone()),
        });
        sink.send(WorkerEvent::StateChanged(snapshot));

        let outcome = self.run_pipeline(&sink);
        sink.finish(&outcome);
        outcome
    }

    fn run_pipeline(self, sink: &Arc<EventSink>) -> JobOutcome {
        let job_name = self.job_name();

        let work_dir = match create_work_dir(&self.settings.paths) {
            Ok(dir) => dir,
            Err(e) => {
                let err = PipelineError::setup_failed(
                    &job_name,
                    format!("Failed to create work directory: {}", e),
                );
                return outcome_for(err);
            }
        };

        let log_tx = sink.tx.clone();
        let logger = match JobLogger::new(
            &job_name,
            &self.log_dir,
            LogConfig::from(&self.settings.logging),
            Some(Box::new(move |line: &str| {
                let _ = log_tx.send(WorkerEvent::Log(line.to_string()));
            })),
        ) {
            Ok(logger) => Arc::new(logger),
            Err(e) => {
                let err = PipelineError::setup_failed(
                    &job_name,
                    format!("Failed to create logger: {}", e),
                );
                return outcome_for(err);
            }
        };

        logger.info(&format!("Starting job: {}", job_name));
        logger.info(&format!("Input: {}", self.video.display()));
        logger.info(&format!("Output: {}", self.output.display()));
        logger.info(&self.capability.label());
        if let Some(reason) = &self.capability.fallback_reason {
            logger.info(&format!("Fallback reason: {}", reason));
        }

        let progress_sink = Arc::clone(sink);
        let ctx = Context::new(
            self.settings,
            &job_name,
            JobPaths {
                video: self.video,
                output: self.output,
                work_dir: work_dir.path().to_path_buf(),
            },
            self.adapters,
            self.capability.clone(),
            Arc::clone(&logger),
        )
        .with_cancel_token(self.cancel)
        .with_progress_callback(Box::new(move |update| progress_sink.handle(update)));

        let mut state = JobState::new(&self.id);
        let pipeline = create_standard_pipeline();

        let outcome = match pipeline.run(&ctx, &mut state) {
            Ok(result) => {
                logger.info(&format!(
                    "Steps completed: {}",
                    result.steps_completed.join(", ")
                ));
                JobOutcome::Succeeded {
                    output_path: ctx.paths.output.clone(),
                    subtitle_count: state.subtitle_count(),
                    capability: state.capability_used.clone().unwrap_or(self.capability),
                }
            }
            Err(e) => {
                if !e.is_cancelled() {
                    logger.show_tail("Last tool output");
                }
                outcome_for(e)
            }
        };

        let work_path = work_dir.path().to_path_buf();
        match work_dir.close() {
            Ok(()) => logger.info(&format!(
                "Removed temporary files in {}",
                work_path.display()
            )),
            Err(e) => logger.warn(&format!(
                "Failed to remove temporary files in {}: {}",
                work_path.display(),
                e
            )),
        }

        match &outcome {
            JobOutcome::Succeeded { output_path, .. } => {
                logger.success(&format!("Done: {}", output_path.display()))
            }
            JobOutcome::Failed(failure) => logger.error(&failure.to_string()),
            JobOutcome::Cancelled => logger.warn("Job cancelled"),
        }
        logger.flush();

        outcome
    }
}

/// Per-job temporary directory under `paths.temp_root` (or the system
/// temp dir). Removed when dropped.
fn create_work_dir(paths: &PathSettings) -> io::Result<TempDir> {
    let root = paths.temp_root.trim();
    if root.is_empty() {
        tempfile::Builder::new().prefix("jsub-").tempdir()
    } else {
        fs::create_dir_all(root)?;
        tempfile::Builder::new().prefix("jsub-").tempdir_in(root)
    }
}

/// Failure kind of a step failing in `stage`.
fn kind_for_stage(stage: Stage) -> FailureKind {
    match stage {
        Stage::Extracting => FailureKind::Extraction,
        Stage::Transcribing => FailureKind::Recognition,
        Stage::Writing => FailureKind::Write,
        _ => FailureKind::Internal,
    }
}

/// Translate a pipeline error into the terminal outcome.
fn outcome_for(err: PipelineError) -> JobOutcome {
    match err {
        PipelineError::Cancelled { .. } => JobOutcome::Cancelled,
        PipelineError::StepFailed { stage, source, .. } => {
            let kind = kind_for_stage(stage);
            let category = source.category().unwrap_or_else(|| kind.category());
            JobOutcome::Failed(JobFailure::new(stage, kind, category, source.to_string()))
        }
        PipelineError::ValidationFailed { message, .. } => JobOutcome::Failed(
            JobFailure::of_kind(Stage::Idle, FailureKind::Validation, message),
        ),
        PipelineError::SetupFailed { message, .. } => JobOutcome::Failed(JobFailure::of_kind(
            Stage::Idle,
            FailureKind::Internal,
            message,
        )),
    }
}

/// Turns pipeline updates into worker events and keeps the snapshot.
struct EventSink {
    tx: Sender<WorkerEvent>,
    tracker: Mutex<ProgressTracker>,
    snapshot: Mutex<JobSnapshot>,
}

impl EventSink {
    /// The shell may have stopped listening; the job still runs to the end.
    fn send(&self, event: WorkerEvent) {
        let _ = self.tx.send(event);
    }

    fn handle(&self, update: PipelineUpdate) {
        match update {
            PipelineUpdate::Progress {
                stage,
                fraction,
                message,
            } => {
                let Some(event) = self
                    .tracker
                    .lock()
                    .update(stage, fraction, &message, Instant::now())
                else {
                    return;
                };

                let changed = {
                    let mut snapshot = self.snapshot.lock();
                    let changed = snapshot.stage != event.stage;
                    snapshot.stage = event.stage;
                    snapshot.progress = event.overall;
                    snapshot.eta_seconds = event.eta;
                    changed.then(|| snapshot.clone())
                };
                if let Some(snapshot) = changed {
                    self.send(WorkerEvent::StateChanged(snapshot));
                }
                self.send(WorkerEvent::Progress(event));
            }
            PipelineUpdate::Retry {
                attempt,
                capability,
            } => {
                self.tracker
                    .lock()
                    .restart_stage(Stage::Transcribing, Instant::now());
                let snapshot = {
                    let mut snapshot = self.snapshot.lock();
                    snapshot.attempt = attempt;
                    snapshot.capability = Some(capability);
                    snapshot.eta_seconds = None;
                    snapshot.clone()
                };
                self.send(WorkerEvent::StateChanged(snapshot));
            }
        }
    }

    /// Publish the terminal snapshot.
    fn finish(&self, outcome: &JobOutcome) {
        let snapshot = {
            let mut snapshot = self.snapshot.lock();
            snapshot.stage = outcome.stage();
            snapshot.eta_seconds = None;
            match outcome {
                JobOutcome::Succeeded { capability, .. } => {
                    snapshot.progress = 1.0;
                    snapshot.capability = Some(capability.clone());
                }
                JobOutcome::Failed(failure) => snapshot.error = Some(failure.clone()),
                JobOutcome::Cancelled => {}
            }
            snapshot.clone()
        };
        self.send(WorkerEvent::StateChanged(snapshot));
    }
}
