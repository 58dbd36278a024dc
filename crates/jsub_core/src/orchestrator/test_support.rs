//! Test doubles for orchestrator tests. No external tools required.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::config::Settings;
use crate::extraction::{AudioExtractor, ExtractionError, ExtractionResult, AUDIO_FILE_NAME};
use crate::io::CancelToken;
use crate::logging::{JobLogger, LogConfig};
use crate::models::{CapabilityDescriptor, Precision, RawSegment};
use crate::recognition::{RecognitionError, RecognitionRequest, RecognitionResult, Recognizer};

use super::types::{Adapters, Context, JobPaths};

/// Write one second of 16 kHz mono 16-bit silence.
pub fn write_silent_wav(path: &Path) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..16_000 {
        writer.write_sample(0i16)?;
    }
    writer.finalize()
}

/// Extractor that writes a silent WAV, optionally blocking until cancelled.
#[derive(Clone, Default)]
pub struct MockExtractor {
    block_until_cancelled: bool,
    fail_with: Option<fn() -> ExtractionError>,
    started: Arc<AtomicBool>,
    last_audio: Arc<Mutex<Option<PathBuf>>>,
}

impl MockExtractor {
    /// Emitted as tool output at the start of every extraction.
    pub const OUTPUT_LINE: &'static str = "Input #0, matroska,webm, from 'movie.mkv':";

    pub fn blocking() -> Self {
        Self {
            block_until_cancelled: true,
            ..Self::default()
        }
    }

    pub fn failing(error: fn() -> ExtractionError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    /// Set once `extract` has been entered.
    pub fn started(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.started)
    }

    /// Path of the last audio file written.
    pub fn last_audio(&self) -> Arc<Mutex<Option<PathBuf>>> {
        Arc::clone(&self.last_audio)
    }
}

impl AudioExtractor for MockExtractor {
    fn extract(
        &self,
        _video: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
        on_output: &dyn Fn(&str),
    ) -> ExtractionResult<PathBuf> {
        on_output(Self::OUTPUT_LINE);
        if let Some(error) = self.fail_with {
            return Err(error());
        }

        let audio = work_dir.join(AUDIO_FILE_NAME);
        write_silent_wav(&audio).map_err(|e| ExtractionError::Unreadable {
            path: audio.clone(),
            message: e.to_string(),
        })?;
        *self.last_audio.lock() = Some(audio.clone());
        self.started.store(true, Ordering::SeqCst);

        if self.block_until_cancelled {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
        }
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        Ok(audio)
    }
}

/// Recognizer returning canned segments and recording each capability.
#[derive(Clone, Default)]
pub struct MockRecognizer {
    segments: Vec<RawSegment>,
    oom_on_gpu: bool,
    fail_with: Option<RecognitionError>,
    calls: Arc<Mutex<Vec<CapabilityDescriptor>>>,
}

impl MockRecognizer {
    pub fn with_segments(segments: Vec<RawSegment>) -> Self {
        Self {
            segments,
            ..Self::default()
        }
    }

    /// Fails with device OOM on the GPU, succeeds on the CPU.
    pub fn oom_on_gpu(segments: Vec<RawSegment>) -> Self {
        Self {
            segments,
            oom_on_gpu: true,
            ..Self::default()
        }
    }

    pub fn failing(error: RecognitionError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<CapabilityDescriptor>>> {
        Arc::clone(&self.calls)
    }
}

impl Recognizer for MockRecognizer {
    fn name(&self) -> &str {
        "mock"
    }

    fn transcribe(
        &self,
        request: &RecognitionRequest,
        progress: &dyn Fn(f64),
        cancel: &CancelToken,
        on_output: &dyn Fn(&str),
    ) -> RecognitionResult<Vec<RawSegment>> {
        self.calls.lock().push(request.capability.clone());
        on_output(&format!(
            "whisper_init_from_file: loading model on {}",
            request.capability.label()
        ));

        if cancel.is_cancelled() {
            return Err(RecognitionError::cancelled());
        }
        if self.oom_on_gpu && request.capability.is_gpu() {
            progress(0.3);
            return Err(RecognitionError::gpu_out_of_memory("CUDA error: out of memory"));
        }
        if let Some(ref error) = self.fail_with {
            return Err(error.clone());
        }

        progress(0.5);
        progress(1.0);
        Ok(self.segments.clone())
    }
}

/// Temporary job layout: a fake video, a work dir and a log dir.
pub struct TestJob {
    pub dir: TempDir,
    pub video: PathBuf,
    pub settings: Settings,
}

impl TestJob {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("movie.mkv");
        std::fs::write(&video, b"not really a video").unwrap();
        std::fs::create_dir_all(dir.path().join("work")).unwrap();

        Self {
            dir,
            video,
            settings: Settings::default(),
        }
    }

    pub fn context(&self) -> Context {
        self.context_with(MockExtractor::default(), MockRecognizer::default())
    }

    pub fn context_with(&self, extractor: MockExtractor, recognizer: MockRecognizer) -> Context {
        let logger = JobLogger::new(
            "test-job",
            self.dir.path().join("logs"),
            LogConfig::default(),
            None,
        )
        .unwrap();

        Context::new(
            self.settings.clone(),
            "test-job",
            JobPaths {
                video: self.video.clone(),
                output: self.dir.path().join("movie.srt"),
                work_dir: self.dir.path().join("work"),
            },
            Adapters {
                extractor: Arc::new(extractor),
                recognizer: Arc::new(recognizer),
            },
            CapabilityDescriptor::cpu(Precision::Int8, None),
            Arc::new(logger),
        )
    }
}
