//! whisper.cpp command line recognizer.
//!
//! Runs `whisper-cli` on the extracted WAV, turns its `progress = NN%`
//! stderr lines into progress fractions and reads the segments back from
//! the full JSON output (`-ojf`).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::config::{ToolSettings, TranscriptionSettings};
use crate::io::{CancelToken, CommandRunner, RunError};
use crate::models::{DeviceKind, RawSegment};

use super::types::{
    ModelSet, RecognitionError, RecognitionRequest, RecognitionResult, Recognizer,
};

/// Output prefix (without extension) inside the audio's directory.
const TRANSCRIPT_STEM: &str = "transcript";

/// stderr fragments meaning device memory ran out.
const OOM_MARKERS: &[&str] = &[
    "out of memory",
    "cudamalloc failed",
    "failed to allocate",
    "cuda error 2",
    "ggml_backend_cuda_buffer_type_alloc_buffer",
];

/// stderr fragments meaning the model could not be loaded.
const MODEL_MARKERS: &[&str] = &[
    "failed to load model",
    "failed to initialize whisper context",
    "invalid model data",
    "bad magic",
];

/// stderr fragments meaning the audio could not be decoded.
const AUDIO_MARKERS: &[&str] = &[
    "failed to read audio",
    "failed to read wav",
    "failed to open wav",
    "error: failed to read",
];

/// Non-speech placeholders emitted for silent stretches.
const NON_SPEECH: &[&str] = &["[BLANK_AUDIO]", "[ Silence ]", "[SILENCE]"];

/// [`Recognizer`] backed by the whisper.cpp `whisper-cli` executable.
#[derive(Debug, Clone)]
pub struct WhisperCliRecognizer {
    program: String,
    models: ModelSet,
    runner: CommandRunner,
}

impl WhisperCliRecognizer {
    pub fn new(program: impl Into<String>, models: ModelSet) -> Self {
        Self {
            program: program.into(),
            models,
            runner: CommandRunner::new(),
        }
    }

    pub fn from_settings(tools: &ToolSettings, transcription: &TranscriptionSettings) -> Self {
        Self::new(&tools.whisper, ModelSet::from_settings(transcription))
    }

    /// Where whisper-cli writes its JSON for a given audio file.
    fn transcript_path(audio_path: &Path) -> PathBuf {
        audio_path.with_file_name(format!("{}.json", TRANSCRIPT_STEM))
    }

    fn build_command(&self, request: &RecognitionRequest) -> Command {
        let params = &request.params;
        let model = self.models.for_precision(request.capability.precision);
        let output_prefix = request.audio_path.with_file_name(TRANSCRIPT_STEM);

        let mut cmd = Command::new(&self.program);
        cmd.arg("-m")
            .arg(model)
            .arg("-f")
            .arg(&request.audio_path)
            .arg("-l")
            .arg(&params.language)
            .arg("-bs")
            .arg(params.beam_size.to_string())
            .arg("-tp")
            .arg(params.temperature.to_string());

        if !params.initial_prompt.is_empty() {
            cmd.arg("--prompt").arg(&params.initial_prompt);
        }

        if params.threads > 0 {
            cmd.arg("-t").arg(params.threads.to_string());
        }

        if request.capability.device == DeviceKind::Cpu {
            cmd.arg("-ng");
        }

        if let Some(ref vad) = params.vad {
            cmd.arg("--vad")
                .arg("-vm")
                .arg(&vad.model)
                .arg("-vt")
                .arg(vad.threshold.to_string())
                .arg("-vspd")
                .arg(vad.min_speech_ms.to_string())
                .arg("-vsd")
                .arg(vad.min_silence_ms.to_string());
        }

        cmd.arg("-pp").arg("-ojf").arg("-of").arg(output_prefix);
        cmd
    }
}

impl Recognizer for WhisperCliRecognizer {
    fn name(&self) -> &str {
        "whisper-cli"
    }

    fn transcribe(
        &self,
        request: &RecognitionRequest,
        progress: &dyn Fn(f64),
        cancel: &CancelToken,
        on_output: &dyn Fn(&str),
    ) -> RecognitionResult<Vec<RawSegment>> {
        let model = self.models.for_precision(request.capability.precision);
        if !model.is_file() {
            return Err(RecognitionError::model_load(format!(
                "model file not found: {}",
                model.display()
            )));
        }
        if !request.audio_path.is_file() {
            return Err(RecognitionError::corrupt_audio(format!(
                "audio file not found: {}",
                request.audio_path.display()
            )));
        }

        let transcript = Self::transcript_path(&request.audio_path);
        let _ = fs::remove_file(&transcript);

        let mut last = 0.0_f64;
        let mut on_line = |line: &str| match parse_progress(line) {
            Some(fraction) if fraction > last => {
                last = fraction;
                progress(fraction);
            }
            Some(_) => {}
            None => on_output(line),
        };

        let output = self
            .runner
            .run(self.build_command(request), cancel, &mut on_line)
            .map_err(|e| match e {
                RunError::Cancelled { .. } => RecognitionError::cancelled(),
                other => RecognitionError::command_failed(other.to_string()),
            })?;

        if !output.success {
            return Err(classify_failure(&output.stderr, output.code()));
        }

        let json = fs::read_to_string(&transcript).map_err(|e| {
            // Some builds exit 0 after a CUDA allocation failure
            let classified = classify_failure(&output.stderr, output.code());
            if classified.recoverable {
                classified
            } else {
                RecognitionError::parse(format!("{}: {}", transcript.display(), e))
            }
        })?;

        let segments = parse_transcript_json(&json)?;
        progress(1.0);
        Ok(segments)
    }
}

/// Parse a `progress = NN%` line into a fraction.
pub fn parse_progress(line: &str) -> Option<f64> {
    let rest = &line[line.find("progress =")? + "progress =".len()..];
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let percent: f64 = digits.parse().ok()?;
    Some((percent / 100.0).clamp(0.0, 1.0))
}

/// Map recognizer stderr to an error kind.
pub fn classify_failure(stderr: &str, exit_code: i32) -> RecognitionError {
    let lower = stderr.to_lowercase();
    let detail = last_meaningful_line(stderr)
        .map(|l| format!("{} (exit code {})", l, exit_code))
        .unwrap_or_else(|| format!("exit code {}", exit_code));

    if OOM_MARKERS.iter().any(|m| lower.contains(m)) {
        RecognitionError::gpu_out_of_memory(detail)
    } else if MODEL_MARKERS.iter().any(|m| lower.contains(m)) {
        RecognitionError::model_load(detail)
    } else if AUDIO_MARKERS.iter().any(|m| lower.contains(m)) {
        RecognitionError::corrupt_audio(detail)
    } else {
        RecognitionError::command_failed(detail)
    }
}

fn last_meaningful_line(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty() && parse_progress(l).is_none())
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    #[serde(default)]
    text: String,
    #[serde(default)]
    tokens: Vec<WhisperToken>,
}

#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: i64,
    to: i64,
}

#[derive(Debug, Deserialize)]
struct WhisperToken {
    #[serde(default)]
    text: String,
    #[serde(default)]
    p: Option<f32>,
}

/// Parse whisper-cli JSON output into raw segments.
///
/// Offsets are milliseconds. Text is trimmed; silence placeholders are
/// dropped. Confidence is the mean probability of the non-special tokens.
pub fn parse_transcript_json(json: &str) -> RecognitionResult<Vec<RawSegment>> {
    let output: WhisperOutput = serde_json::from_str(json)
        .map_err(|e| RecognitionError::parse(format!("invalid transcript JSON: {}", e)))?;

    let segments = output
        .transcription
        .into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim();
            if NON_SPEECH.contains(&text) {
                return None;
            }

            let mut raw = RawSegment::new(
                seg.offsets.from as f64 / 1000.0,
                seg.offsets.to as f64 / 1000.0,
                text,
            );

            let probs: Vec<f32> = seg
                .tokens
                .iter()
                .filter(|t| !t.text.starts_with("[_"))
                .filter_map(|t| t.p)
                .collect();
            if !probs.is_empty() {
                raw = raw.with_confidence(probs.iter().sum::<f32>() / probs.len() as f32);
            }

            Some(raw)
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::format_command;
    use crate::models::{CapabilityDescriptor, Precision};
    use crate::recognition::{DecodeParams, RecognitionErrorKind, VadParams};

    fn models() -> ModelSet {
        ModelSet {
            default: PathBuf::from("models/base.bin"),
            float16: None,
            int8: Some(PathBuf::from("models/base-q8_0.bin")),
            float32: None,
        }
    }

    fn request(capability: CapabilityDescriptor) -> RecognitionRequest {
        RecognitionRequest {
            audio_path: PathBuf::from("/work/audio_16k.wav"),
            capability,
            params: DecodeParams::default(),
        }
    }

    #[test]
    fn gpu_command_uses_defaults() {
        let recognizer = WhisperCliRecognizer::new("whisper-cli", models());
        let req = request(CapabilityDescriptor::gpu("RTX", Precision::Float16));
        let line = format_command(&recognizer.build_command(&req));

        assert!(line.starts_with("whisper-cli -m models/base.bin -f /work/audio_16k.wav -l ja"));
        assert!(line.contains("-bs 5"));
        assert!(line.contains("-tp 0"));
        assert!(line.contains("--prompt"));
        assert!(line.ends_with("-pp -ojf -of /work/transcript"));
        assert!(!line.contains("-ng"));
        assert!(!line.contains("--vad"));
    }

    #[test]
    fn cpu_command_disables_gpu_and_picks_model() {
        let recognizer = WhisperCliRecognizer::new("whisper-cli", models());
        let req = request(CapabilityDescriptor::cpu(Precision::Int8, None));
        let line = format_command(&recognizer.build_command(&req));

        assert!(line.contains("-m models/base-q8_0.bin"));
        assert!(line.contains(" -ng "));
    }

    #[test]
    fn vad_flags_only_when_configured() {
        let recognizer = WhisperCliRecognizer::new("whisper-cli", models());
        let mut req = request(CapabilityDescriptor::gpu("RTX", Precision::Float16));
        req.params.vad = Some(VadParams {
            model: PathBuf::from("models/silero.bin"),
            threshold: 0.5,
            min_speech_ms: 250,
            min_silence_ms: 100,
        });
        let line = format_command(&recognizer.build_command(&req));

        assert!(line.contains("--vad -vm models/silero.bin -vt 0.5 -vspd 250 -vsd 100"));
    }

    #[test]
    fn parses_progress_lines() {
        assert_eq!(
            parse_progress("whisper_print_progress_callback: progress =  45%"),
            Some(0.45)
        );
        assert_eq!(parse_progress("progress = 100%"), Some(1.0));
        assert_eq!(parse_progress("whisper_init_from_file: loading model"), None);
    }

    #[test]
    fn classifies_failures() {
        let oom = classify_failure("ggml_cuda: cudaMalloc failed: out of memory\n", 1);
        assert_eq!(oom.kind, RecognitionErrorKind::GpuOutOfMemory);
        assert!(oom.recoverable);

        let model = classify_failure("error: failed to initialize whisper context\n", 3);
        assert_eq!(model.kind, RecognitionErrorKind::ModelLoad);
        assert!(!model.recoverable);

        let audio = classify_failure("error: failed to read audio file 'x.wav'\n", 2);
        assert_eq!(audio.kind, RecognitionErrorKind::CorruptAudio);

        let other = classify_failure("segmentation fault\n", 139);
        assert_eq!(other.kind, RecognitionErrorKind::CommandFailed);
        assert!(other.message.contains("139"));
    }

    #[test]
    fn parses_transcript_json() {
        let json = r#"{
            "transcription": [
                {
                    "timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                    "offsets": {"from": 0, "to": 2500},
                    "text": " こんにちは。",
                    "tokens": [
                        {"text": "[_BEG_]", "p": 0.1},
                        {"text": "こんにちは", "p": 0.9},
                        {"text": "。", "p": 0.7}
                    ]
                },
                {
                    "offsets": {"from": 2500, "to": 4000},
                    "text": " [BLANK_AUDIO]"
                },
                {
                    "offsets": {"from": 4000, "to": 5200},
                    "text": "元気ですか？"
                }
            ]
        }"#;

        let segments = parse_transcript_json(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "こんにちは。");
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.5);
        assert!((segments[0].confidence.unwrap() - 0.8).abs() < 1e-6);
        assert_eq!(segments[1].start, 4.0);
        assert!(segments[1].confidence.is_none());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_transcript_json("{not json").unwrap_err();
        assert_eq!(err.kind, RecognitionErrorKind::Parse);
    }

    #[test]
    fn missing_model_is_unrecoverable() {
        let recognizer = WhisperCliRecognizer::new(
            "whisper-cli",
            ModelSet {
                default: PathBuf::from("/nonexistent/model.bin"),
                float16: None,
                int8: None,
                float32: None,
            },
        );
        let req = request(CapabilityDescriptor::default());
        let err = recognizer
            .transcribe(&req, &|_| {}, &CancelToken::new(), &|_| {})
            .unwrap_err();
        assert_eq!(err.kind, RecognitionErrorKind::ModelLoad);
        assert!(!err.recoverable);
    }
}
