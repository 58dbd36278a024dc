//! FFmpeg audio extraction.
//!
//! Extracts the first audio stream of a video as mono 16 kHz 16-bit PCM
//! WAV. Video, subtitle and data streams are dropped (`-vn -sn -dn`), so
//! nothing is ever re-encoded except the audio.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ToolSettings;
use crate::io::{CancelToken, CommandRunner};

use super::types::{
    AudioExtractor, ExtractionError, ExtractionResult, AUDIO_FILE_NAME, TARGET_SAMPLE_RATE,
};

/// Size of a canonical PCM WAV header; anything not larger has no samples.
const WAV_HEADER_LEN: u64 = 44;

/// [`AudioExtractor`] backed by the `ffprobe`/`ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: String,
    ffprobe: String,
    runner: CommandRunner,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            runner: CommandRunner::new(),
        }
    }

    pub fn from_settings(tools: &ToolSettings) -> Self {
        Self::new(&tools.ffmpeg, &tools.ffprobe)
    }

    /// Check that the container has at least one audio stream.
    fn ensure_audio_stream(
        &self,
        video: &Path,
        cancel: &CancelToken,
        on_output: &dyn Fn(&str),
    ) -> ExtractionResult<()> {
        let output = self.runner.run(
            self.probe_command(video),
            cancel,
            &mut |line: &str| on_output(line),
        )?;

        if !output.success {
            return Err(ExtractionError::command_failed(
                &self.ffprobe,
                output.code(),
                output.last_error_line(),
            ));
        }

        if output.stdout.trim().is_empty() {
            return Err(ExtractionError::NoAudioStream(video.to_path_buf()));
        }

        Ok(())
    }

    fn probe_command(&self, video: &Path) -> Command {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error"])
            .args(["-select_streams", "a"])
            .args(["-show_entries", "stream=index"])
            .args(["-of", "csv=p=0"])
            .arg(video);
        cmd
    }

    fn extract_command(&self, video: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-y"])
            .arg("-i")
            .arg(video)
            .args(["-vn", "-sn", "-dn"])
            .args(["-map", "0:a:0"])
            .args(["-acodec", "pcm_s16le"])
            .args(["-ac", "1"])
            .arg("-ar")
            .arg(TARGET_SAMPLE_RATE.to_string())
            .arg(output);
        cmd
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl AudioExtractor for FfmpegExtractor {
    fn extract(
        &self,
        video: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
        on_output: &dyn Fn(&str),
    ) -> ExtractionResult<PathBuf> {
        check_readable(video)?;
        self.ensure_audio_stream(video, cancel, on_output)?;

        let output_path = work_dir.join(AUDIO_FILE_NAME);
        let output = self.runner.run(
            self.extract_command(video, &output_path),
            cancel,
            &mut |line: &str| on_output(line),
        )?;

        if !output.success {
            return Err(ExtractionError::command_failed(
                &self.ffmpeg,
                output.code(),
                output.last_error_line(),
            ));
        }

        let size = fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);
        if size <= WAV_HEADER_LEN {
            return Err(ExtractionError::OutputMissing(output_path));
        }

        tracing::debug!(
            "Extracted {} bytes of audio to {}",
            size,
            output_path.display()
        );

        Ok(output_path)
    }
}

/// Fail early with a clear message for missing or unreadable input.
fn check_readable(video: &Path) -> ExtractionResult<()> {
    fs::File::open(video)
        .map(|_| ())
        .map_err(|e| ExtractionError::Unreadable {
            path: video.to_path_buf(),
            message: e.to_string(),
        })
}
