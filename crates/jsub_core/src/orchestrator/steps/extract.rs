//! Extract step - pulls the first audio stream out of the video.
//!
//! The audio lands in the job work directory as mono 16 kHz PCM. The work
//! directory is removed by the worker when the job ends, whatever the
//! outcome.

use crate::extraction::wav_duration_secs;
use crate::models::Stage;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState};

/// Extract step backed by the context's [`AudioExtractor`](crate::extraction::AudioExtractor).
pub struct ExtractStep;

impl ExtractStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ExtractStep {
    fn name(&self) -> &str {
        "Extract"
    }

    fn stage(&self) -> Stage {
        Stage::Extracting
    }

    fn description(&self) -> &str {
        "audio extraction"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.paths.video.is_file() {
            return Err(StepError::invalid_input(format!(
                "Video not found: {}",
                ctx.paths.video.display()
            )));
        }
        if !ctx.paths.work_dir.is_dir() {
            return Err(StepError::precondition_failed(format!(
                "Work directory missing: {}",
                ctx.paths.work_dir.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<()> {
        ctx.logger
            .info(&format!("Extracting audio from {}", ctx.paths.video.display()));

        let audio = ctx.adapters.extractor.extract(
            &ctx.paths.video,
            &ctx.paths.work_dir,
            &ctx.cancel,
            &|line: &str| ctx.logger.output_line(line),
        )?;

        state.audio_duration = wav_duration_secs(&audio);
        match state.audio_duration {
            Some(secs) => ctx.logger.info(&format!(
                "Audio: {} ({:.1}s)",
                audio.display(),
                secs
            )),
            None => ctx.logger.info(&format!("Audio: {}", audio.display())),
        }
        state.audio_path = Some(audio);

        Ok(())
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.audio_path {
            Some(path) if path.is_file() => Ok(()),
            Some(path) => Err(StepError::invalid_output(format!(
                "Extracted audio missing: {}",
                path.display()
            ))),
            None => Err(StepError::invalid_output("Audio path not recorded")),
        }
    }
}
