//! Transcribe step - runs speech recognition on the extracted audio.
//!
//! A recoverable failure (device memory exhaustion) is retried exactly once
//! on the CPU with float32 precision. The retry is logged and reported to
//! the shell but never surfaces as an error if it succeeds.

use std::time::Instant;

use crate::models::{CapabilityDescriptor, DeviceKind, Precision, RawSegment, Stage};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState};
use crate::recognition::{DecodeParams, RecognitionRequest, RecognitionResult};

/// Transcribe step backed by the context's [`Recognizer`](crate::recognition::Recognizer).
pub struct TranscribeStep;

impl TranscribeStep {
    pub fn new() -> Self {
        Self
    }

    fn attempt(
        &self,
        ctx: &Context,
        request: &RecognitionRequest,
    ) -> RecognitionResult<Vec<RawSegment>> {
        let recognizer = &ctx.adapters.recognizer;
        ctx.logger.info(&format!(
            "Transcribing with {} on {}",
            recognizer.name(),
            request.capability.label()
        ));

        let progress = |fraction: f64| {
            let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
            ctx.logger.progress(percent);
            ctx.report_progress(Stage::Transcribing, fraction, "Transcribing");
        };

        let output = |line: &str| ctx.logger.output_line(line);

        recognizer.transcribe(request, &progress, &ctx.cancel, &output)
    }
}

impl Default for TranscribeStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a retry on CPU float32 would change anything.
fn can_retry_on_cpu(capability: &CapabilityDescriptor) -> bool {
    capability.device != DeviceKind::Cpu || capability.precision != Precision::Float32
}

impl PipelineStep for TranscribeStep {
    fn name(&self) -> &str {
        "Transcribe"
    }

    fn stage(&self) -> Stage {
        Stage::Transcribing
    }

    fn description(&self) -> &str {
        "speech recognition"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        let params = &ctx.settings.transcription;
        if params.beam_size == 0 {
            return Err(StepError::invalid_input("beam_size must be at least 1"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<()> {
        let audio = state
            .audio_path
            .clone()
            .ok_or_else(|| StepError::precondition_failed("No extracted audio"))?;

        let mut request = RecognitionRequest {
            audio_path: audio,
            capability: ctx.capability.clone(),
            params: DecodeParams::from_settings(&ctx.settings.transcription),
        };

        let started = Instant::now();
        let segments = match self.attempt(ctx, &request) {
            Ok(segments) => segments,
            Err(e) if e.recoverable && can_retry_on_cpu(&request.capability) => {
                let retry = CapabilityDescriptor::cpu_retry(e.to_string());
                ctx.logger.warn(&format!(
                    "{} - retrying once on {}",
                    e,
                    retry.label()
                ));
                tracing::warn!(job = %ctx.job_name, "Recognition failed ({}), retrying on CPU", e);

                state.attempt += 1;
                ctx.report_retry(state.attempt, &retry);
                request.capability = retry;
                self.attempt(ctx, &request)?
            }
            Err(e) => return Err(e.into()),
        };

        let elapsed = started.elapsed().as_secs_f64();
        ctx.logger.info(&format!(
            "Recognized {} segments in {:.1}s",
            segments.len(),
            elapsed
        ));
        if let Some(duration) = state.audio_duration.filter(|d| *d > 0.0) {
            ctx.logger
                .info(&format!("Real-time factor: {:.2}", elapsed / duration));
        }

        state.capability_used = Some(request.capability);
        state.segments = Some(segments);
        Ok(())
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if !state.has_segments() {
            return Err(StepError::invalid_output("Segments not recorded"));
        }
        Ok(())
    }
}
