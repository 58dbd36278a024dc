//! Format step - turns recognizer segments into display subtitles.

use crate::models::Stage;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState};
use crate::subtitles::{check_subtitles, format_segments, FormatOptions};

pub struct FormatStep;

impl FormatStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FormatStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for FormatStep {
    fn name(&self) -> &str {
        "Format"
    }

    fn stage(&self) -> Stage {
        Stage::Formatting
    }

    fn description(&self) -> &str {
        "subtitle formatting"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<()> {
        let segments = state
            .segments
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("No recognized segments"))?;

        let options = FormatOptions::from(&ctx.settings.formatting);
        let subtitles = format_segments(segments, &options);

        if subtitles.is_empty() {
            ctx.logger
                .warn("No speech recognized; the subtitle file will be empty");
        } else {
            ctx.logger.info(&format!(
                "Formatted {} segments into {} subtitles",
                segments.len(),
                subtitles.len()
            ));
        }

        state.subtitles = Some(subtitles);
        Ok(())
    }

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let subtitles = state
            .subtitles
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Subtitles not recorded"))?;

        let options = FormatOptions::from(&ctx.settings.formatting);
        let issues = check_subtitles(subtitles, &options);
        if let Some(first) = issues.first() {
            return Err(StepError::invalid_output(format!(
                "{} layout problem(s), first: {}",
                issues.len(),
                first
            )));
        }
        Ok(())
    }
}
