//! Write step - writes the SRT file next to the input (or into the
//! configured output directory).

use crate::models::Stage;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState};
use crate::subtitles::write_srt_file;

pub struct WriteStep;

impl WriteStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WriteStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for WriteStep {
    fn name(&self) -> &str {
        "Write"
    }

    fn stage(&self) -> Stage {
        Stage::Writing
    }

    fn description(&self) -> &str {
        "subtitle file write"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        match ctx.paths.output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                Err(StepError::invalid_input(format!(
                    "Output directory does not exist: {}",
                    dir.display()
                )))
            }
            _ => Ok(()),
        }
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<()> {
        let subtitles = state
            .subtitles
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("No formatted subtitles"))?;

        // Once cancelled, an existing file at the output path stays as it was
        if ctx.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        write_srt_file(subtitles, &ctx.paths.output)?;
        ctx.logger.info(&format!(
            "Wrote {} subtitles to {}",
            subtitles.len(),
            ctx.paths.output.display()
        ));

        Ok(())
    }

    fn validate_output(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if !ctx.paths.output.is_file() {
            return Err(StepError::invalid_output(format!(
                "Subtitle file missing after write: {}",
                ctx.paths.output.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Subtitle;
    use crate::orchestrator::test_support::TestJob;

    #[test]
    fn writes_subtitles_to_output_path() {
        let job = TestJob::new();
        let ctx = job.context();
        let mut state = JobState::new("job-1");
        state.subtitles = Some(vec![Subtitle::new(
            1,
            0.0,
            1.5,
            vec!["テスト".to_string()],
        )]);

        let step = WriteStep::new();
        step.validate_input(&ctx).unwrap();
        step.execute(&ctx, &mut state).unwrap();
        step.validate_output(&ctx, &state).unwrap();

        let content = std::fs::read_to_string(&ctx.paths.output).unwrap();
        assert_eq!(content, "1\n00:00:00,000 --> 00:00:01,500\nテスト\n\n");
    }

    #[test]
    fn cancelled_job_leaves_existing_file_alone() {
        let job = TestJob::new();
        let ctx = job.context();
        std::fs::write(&ctx.paths.output, "previous").unwrap();
        ctx.cancel.cancel();

        let mut state = JobState::new("job-1");
        state.subtitles = Some(vec![Subtitle::new(
            1,
            0.0,
            1.0,
            vec!["テスト".to_string()],
        )]);

        let err = WriteStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(std::fs::read_to_string(&ctx.paths.output).unwrap(), "previous");
    }

    #[test]
    fn missing_output_directory_is_rejected() {
        let job = TestJob::new();
        let mut ctx = job.context();
        ctx.paths.output = job.dir.path().join("missing").join("out.srt");

        let err = WriteStep::new().validate_input(&ctx).unwrap_err();
        assert!(matches!(err, StepError::InvalidInput(_)));
    }
}
