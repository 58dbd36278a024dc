//! The unit of work inside a subtitle job.

use super::errors::StepResult;
use super::types::{Context, JobState};
use crate::models::Stage;

/// One stage of the video-to-subtitle pipeline.
///
/// [`Pipeline::run`](super::Pipeline::run) drives each step through
/// `validate_input`, `execute` and (on success) `validate_output`. Steps
/// read configuration and adapters from the shared [`Context`] and leave
/// their results in [`JobState`] for the steps after them.
///
/// ```ignore
/// struct CountStep;
///
/// impl PipelineStep for CountStep {
///     fn name(&self) -> &str { "Count" }
///     fn stage(&self) -> Stage { Stage::Formatting }
///
///     fn validate_input(&self, _ctx: &Context) -> StepResult<()> { Ok(()) }
///
///     fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<()> {
///         ctx.logger.info(&format!("{} subtitles", state.subtitle_count()));
///         Ok(())
///     }
///
///     fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> { Ok(()) }
/// }
/// ```
pub trait PipelineStep: Send + Sync {
    /// Short name used in logs and failure messages.
    fn name(&self) -> &str;

    /// Stage the job is in while this step runs.
    fn stage(&self) -> Stage;

    /// Preconditions that need no work, e.g. input files or settings.
    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Do the work and record outputs in `state`.
    ///
    /// Anything that waits on an external tool must honour `ctx.cancel`.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<()>;

    /// Check what `execute` left behind.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Phrase for progress messages ("Starting <description>").
    fn description(&self) -> &str {
        self.name()
    }
}
