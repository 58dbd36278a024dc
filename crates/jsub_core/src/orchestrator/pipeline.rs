//! Pipeline runner that executes steps in sequence.

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, JobState};

/// Pipeline that runs a sequence of steps.
///
/// The pipeline executes steps in order, running validation before
/// and after each step. Cancellation is checked at every step boundary;
/// steps poll the same token while they run.
pub struct Pipeline {
    /// Steps to execute in order.
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run the pipeline with the given context and state.
    ///
    /// Executes each step in order:
    /// 1. Check for cancellation
    /// 2. Run `validate_input`
    /// 3. Run `execute`
    /// 4. Run `validate_output`
    ///
    /// A step error that stems from the cancel token becomes
    /// `PipelineError::Cancelled`, not a step failure. A cancel that lands
    /// during the last step still cancels the run.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
        };

        for step in &self.steps {
            let step_name = step.name();
            let stage = step.stage();

            if ctx.cancel.is_cancelled() {
                ctx.logger
                    .warn(&format!("Pipeline cancelled before step '{}'", step_name));
                return Err(PipelineError::cancelled(&ctx.job_name));
            }

            ctx.logger.stage(stage);
            tracing::info!(job = %ctx.job_name, "Entering stage {}", stage);
            ctx.report_progress(stage, 0.0, &format!("Starting {}", step.description()));

            let fail = |e: super::errors::StepError| {
                if e.is_cancelled() || ctx.cancel.is_cancelled() {
                    ctx.logger.warn(&format!("{} cancelled", step_name));
                    PipelineError::cancelled(&ctx.job_name)
                } else {
                    ctx.logger.error(&format!("{} failed: {}", step_name, e));
                    PipelineError::step_failed(&ctx.job_name, step_name, stage, e)
                }
            };

            // Validate input
            ctx.logger
                .debug(&format!("Validating input for '{}'", step_name));
            step.validate_input(ctx).map_err(fail)?;

            // Execute
            ctx.logger.debug(&format!("Executing '{}'", step_name));
            step.execute(ctx, state).map_err(fail)?;

            ctx.logger
                .debug(&format!("Validating output for '{}'", step_name));
            step.validate_output(ctx, state).map_err(fail)?;

            ctx.report_progress(stage, 1.0, &format!("{} completed", step_name));
            ctx.logger.success(&format!("{} completed", step_name));
            result.steps_completed.push(step_name.to_string());
        }

        if ctx.cancel.is_cancelled() {
            ctx.logger.warn("Pipeline cancelled after the last step");
            return Err(PipelineError::cancelled(&ctx.job_name));
        }

        ctx.logger.success("Pipeline completed successfully");
        Ok(result)
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// Steps that completed successfully, in order.
    pub steps_completed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;
    use crate::orchestrator::errors::{StepError, StepResult};
    use crate::orchestrator::test_support::TestJob;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStep {
        name: &'static str,
        execute_count: Arc<AtomicUsize>,
        result: fn() -> StepResult<()>,
    }

    impl CountingStep {
        fn new(name: &'static str, result: fn() -> StepResult<()>) -> Self {
            Self {
                name,
                execute_count: Arc::new(AtomicUsize::new(0)),
                result,
            }
        }
    }

    impl PipelineStep for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn stage(&self) -> Stage {
            Stage::Formatting
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<()> {
            self.execute_count.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    fn ok() -> StepResult<()> {
        Ok(())
    }

    #[test]
    fn pipeline_builds_correctly() {
        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Step1", ok))
            .with_step(CountingStep::new("Step2", ok));

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Step1", "Step2"]);
    }

    #[test]
    fn runs_steps_in_order() {
        let job = TestJob::new();
        let ctx = job.context();
        let mut state = JobState::new("job-1");

        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Step1", ok))
            .with_step(CountingStep::new("Step2", ok));

        let result = pipeline.run(&ctx, &mut state).unwrap();
        assert_eq!(result.steps_completed, vec!["Step1", "Step2"]);
    }

    /// Cancels the job from inside `execute` and still reports success.
    struct CancellingStep;

    impl PipelineStep for CancellingStep {
        fn name(&self) -> &str {
            "Last"
        }

        fn stage(&self) -> Stage {
            Stage::Writing
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, ctx: &Context, _state: &mut JobState) -> StepResult<()> {
            ctx.cancel.cancel();
            Ok(())
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    #[test]
    fn cancel_during_last_step_cancels_the_run() {
        let job = TestJob::new();
        let ctx = job.context();
        let mut state = JobState::new("job-1");

        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Step1", ok))
            .with_step(CancellingStep);

        assert!(pipeline.run(&ctx, &mut state).unwrap_err().is_cancelled());
    }

    #[test]
    fn stops_at_first_failure() {
        let job = TestJob::new();
        let ctx = job.context();
        let mut state = JobState::new("job-1");

        let second = CountingStep::new("Step2", ok);
        let second_count = Arc::clone(&second.execute_count);
        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Step1", || Err(StepError::other("boom"))))
            .with_step(second);

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StepFailed { ref step_name, stage: Stage::Formatting, .. } if step_name == "Step1"
        ));
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_token_stops_before_first_step() {
        let job = TestJob::new();
        let ctx = job.context();
        ctx.cancel.cancel();
        let mut state = JobState::new("job-1");

        let step = CountingStep::new("Step1", ok);
        let count = Arc::clone(&step.execute_count);
        let pipeline = Pipeline::new().with_step(step);

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_step_error_is_not_a_failure() {
        let job = TestJob::new();
        let ctx = job.context();
        let mut state = JobState::new("job-1");

        let pipeline =
            Pipeline::new().with_step(CountingStep::new("Step1", || Err(StepError::Cancelled)));

        assert!(pipeline.run(&ctx, &mut state).unwrap_err().is_cancelled());
    }
}
