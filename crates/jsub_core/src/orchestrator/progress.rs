//! Overall progress and ETA estimation.
//!
//! Each working stage owns a fixed share of the bar. Overall progress is
//! the weight of completed stages plus the current stage's weight times
//! its in-stage fraction. The ETA extrapolates the current stage's rate
//! over the remaining work and is smoothed with an exponential moving
//! average.

use std::time::Instant;

use serde::Serialize;

use crate::models::Stage;

/// Smoothing factor of the ETA moving average.
pub const ETA_SMOOTHING: f64 = 0.3;

/// In-stage progress needed before an ETA is reported.
pub const ETA_MIN_FRACTION: f64 = 0.05;

/// Seconds in a stage needed before an ETA is reported.
pub const ETA_MIN_ELAPSED_SECS: f64 = 3.0;

/// Smallest change of overall progress that produces an event.
pub const EMIT_STEP: f64 = 0.01;

/// Share of the overall bar per working stage. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageWeights {
    pub extract: f64,
    /// Includes model loading at the start of recognition.
    pub transcribe: f64,
    pub format: f64,
    pub write: f64,
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            extract: 0.05,
            transcribe: 0.91,
            format: 0.02,
            write: 0.02,
        }
    }
}

const WORKING_STAGES: [Stage; 4] = [
    Stage::Extracting,
    Stage::Transcribing,
    Stage::Formatting,
    Stage::Writing,
];

impl StageWeights {
    /// Weight of one stage; 0 for non-working stages.
    pub fn weight(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Extracting => self.extract,
            Stage::Transcribing => self.transcribe,
            Stage::Formatting => self.format,
            Stage::Writing => self.write,
            _ => 0.0,
        }
    }

    /// Total weight of the stages before `stage`. Done counts as all.
    pub fn completed_before(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Idle => 0.0,
            Stage::Done => self.total(),
            _ => WORKING_STAGES
                .iter()
                .take_while(|s| **s != stage)
                .map(|s| self.weight(*s))
                .sum(),
        }
    }

    /// Total weight of the stages after `stage`.
    pub fn remaining_after(&self, stage: Stage) -> f64 {
        if !stage.is_working() {
            return 0.0;
        }
        self.total() - self.completed_before(stage) - self.weight(stage)
    }

    pub fn total(&self) -> f64 {
        WORKING_STAGES.iter().map(|s| self.weight(*s)).sum()
    }
}

/// Progress notification for the shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub stage: Stage,
    /// Overall progress in `[0, 1]`, non-decreasing within a job.
    pub overall: f64,
    /// Progress inside the current stage in `[0, 1]`.
    pub stage_fraction: f64,
    /// Estimated seconds remaining, `None` while unknown.
    pub eta: Option<f64>,
    pub message: String,
}

/// Turns raw stage updates into de-duplicated progress events.
#[derive(Debug)]
pub struct ProgressTracker {
    job_id: String,
    weights: StageWeights,
    stage: Stage,
    stage_started: Instant,
    stage_fraction: f64,
    overall: f64,
    last_emitted: Option<f64>,
    eta: Option<f64>,
}

impl ProgressTracker {
    pub fn new(job_id: impl Into<String>, weights: StageWeights, now: Instant) -> Self {
        Self {
            job_id: job_id.into(),
            weights,
            stage: Stage::Idle,
            stage_started: now,
            stage_fraction: 0.0,
            overall: 0.0,
            last_emitted: None,
            eta: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn overall(&self) -> f64 {
        self.overall
    }

    pub fn eta(&self) -> Option<f64> {
        self.eta
    }

    /// Record an update. Returns an event on a stage transition or when
    /// overall progress moved by at least [`EMIT_STEP`] since the last one.
    pub fn update(
        &mut self,
        stage: Stage,
        fraction: f64,
        message: &str,
        now: Instant,
    ) -> Option<ProgressEvent> {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let transition = stage != self.stage;
        if transition {
            self.restart_stage(stage, now);
        }
        self.stage_fraction = fraction;

        let overall = (self.weights.completed_before(stage) + self.weights.weight(stage) * fraction)
            .clamp(0.0, 1.0);
        self.overall = self.overall.max(overall);
        self.update_eta(now);

        let due = match self.last_emitted {
            None => true,
            Some(last) => self.overall - last >= EMIT_STEP - 1e-9,
        };
        if !transition && !due {
            return None;
        }

        self.last_emitted = Some(self.overall);
        Some(ProgressEvent {
            job_id: self.job_id.clone(),
            stage,
            overall: self.overall,
            stage_fraction: fraction,
            eta: self.eta,
            message: message.to_string(),
        })
    }

    /// Start timing `stage` from scratch (used for the recognition retry).
    /// Overall progress never moves backwards.
    pub fn restart_stage(&mut self, stage: Stage, now: Instant) {
        self.stage = stage;
        self.stage_started = now;
        self.stage_fraction = 0.0;
        self.eta = None;
    }

    fn update_eta(&mut self, now: Instant) {
        if !self.stage.is_working() {
            self.eta = None;
            return;
        }

        let elapsed = now.saturating_duration_since(self.stage_started).as_secs_f64();
        let fraction = self.stage_fraction;
        if fraction < ETA_MIN_FRACTION || elapsed < ETA_MIN_ELAPSED_SECS {
            return;
        }

        // Seconds for the whole stage at the current rate
        let stage_total = elapsed / fraction;
        let remaining_in_stage = stage_total * (1.0 - fraction);
        let weight = self.weights.weight(self.stage);
        let later = if weight > 0.0 {
            stage_total / weight * self.weights.remaining_after(self.stage)
        } else {
            0.0
        };

        let raw = remaining_in_stage + later;
        self.eta = Some(match self.eta {
            Some(prev) => ETA_SMOOTHING * raw + (1.0 - ETA_SMOOTHING) * prev,
            None => raw,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(t0: Instant, secs: f64) -> Instant {
        t0 + Duration::from_secs_f64(secs)
    }

    #[test]
    fn weights_sum_to_one() {
        let w = StageWeights::default();
        assert!((w.total() - 1.0).abs() < 1e-9);
        assert!((w.completed_before(Stage::Transcribing) - 0.05).abs() < 1e-9);
        assert!((w.remaining_after(Stage::Transcribing) - 0.04).abs() < 1e-9);
        assert_eq!(w.completed_before(Stage::Idle), 0.0);
    }

    #[test]
    fn overall_combines_completed_and_current_stage() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::new("job-1", StageWeights::default(), t0);

        tracker.update(Stage::Transcribing, 0.5, "", t0);
        assert!((tracker.overall() - (0.05 + 0.455)).abs() < 1e-9);

        tracker.update(Stage::Writing, 1.0, "", t0);
        assert!((tracker.overall() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn transitions_always_emit() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::new("job-1", StageWeights::default(), t0);

        assert!(tracker.update(Stage::Extracting, 0.0, "start", t0).is_some());
        let event = tracker
            .update(Stage::Transcribing, 0.0, "recognize", t0)
            .unwrap();
        assert_eq!(event.stage, Stage::Transcribing);
        assert_eq!(event.message, "recognize");
    }

    #[test]
    fn small_changes_are_deduplicated() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::new("job-1", StageWeights::default(), t0);
        tracker.update(Stage::Transcribing, 0.0, "", t0);

        let emitted = (1..=1000)
            .filter_map(|i| tracker.update(Stage::Transcribing, i as f64 / 1000.0, "", t0))
            .count();

        // 0.91 of the bar in 1% steps
        assert!((90..=92).contains(&emitted), "emitted {}", emitted);
    }

    #[test]
    fn eta_unknown_until_thresholds() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::new("job-1", StageWeights::default(), t0);
        tracker.update(Stage::Transcribing, 0.0, "", t0);

        // Enough progress, not enough time
        tracker.update(Stage::Transcribing, 0.2, "", at(t0, 2.0));
        assert_eq!(tracker.eta(), None);

        // Enough time, not enough progress
        let mut slow = ProgressTracker::new("job-2", StageWeights::default(), t0);
        slow.update(Stage::Transcribing, 0.0, "", t0);
        slow.update(Stage::Transcribing, 0.04, "", at(t0, 30.0));
        assert_eq!(slow.eta(), None);
    }

    #[test]
    fn eta_extrapolates_and_smooths() {
        let t0 = Instant::now();
        let w = StageWeights::default();
        let mut tracker = ProgressTracker::new("job-1", w, t0);
        tracker.update(Stage::Transcribing, 0.0, "", t0);

        tracker.update(Stage::Transcribing, 0.5, "", at(t0, 10.0));
        let later = 20.0 / w.transcribe * w.remaining_after(Stage::Transcribing);
        let first = 10.0 + later;
        assert!((tracker.eta().unwrap() - first).abs() < 1e-6);

        tracker.update(Stage::Transcribing, 0.6, "", at(t0, 12.0));
        let raw = 8.0 + later;
        let expected = ETA_SMOOTHING * raw + (1.0 - ETA_SMOOTHING) * first;
        assert!((tracker.eta().unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn retry_never_moves_overall_backwards() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::new("job-1", StageWeights::default(), t0);
        tracker.update(Stage::Transcribing, 0.8, "", at(t0, 10.0));
        let before = tracker.overall();

        tracker.restart_stage(Stage::Transcribing, at(t0, 11.0));
        tracker.update(Stage::Transcribing, 0.1, "", at(t0, 12.0));

        assert_eq!(tracker.overall(), before);
        assert_eq!(tracker.eta(), None);
    }
}
