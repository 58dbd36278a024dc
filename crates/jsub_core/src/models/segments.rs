//! Recognizer segments and formatted subtitles.
//!
//! All times are seconds as `f64`. Subtitle times are whole milliseconds
//! after formatting; rounding for display happens in the writer.

use serde::{Deserialize, Serialize};

/// Unmerged, unformatted timestamped text straight from the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Recognized text.
    pub text: String,
    /// Mean token probability, when the recognizer reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            confidence: None,
        }
    }

    /// Attach a confidence value.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Final display unit written to the subtitle file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    /// 1-based, contiguous across the file.
    pub index: u32,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Display lines, top to bottom.
    pub lines: Vec<String>,
}

impl Subtitle {
    pub fn new(index: u32, start: f64, end: f64, lines: Vec<String>) -> Self {
        Self {
            index,
            start,
            end,
            lines,
        }
    }

    /// Lines joined back into the unit text.
    pub fn text(&self) -> String {
        self.lines.concat()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Character count of the longest line.
    pub fn longest_line(&self) -> usize {
        self.lines
            .iter()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
    }
}
