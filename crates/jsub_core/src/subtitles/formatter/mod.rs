//! Segment formatter: raw recognizer segments to display subtitles.
//!
//! Pure and deterministic. Passes, in order:
//!
//! 1. **Clean** - normalize whitespace, drop empty or malformed segments.
//! 2. **Merge** - join fragments separated by short silences, never across
//!    a sentence end.
//! 3. **Layout** - split overflow into extra subtitles (or truncate), then
//!    break each unit into lines with Japanese break rules.
//! 4. **Timing** - quantize to milliseconds, enforce minimum duration,
//!    remove overlaps.
//! 5. **Renumber** - indices `1..=N`.
//!
//! Running the formatter with merging disabled on its own output returns
//! the same subtitles.

mod line_break;
mod merge;
mod timing;

pub use line_break::{break_lines, split_chunks, truncate, BreakClass};
pub use merge::{ends_sentence, normalize_text};

use crate::config::FormattingSettings;
use crate::models::{OverflowPolicy, RawSegment, Subtitle};

use timing::Block;

/// Formatting rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    /// Characters per line.
    pub max_line_length: usize,
    /// Lines per subtitle.
    pub max_lines: usize,
    pub merge_enabled: bool,
    /// Silence (seconds) below which fragments may merge.
    pub merge_max_gap: f64,
    /// Character budget of a merged unit; 0 means line length x lines.
    pub merge_char_budget: usize,
    /// Shortest display time in seconds.
    pub min_duration: f64,
    /// Longest span a merge may produce in seconds; 0 disables the limit.
    pub max_duration: f64,
    pub overflow: OverflowPolicy,
}

impl FormatOptions {
    /// Characters one subtitle can hold.
    pub fn capacity(&self) -> usize {
        self.max_line_length.max(1) * self.max_lines.max(1)
    }

    /// Effective merge budget.
    pub fn char_budget(&self) -> usize {
        if self.merge_char_budget == 0 {
            self.capacity()
        } else {
            self.merge_char_budget
        }
    }

    /// Same options with merging turned off.
    pub fn without_merge(&self) -> Self {
        Self {
            merge_enabled: false,
            ..self.clone()
        }
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self::from(&FormattingSettings::default())
    }
}

impl From<&FormattingSettings> for FormatOptions {
    fn from(s: &FormattingSettings) -> Self {
        Self {
            max_line_length: s.max_line_length as usize,
            max_lines: s.max_lines_per_subtitle as usize,
            merge_enabled: s.merge_enabled,
            merge_max_gap: s.merge_max_gap,
            merge_char_budget: s.merge_char_budget as usize,
            min_duration: s.min_duration,
            max_duration: s.max_duration,
            overflow: s.overflow,
        }
    }
}

/// Cleaned, possibly merged text span.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Unit {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Format raw segments into numbered subtitles.
pub fn format_segments(segments: &[RawSegment], opts: &FormatOptions) -> Vec<Subtitle> {
    let max_len = opts.max_line_length.max(1);
    let max_lines = opts.max_lines.max(1);

    let mut units = merge::clean(segments);
    if opts.merge_enabled {
        units = merge::merge(units, opts);
    }

    let blocks: Vec<Block> = units
        .into_iter()
        .flat_map(|unit| layout(unit, opts))
        .map(|(start, end, text)| Block {
            start,
            end,
            lines: break_lines(&text, max_len, max_lines),
        })
        .collect();

    timing::reconcile(blocks, opts.min_duration)
        .into_iter()
        .enumerate()
        .map(|(i, b)| Subtitle::new(i as u32 + 1, b.start, b.end, b.lines))
        .collect()
}

/// Fit a unit into one or more subtitle-sized texts with their time spans.
fn layout(unit: Unit, opts: &FormatOptions) -> Vec<(f64, f64, String)> {
    let capacity = opts.capacity();
    if unit.text.chars().count() <= capacity {
        return vec![(unit.start, unit.end, unit.text)];
    }

    match opts.overflow {
        OverflowPolicy::Truncate => vec![(unit.start, unit.end, truncate(&unit.text, capacity))],
        OverflowPolicy::Split => {
            let chunks = split_chunks(&unit.text, capacity);
            let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
            let duration = unit.end - unit.start;

            let mut before = 0usize;
            chunks
                .into_iter()
                .map(|chunk| {
                    let len = chunk.chars().count();
                    let start = unit.start + duration * before as f64 / total as f64;
                    before += len;
                    let end = unit.start + duration * before as f64 / total as f64;
                    (start, end, chunk)
                })
                .collect()
        }
    }
}

/// Check the output invariants. Returns one message per violation.
pub fn check_subtitles(subtitles: &[Subtitle], opts: &FormatOptions) -> Vec<String> {
    let mut issues = Vec::new();

    for (i, sub) in subtitles.iter().enumerate() {
        let expected = i as u32 + 1;
        if sub.index != expected {
            issues.push(format!("entry {}: index {} (expected {})", expected, sub.index, expected));
        }
        if !(sub.start < sub.end) {
            issues.push(format!("entry {}: start is not before end", expected));
        }
        if sub.lines.is_empty() {
            issues.push(format!("entry {}: no text", expected));
        }
        if sub.lines.iter().any(|l| l.trim().is_empty()) {
            issues.push(format!("entry {}: blank line", expected));
        }
        if sub.lines.len() > opts.max_lines {
            issues.push(format!(
                "entry {}: {} lines (max {})",
                expected,
                sub.lines.len(),
                opts.max_lines
            ));
        }
        if sub.longest_line() > opts.max_line_length {
            issues.push(format!(
                "entry {}: line of {} chars (max {})",
                expected,
                sub.longest_line(),
                opts.max_line_length
            ));
        }
        if let Some(next) = subtitles.get(i + 1) {
            if sub.end > next.start {
                issues.push(format!("entry {}: overlaps the next entry", expected));
            }
        }
    }

    issues
}
