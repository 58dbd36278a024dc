//! Timing reconciliation.
//!
//! Works in whole milliseconds so that re-running on its own output is a
//! no-op. After this pass every block satisfies `start < end` and
//! `end <= next.start`, and starts are strictly increasing.

/// A laid-out subtitle before timing reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub start: f64,
    pub end: f64,
    pub lines: Vec<String>,
}

/// Seconds to whole milliseconds.
pub fn to_ms(secs: f64) -> i64 {
    (secs * 1000.0).round() as i64
}

/// Whole milliseconds to seconds.
pub fn from_ms(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

/// Quantize, order and de-overlap blocks.
///
/// 1. Stable sort by start.
/// 2. A start equal to (or before) the previous start is nudged to
///    previous start + 1 ms.
/// 3. Ends are raised to at least start + 1 ms and start + `min_duration`.
/// 4. Each end is trimmed back to the following start.
pub fn reconcile(blocks: Vec<Block>, min_duration: f64) -> Vec<Block> {
    let min_ms = to_ms(min_duration).max(0);

    let mut timed: Vec<(i64, i64, Vec<String>)> = blocks
        .into_iter()
        .map(|b| (to_ms(b.start), to_ms(b.end), b.lines))
        .collect();
    timed.sort_by_key(|(start, _, _)| *start);

    for i in 1..timed.len() {
        let prev_start = timed[i - 1].0;
        if timed[i].0 <= prev_start {
            timed[i].0 = prev_start + 1;
        }
    }

    for entry in timed.iter_mut() {
        entry.1 = entry.1.max(entry.0 + 1).max(entry.0 + min_ms);
    }

    for i in 0..timed.len().saturating_sub(1) {
        let next_start = timed[i + 1].0;
        if timed[i].1 > next_start {
            timed[i].1 = next_start;
        }
    }

    timed
        .into_iter()
        .map(|(start, end, lines)| Block {
            start: from_ms(start),
            end: from_ms(end),
            lines,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: f64, end: f64, text: &str) -> Block {
        Block {
            start,
            end,
            lines: vec![text.to_string()],
        }
    }

    #[test]
    fn extends_short_subtitles() {
        let out = reconcile(vec![block(1.0, 1.2, "短い")], 1.0);
        assert_eq!(out[0].start, 1.0);
        assert_eq!(out[0].end, 2.0);
    }

    #[test]
    fn trims_overlap_without_moving_start() {
        let out = reconcile(vec![block(0.0, 3.0, "一"), block(2.0, 4.0, "二")], 1.0);
        assert_eq!(out[0].end, 2.0);
        assert_eq!(out[1].start, 2.0);
    }

    #[test]
    fn extension_stops_at_next_start() {
        let out = reconcile(vec![block(0.0, 0.2, "一"), block(0.5, 2.0, "二")], 1.0);
        assert_eq!(out[0].end, 0.5);
    }

    #[test]
    fn equal_starts_are_nudged() {
        let out = reconcile(
            vec![block(1.0, 2.0, "一"), block(1.0, 2.0, "二"), block(1.0, 2.0, "三")],
            0.0,
        );
        assert_eq!(out[0].start, 1.0);
        assert_eq!(out[1].start, 1.001);
        assert_eq!(out[2].start, 1.002);
        assert_eq!(out[0].end, 1.001);
        assert_eq!(out[1].lines, vec!["二".to_string()]);
    }

    #[test]
    fn quantizes_to_milliseconds() {
        let out = reconcile(vec![block(0.12345, 2.00049, "一")], 0.0);
        assert_eq!(out[0].start, 0.123);
        assert_eq!(out[0].end, 2.0);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let first = reconcile(
            vec![block(0.0, 0.3, "一"), block(0.3, 0.4, "二"), block(5.0, 9.0, "三")],
            1.0,
        );
        let second = reconcile(first.clone(), 1.0);
        assert_eq!(first, second);
    }
}
