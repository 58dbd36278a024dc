//! Clean and merge passes.

use crate::models::RawSegment;

use super::line_break::{is_cjk, is_closing, is_sentence_final};
use super::{FormatOptions, Unit};

/// Normalize whitespace: trim, collapse runs to one space and drop spaces
/// next to CJK characters (Japanese text is not space separated).
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;

    for word in text.split_whitespace() {
        if let Some(p) = prev {
            let next = word.chars().next();
            if !is_cjk(p) && !next.is_some_and(is_cjk) {
                out.push(' ');
            }
        }
        out.push_str(word);
        prev = word.chars().last();
    }

    out
}

/// Whether the text ends a sentence, ignoring trailing closing brackets.
pub fn ends_sentence(text: &str) -> bool {
    text.chars()
        .rev()
        .find(|c| !is_closing(*c))
        .is_some_and(is_sentence_final)
}

/// Drop empty and malformed segments, normalize their text.
pub fn clean(segments: &[RawSegment]) -> Vec<Unit> {
    let mut units: Vec<Unit> = segments
        .iter()
        .filter(|s| s.start.is_finite() && s.end.is_finite() && s.end > s.start)
        .filter_map(|s| {
            let text = normalize_text(&s.text);
            if text.is_empty() {
                return None;
            }
            let start = s.start.max(0.0);
            (s.end > start).then_some(Unit {
                start,
                end: s.end,
                text,
            })
        })
        .collect();

    units.sort_by(|a, b| a.start.total_cmp(&b.start));
    units
}

/// Merge fragmented neighbours into subtitle-sized units.
///
/// Two units merge only if the first does not end a sentence, the silence
/// between them is below `merge_max_gap`, the joined text fits the
/// character budget and the joined span stays within `max_duration`.
///
/// The budget is inclusive: with the default budget of
/// `max_line_length * max_lines`, a join that exactly fills every line
/// still merges, since it lays out without overflow.
pub fn merge(units: Vec<Unit>, opts: &FormatOptions) -> Vec<Unit> {
    let budget = opts.char_budget();
    let mut merged: Vec<Unit> = Vec::with_capacity(units.len());

    for unit in units {
        if let Some(last) = merged.last_mut() {
            if let Some(joined) = try_join(last, &unit, opts, budget) {
                last.end = last.end.max(unit.end);
                last.text = joined;
                continue;
            }
        }
        merged.push(unit);
    }

    merged
}

fn try_join(last: &Unit, next: &Unit, opts: &FormatOptions, budget: usize) -> Option<String> {
    if ends_sentence(&last.text) {
        return None;
    }
    if next.start - last.end >= opts.merge_max_gap {
        return None;
    }
    if opts.max_duration > 0.0 && next.end.max(last.end) - last.start > opts.max_duration {
        return None;
    }

    let joined = normalize_text(&format!("{} {}", last.text, next.text));
    (joined.chars().count() <= budget).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(start: f64, end: f64, text: &str) -> Unit {
        Unit {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(normalize_text("  こんにちは　 世界 "), "こんにちは世界");
        assert_eq!(normalize_text("Hello   world"), "Hello world");
        assert_eq!(normalize_text("今日は OK です"), "今日はOKです");
        assert_eq!(normalize_text(" \t\n "), "");
    }

    #[test]
    fn sentence_end_detection() {
        assert!(ends_sentence("晴れです。"));
        assert!(ends_sentence("本当？"));
        assert!(ends_sentence("「行くぞ！」"));
        assert!(ends_sentence("Really?"));
        assert!(!ends_sentence("今日は"));
        assert!(!ends_sentence("えっと、"));
    }

    #[test]
    fn clean_drops_invalid_segments() {
        let segments = vec![
            RawSegment::new(2.0, 3.0, "後"),
            RawSegment::new(0.0, 1.0, "   "),
            RawSegment::new(1.0, 1.0, "ゼロ"),
            RawSegment::new(f64::NAN, 1.0, "壊れた"),
            RawSegment::new(0.5, 1.5, " 前 "),
        ];
        let units = clean(&segments);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "前");
        assert_eq!(units[1].text, "後");
    }

    #[test]
    fn merge_respects_budget() {
        let opts = FormatOptions {
            max_line_length: 4,
            max_lines: 1,
            ..FormatOptions::default()
        };
        let merged = merge(
            vec![unit(0.0, 1.0, "あいう"), unit(1.1, 2.0, "えお")],
            &opts,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn join_exactly_at_budget_merges() {
        let opts = FormatOptions {
            max_line_length: 5,
            max_lines: 1,
            ..FormatOptions::default()
        };
        let merged = merge(
            vec![unit(0.0, 1.0, "あいう"), unit(1.1, 2.0, "えお")],
            &opts,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "あいうえお");
    }

    #[test]
    fn merge_respects_max_duration() {
        let opts = FormatOptions {
            max_duration: 2.0,
            ..FormatOptions::default()
        };
        let merged = merge(
            vec![unit(0.0, 1.5, "えっと"), unit(1.6, 2.5, "それで")],
            &opts,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_joins_latin_with_space() {
        let merged = merge(
            vec![unit(0.0, 1.0, "Hello"), unit(1.1, 2.0, "world")],
            &FormatOptions::default(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Hello world");
        assert_eq!(merged[0].end, 2.0);
    }
}
