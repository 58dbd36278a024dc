//! SRT subtitle parser.
//!
//! Reads back what the writer produces, plus the usual variations found in
//! the wild: a UTF-8 BOM, CRLF line endings, missing indices and `.` as the
//! millisecond separator. Text lines are kept as-is.

use crate::models::Subtitle;
use crate::subtitles::error::ParseError;

/// Parse SRT content into subtitles. Times are seconds.
pub fn parse_srt(content: &str) -> Result<Vec<Subtitle>, ParseError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut subtitles = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !block.is_empty() {
                subtitles.push(parse_block(&block, subtitles.len())?);
                block.clear();
            }
        } else {
            block.push((i + 1, line));
        }
    }
    if !block.is_empty() {
        subtitles.push(parse_block(&block, subtitles.len())?);
    }

    Ok(subtitles)
}

/// Parse one entry. `position` is the number of entries before it.
fn parse_block(block: &[(usize, &str)], position: usize) -> Result<Subtitle, ParseError> {
    let (first_line, first) = block[0];

    let (index, timing_at) = if first.contains("-->") {
        (position as u32 + 1, 0)
    } else {
        let index = first
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseError::invalid_index(first_line, first))?;
        (index, 1)
    };

    let (timing_line, timing) = *block
        .get(timing_at)
        .filter(|(_, l)| l.contains("-->"))
        .ok_or(ParseError::MissingTiming { line: first_line })?;

    let (start, end) = parse_srt_timing(timing)
        .ok_or_else(|| ParseError::invalid_time(timing_line, timing))?;

    let lines = block[timing_at + 1..]
        .iter()
        .map(|(_, l)| l.to_string())
        .collect();

    Ok(Subtitle::new(index, start, end, lines))
}

/// Parse a timing line: `HH:MM:SS,mmm --> HH:MM:SS,mmm`.
fn parse_srt_timing(line: &str) -> Option<(f64, f64)> {
    let (start, end) = line.split_once("-->")?;
    // Trailing position hints (`X1:...`) are ignored
    let end = end.split_whitespace().next()?;
    Some((parse_srt_time(start)?, parse_srt_time(end)?))
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm` or `HH:MM:SS.mmm`) to seconds.
pub fn parse_srt_time(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");

    let mut parts = s.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }

    let (secs, frac) = seconds_part.split_once('.').unwrap_or((seconds_part, ""));
    let secs: u64 = secs.parse().ok()?;
    if secs >= 60 {
        return None;
    }

    // Normalize the fraction to milliseconds
    let millis: u64 = match frac.len() {
        0 => 0,
        1..=3 => frac.parse::<u64>().ok()? * 10u64.pow(3 - frac.len() as u32),
        _ => frac.get(..3)?.parse().ok()?,
    };

    let total_ms = ((hours * 60 + minutes) * 60 + secs) * 1000 + millis;
    Some(total_ms as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_srt_time() {
        assert_eq!(parse_srt_time("00:00:00,000"), Some(0.0));
        assert_eq!(parse_srt_time("00:00:01,500"), Some(1.5));
        assert_eq!(parse_srt_time("00:01:00,000"), Some(60.0));
        assert_eq!(parse_srt_time("01:00:00,000"), Some(3600.0));
        assert_eq!(parse_srt_time("00:00:01.5"), Some(1.5));
        assert_eq!(parse_srt_time("00:00:61,000"), None);
        assert_eq!(parse_srt_time("garbage"), None);
    }

    #[test]
    fn test_parse_basic_srt() {
        let content = "1\n00:00:01,000 --> 00:00:04,000\nこんにちは\n世界です。\n\n\
                       2\n00:00:05,000 --> 00:00:08,000\nさようなら。\n";

        let subs = parse_srt(content).unwrap();

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].index, 1);
        assert_eq!(subs[0].start, 1.0);
        assert_eq!(subs[0].end, 4.0);
        assert_eq!(subs[0].lines, vec!["こんにちは", "世界です。"]);
        assert_eq!(subs[1].lines, vec!["さようなら。"]);
    }

    #[test]
    fn test_parse_bom_crlf_without_index() {
        let content = "\u{feff}00:00:01,000 --> 00:00:02,000\r\nあ\r\n\r\n\
                       00:00:03,000 --> 00:00:04,000\r\nい\r\n";

        let subs = parse_srt(content).unwrap();

        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1].index, 2);
        assert_eq!(subs[1].lines, vec!["い"]);
    }

    #[test]
    fn test_empty_content() {
        assert!(parse_srt("").unwrap().is_empty());
        assert!(parse_srt("\n\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_time_reports_line() {
        let content = "1\n00:00:01,000 --> 00:00:04,000\nあ\n\n2\n00:00:xx --> 00:00:05,000\nい\n";

        let err = parse_srt(content).unwrap_err();

        assert!(matches!(err, ParseError::InvalidTime { line: 6, .. }));
    }

    #[test]
    fn test_invalid_index() {
        let err = parse_srt("one\n00:00:01,000 --> 00:00:02,000\nあ\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidIndex { line: 1, .. }));
    }

    #[test]
    fn test_missing_timing() {
        let err = parse_srt("1\nただのテキスト\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingTiming { line: 1 }));
    }
}
