//! Subtitle processing module.
//!
//! Turns recognizer segments into display subtitles and reads/writes SRT.
//!
//! # Components
//!
//! - **formatter**: Japanese-aware merging, line breaking and timing
//! - **writers**: SRT rendering and atomic file writes
//! - **parsers**: SRT reading, used for verification and `jsub inspect`
//!
//! # Usage
//!
//! ```ignore
//! use jsub_core::subtitles::{format_segments, write_srt_file, FormatOptions};
//!
//! let subtitles = format_segments(&segments, &FormatOptions::default());
//! write_srt_file(&subtitles, Path::new("movie.srt"))?;
//! ```

mod error;
pub mod formatter;
pub mod parsers;
pub mod writers;

use std::fs;
use std::path::Path;

use crate::models::Subtitle;

// Re-export errors
pub use error::{ParseError, SubtitleError};

// Re-export formatter
pub use formatter::{check_subtitles, format_segments, FormatOptions};

// Re-export parsers and writers
pub use parsers::{parse_srt, parse_srt_time};
pub use writers::{format_srt_time, render_srt, write_srt_file};

/// Read and parse an SRT file from disk.
pub fn read_srt_file(path: impl AsRef<Path>) -> Result<Vec<Subtitle>, SubtitleError> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).map_err(|e| SubtitleError::read(path.to_path_buf(), e))?;
    Ok(parse_srt(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawSegment;
    use tempfile::TempDir;

    #[test]
    fn test_format_write_parse_round_trip() {
        let segments = vec![
            RawSegment::new(0.4, 2.1234, "今日の会議は、"),
            RawSegment::new(2.2, 5.9, "午後三時から第二会議室で行います。"),
            RawSegment::new(8.0, 8.3, "はい。"),
        ];
        let subs = format_segments(&segments, &FormatOptions::default());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("round_trip.srt");
        write_srt_file(&subs, &path).unwrap();
        let parsed = read_srt_file(&path).unwrap();

        assert_eq!(parsed.len(), subs.len());
        for (a, b) in subs.iter().zip(&parsed) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.lines, b.lines);
            assert!((a.start - b.start).abs() <= 0.001);
            assert!((a.end - b.end).abs() <= 0.001);
        }
        assert!(check_subtitles(&parsed, &FormatOptions::default()).is_empty());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_srt_file("/nonexistent/file.srt").unwrap_err();
        assert!(matches!(err, SubtitleError::ReadError { .. }));
    }
}
