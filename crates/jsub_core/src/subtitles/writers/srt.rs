//! SRT subtitle writer.
//!
//! # Format
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! 一行目
//! 二行目
//!
//! ```
//!
//! Every entry, including the last, is followed by a blank line. Times are
//! rounded to the nearest millisecond.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::models::Subtitle;
use crate::subtitles::error::SubtitleError;

/// Render subtitles to an SRT string. Empty input renders to "".
pub fn render_srt(subtitles: &[Subtitle]) -> String {
    let mut output = String::new();

    for sub in subtitles {
        output.push_str(&format!("{}\n", sub.index));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(sub.start),
            format_srt_time(sub.end)
        ));
        for line in &sub.lines {
            output.push_str(line);
            output.push('\n');
        }
        output.push('\n');
    }

    output
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm).
pub fn format_srt_time(secs: f64) -> String {
    let ms = (secs.max(0.0) * 1000.0).round() as u64;

    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

/// Write subtitles to `path` atomically.
///
/// The content goes to a temporary file in the destination directory, is
/// synced, then renamed over the destination. On failure the destination
/// is left untouched and the temporary file is removed.
pub fn write_srt_file(subtitles: &[Subtitle], path: &Path) -> Result<(), SubtitleError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let err = |e: std::io::Error| SubtitleError::write(path.to_path_buf(), e);

    let mut tmp = NamedTempFile::new_in(dir).map_err(err)?;
    tmp.write_all(render_srt(subtitles).as_bytes())
        .map_err(err)?;
    tmp.as_file().sync_all().map_err(err)?;
    tmp.persist(path).map_err(|e| err(e.error))?;

    tracing::debug!(
        "Wrote {} subtitles to {}",
        subtitles.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sub(index: u32, start: f64, end: f64, lines: &[&str]) -> Subtitle {
        Subtitle::new(
            index,
            start,
            end,
            lines.iter().map(|l| l.to_string()).collect(),
        )
    }

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(1.5), "00:00:01,500");
        assert_eq!(format_srt_time(61.0), "00:01:01,000");
        assert_eq!(format_srt_time(3600.0), "01:00:00,000");
        assert_eq!(format_srt_time(1.2345), "00:00:01,235");
        assert_eq!(format_srt_time(-1.0), "00:00:00,000");
    }

    #[test]
    fn test_render_basic_srt() {
        let subs = vec![
            sub(1, 1.0, 4.0, &["こんにちは", "世界です。"]),
            sub(2, 5.0, 8.0, &["さようなら。"]),
        ];
        let expected = "1\n00:00:01,000 --> 00:00:04,000\nこんにちは\n世界です。\n\n\
                        2\n00:00:05,000 --> 00:00:08,000\nさようなら。\n\n";
        assert_eq!(render_srt(&subs), expected);
    }

    #[test]
    fn test_empty_input_writes_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.srt");

        write_srt_file(&[], &path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.srt");
        std::fs::write(&path, "old content").unwrap();

        write_srt_file(&[sub(1, 0.0, 1.0, &["新しい"])], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("新しい"));
        assert!(!content.contains("old"));
        // No temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_write_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.srt");

        let err = write_srt_file(&[sub(1, 0.0, 1.0, &["a"])], &path).unwrap_err();

        assert!(matches!(err, SubtitleError::WriteError { .. }));
        assert!(!path.exists());
    }
}
