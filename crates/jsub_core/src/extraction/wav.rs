//! WAV header reading.

use std::path::Path;

/// Duration of a WAV file in seconds, from its header.
///
/// Returns `None` for anything `hound` cannot open as WAV.
pub fn wav_duration_secs(path: &Path) -> Option<f64> {
    let reader = match hound::WavReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::debug!("Cannot read WAV header of {}: {}", path.display(), e);
            return None;
        }
    };

    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / sample_rate as f64)
}
