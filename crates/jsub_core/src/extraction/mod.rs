//! Audio extraction adapter.
//!
//! Turns the input video into the mono 16 kHz WAV the recognizer consumes.
//! The default [`FfmpegExtractor`] shells out to `ffprobe` and `ffmpeg`;
//! tests substitute their own [`AudioExtractor`].
//!
//! ```no_run
//! use std::path::Path;
//! use jsub_core::extraction::{AudioExtractor, FfmpegExtractor};
//! use jsub_core::io::CancelToken;
//!
//! let wav = FfmpegExtractor::default()
//!     .extract(
//!         Path::new("movie.mkv"),
//!         Path::new("/tmp/job"),
//!         &CancelToken::new(),
//!         &|line| eprintln!("{line}"),
//!     )
//!     .unwrap();
//! ```

mod ffmpeg;
mod types;
mod wav;

pub use ffmpeg::FfmpegExtractor;
pub use types::{
    AudioExtractor, ExtractionError, ExtractionResult, AUDIO_FILE_NAME, TARGET_SAMPLE_RATE,
};
pub use wav::wav_duration_secs;
