//! Subtitle writers.
//!
//! Rendering is a pure function; writing to disk is atomic.

mod srt;

pub use srt::{format_srt_time, render_srt, write_srt_file};
