//! Subtitle parsers.

mod srt;

pub use srt::{parse_srt, parse_srt_time};
