//! jsub core - backend logic for the Japanese subtitle generator.
//!
//! This crate contains the whole video-to-SRT pipeline with zero UI
//! dependencies: hardware profiling, audio extraction, speech recognition
//! adapters, the Japanese-aware segment formatter, the SRT writer and the
//! job orchestrator. It can be driven by the CLI or any other shell.

pub mod config;
pub mod extraction;
pub mod hardware;
pub mod io;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod recognition;
pub mod subtitles;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
