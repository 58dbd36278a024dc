//! Pipeline step implementations.
//!
//! One step per working stage of a subtitle job.

mod extract;
mod format;
mod transcribe;
mod write;

pub use extract::ExtractStep;
pub use format::FormatStep;
pub use transcribe::TranscribeStep;
pub use write::WriteStep;
