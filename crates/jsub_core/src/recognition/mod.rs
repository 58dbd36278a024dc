//! Speech recognition adapter.
//!
//! The recognizer itself is an external collaborator; this module defines
//! the [`Recognizer`] seam, the decoding parameters, the error taxonomy
//! (with the recoverable GPU out-of-memory case) and the default
//! [`WhisperCliRecognizer`].

mod types;
mod whisper_cli;

pub use types::{
    DecodeParams, ModelSet, RecognitionError, RecognitionErrorKind, RecognitionRequest,
    RecognitionResult, Recognizer, VadParams,
};
pub use whisper_cli::{classify_failure, parse_progress, parse_transcript_json, WhisperCliRecognizer};
