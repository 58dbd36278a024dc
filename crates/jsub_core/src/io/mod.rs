//! Subprocess and cancellation plumbing shared by the adapters.

mod cancel;
mod runner;

pub use cancel::CancelToken;
pub use runner::{format_command, CommandOutput, CommandRunner, RunError};
