//! Data models for the subtitle generator.
//!
//! This module contains the core data structures shared by every stage:
//! - Enums for devices, precision, stages and policies
//! - Recognizer segments and formatted subtitles
//! - The capability descriptor
//! - Job snapshots and terminal outcomes

mod capability;
mod enums;
mod jobs;
mod segments;

// Re-export all public types
pub use capability::CapabilityDescriptor;
pub use enums::{ComputeTypePolicy, DeviceKind, OverflowPolicy, Precision, Stage};
pub use jobs::{FailureCategory, FailureKind, JobFailure, JobOutcome, JobSnapshot};
pub use segments::{RawSegment, Subtitle};
