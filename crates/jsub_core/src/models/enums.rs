//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Kind of compute device used for recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Gpu,
    Cpu,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Gpu => write!(f, "GPU"),
            DeviceKind::Cpu => write!(f, "CPU"),
        }
    }
}

/// Numeric precision the recognizer runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Float16,
    Int8,
    Float32,
}

impl Precision {
    /// Name as used by model files and the config surface.
    pub fn name(&self) -> &'static str {
        match self {
            Precision::Float16 => "float16",
            Precision::Int8 => "int8",
            Precision::Float32 => "float32",
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Operator override for the compute type.
///
/// `Auto` leaves the decision to the hardware profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeTypePolicy {
    #[default]
    Auto,
    Float16,
    Int8,
    Float32,
}

impl ComputeTypePolicy {
    /// The forced precision, if any.
    pub fn forced(&self) -> Option<Precision> {
        match self {
            ComputeTypePolicy::Auto => None,
            ComputeTypePolicy::Float16 => Some(Precision::Float16),
            ComputeTypePolicy::Int8 => Some(Precision::Int8),
            ComputeTypePolicy::Float32 => Some(Precision::Float32),
        }
    }
}

impl std::str::FromStr for ComputeTypePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "float16" | "fp16" => Ok(Self::Float16),
            "int8" => Ok(Self::Int8),
            "float32" | "fp32" => Ok(Self::Float32),
            other => Err(format!(
                "unknown compute type '{}' (expected auto, float16, int8 or float32)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ComputeTypePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.forced() {
            Some(p) => f.write_str(p.name()),
            None => f.write_str("auto"),
        }
    }
}

/// What to do with text that does not fit into one subtitle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Continue the overflow in additional subtitles (no data loss).
    #[default]
    Split,
    /// Cut the text at capacity and end it with an ellipsis.
    Truncate,
}

/// Stage of a pipeline job.
///
/// ```text
/// Idle -> Extracting -> Transcribing -> Formatting -> Writing -> Done
///              \______________\_____________\____________\-> Failed
///  (any non-terminal) -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Idle,
    Extracting,
    Transcribing,
    Formatting,
    Writing,
    Done,
    Failed,
    Cancelled,
}

impl Stage {
    /// Whether the job has reached an end state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed | Stage::Cancelled)
    }

    /// Whether this is one of the four working stages.
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            Stage::Extracting | Stage::Transcribing | Stage::Formatting | Stage::Writing
        )
    }

    /// Display name for logs and progress output.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Idle => "Idle",
            Stage::Extracting => "Extracting",
            Stage::Transcribing => "Transcribing",
            Stage::Formatting => "Formatting",
            Stage::Writing => "Writing",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
            Stage::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_type_parses_aliases() {
        assert_eq!("fp16".parse::<ComputeTypePolicy>(), Ok(ComputeTypePolicy::Float16));
        assert_eq!("AUTO".parse::<ComputeTypePolicy>(), Ok(ComputeTypePolicy::Auto));
        assert!("bf16".parse::<ComputeTypePolicy>().is_err());
    }

    #[test]
    fn terminal_stages() {
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Cancelled.is_terminal());
        assert!(!Stage::Writing.is_terminal());
        assert!(!Stage::Idle.is_working());
    }

    #[test]
    fn precision_serializes_lowercase() {
        let json = serde_json::to_string(&Precision::Float16).unwrap();
        assert_eq!(json, "\"float16\"");
    }
}
