//! Resolved hardware/precision decision for a run.

use serde::{Deserialize, Serialize};

use super::enums::{DeviceKind, Precision};

/// Capability descriptor produced by the hardware profiler.
///
/// Computed once per process and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Device the recognizer runs on.
    pub device: DeviceKind,
    /// Numeric precision.
    pub precision: Precision,
    /// Why the preferred configuration was not used, if it was not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Human-readable device name (GPU model, or "CPU").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl CapabilityDescriptor {
    pub fn gpu(name: impl Into<String>, precision: Precision) -> Self {
        Self {
            device: DeviceKind::Gpu,
            precision,
            fallback_reason: None,
            device_name: Some(name.into()),
        }
    }

    pub fn cpu(precision: Precision, fallback_reason: Option<String>) -> Self {
        Self {
            device: DeviceKind::Cpu,
            precision,
            fallback_reason,
            device_name: Some("CPU".to_string()),
        }
    }

    /// Descriptor used for the single retry after a recoverable failure.
    pub fn cpu_retry(reason: impl Into<String>) -> Self {
        Self::cpu(Precision::Float32, Some(reason.into()))
    }

    pub fn is_gpu(&self) -> bool {
        self.device == DeviceKind::Gpu
    }

    /// Label in the form `Device: <name> (<precision>)`.
    pub fn label(&self) -> String {
        let name = self
            .device_name
            .clone()
            .unwrap_or_else(|| self.device.to_string());
        format!("Device: {} ({})", name, self.precision)
    }
}

impl Default for CapabilityDescriptor {
    fn default() -> Self {
        Self::cpu(
            Precision::Float32,
            Some("no GPU / detection failed".to_string()),
        )
    }
}
