//! Device/precision decision table.
//!
//! | probe       | policy  | result                                   |
//! |-------------|---------|------------------------------------------|
//! | GPU         | auto    | GPU, float16                             |
//! | GPU         | forced  | GPU, forced precision                    |
//! | no GPU      | auto    | CPU, int8 (float32 on macOS)             |
//! | no GPU      | float16 | CPU, platform default, reason recorded   |
//! | no GPU      | int8/32 | CPU, forced precision                    |

use crate::models::{CapabilityDescriptor, ComputeTypePolicy, Precision};

use super::probe::GpuProbeResult;

/// Operating system family, as far as precision support is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    /// Platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    /// Precision used on CPU when nothing is forced.
    ///
    /// int8 CPU execution crashes on macOS.
    pub fn cpu_default(&self) -> Precision {
        match self {
            Platform::MacOs => Precision::Float32,
            _ => Precision::Int8,
        }
    }
}

/// Resolve the capability descriptor. Pure; never fails.
pub fn resolve(
    probe: &GpuProbeResult,
    platform: Platform,
    policy: ComputeTypePolicy,
) -> CapabilityDescriptor {
    if let GpuProbeResult::Available { name } = probe {
        let precision = policy.forced().unwrap_or(Precision::Float16);
        return CapabilityDescriptor::gpu(name.clone(), precision);
    }

    let no_gpu = probe
        .unavailable_reason()
        .unwrap_or_else(|| "no GPU / detection failed".to_string());
    let cpu_default = platform.cpu_default();

    match policy.forced() {
        None if platform == Platform::MacOs => CapabilityDescriptor::cpu(
            cpu_default,
            Some(format!(
                "{}; int8 is unstable on macOS CPU, using {}",
                no_gpu, cpu_default
            )),
        ),
        None => CapabilityDescriptor::cpu(cpu_default, Some(no_gpu)),
        Some(Precision::Float16) => CapabilityDescriptor::cpu(
            cpu_default,
            Some(format!(
                "{}; float16 is not supported on CPU, using {}",
                no_gpu, cpu_default
            )),
        ),
        Some(forced) => CapabilityDescriptor::cpu(forced, Some(no_gpu)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceKind;

    fn gpu() -> GpuProbeResult {
        GpuProbeResult::Available {
            name: "NVIDIA GeForce RTX 3060".to_string(),
        }
    }

    fn none() -> GpuProbeResult {
        GpuProbeResult::Unavailable {
            reason: "no GPU / detection failed".to_string(),
        }
    }

    #[test]
    fn gpu_auto_uses_float16() {
        let cap = resolve(&gpu(), Platform::Linux, ComputeTypePolicy::Auto);
        assert_eq!(cap.device, DeviceKind::Gpu);
        assert_eq!(cap.precision, Precision::Float16);
        assert!(cap.fallback_reason.is_none());
        assert_eq!(cap.device_name.as_deref(), Some("NVIDIA GeForce RTX 3060"));
    }

    #[test]
    fn gpu_honours_forced_precision() {
        let cap = resolve(&gpu(), Platform::Windows, ComputeTypePolicy::Int8);
        assert_eq!(cap.device, DeviceKind::Gpu);
        assert_eq!(cap.precision, Precision::Int8);
    }

    #[test]
    fn cpu_auto_uses_int8() {
        let cap = resolve(&none(), Platform::Linux, ComputeTypePolicy::Auto);
        assert_eq!(cap.device, DeviceKind::Cpu);
        assert_eq!(cap.precision, Precision::Int8);
        assert!(cap.fallback_reason.unwrap().contains("no GPU"));
    }

    #[test]
    fn macos_cpu_uses_float32_with_reason() {
        let cap = resolve(&none(), Platform::MacOs, ComputeTypePolicy::Auto);
        assert_eq!(cap.precision, Precision::Float32);
        assert!(cap.fallback_reason.unwrap().contains("macOS"));
    }

    #[test]
    fn forced_float16_without_gpu_is_downgraded() {
        let linux = resolve(&none(), Platform::Linux, ComputeTypePolicy::Float16);
        assert_eq!(linux.device, DeviceKind::Cpu);
        assert_eq!(linux.precision, Precision::Int8);
        assert!(linux.fallback_reason.unwrap().contains("float16"));

        let mac = resolve(&none(), Platform::MacOs, ComputeTypePolicy::Float16);
        assert_eq!(mac.precision, Precision::Float32);
    }

    #[test]
    fn hidden_gpu_falls_back_to_cpu() {
        let cap = resolve(&GpuProbeResult::Hidden, Platform::Linux, ComputeTypePolicy::Auto);
        assert_eq!(cap.device, DeviceKind::Cpu);
        assert!(cap.fallback_reason.unwrap().contains("CUDA_VISIBLE_DEVICES"));
    }

    #[test]
    fn forced_cpu_precision_is_kept() {
        let cap = resolve(&none(), Platform::MacOs, ComputeTypePolicy::Int8);
        assert_eq!(cap.precision, Precision::Int8);
    }
}
