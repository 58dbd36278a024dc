//! GPU runtime probing.

use std::process::{Command, Stdio};

/// Result of probing for a usable GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuProbeResult {
    /// A GPU runtime answered; carries the reported device name.
    Available { name: String },
    /// `CUDA_VISIBLE_DEVICES` hides every device.
    Hidden,
    /// No runtime found or the probe failed.
    Unavailable { reason: String },
}

impl GpuProbeResult {
    /// Why no GPU is used, for the descriptor's fallback reason.
    pub fn unavailable_reason(&self) -> Option<String> {
        match self {
            GpuProbeResult::Available { .. } => None,
            GpuProbeResult::Hidden => Some("GPU hidden by CUDA_VISIBLE_DEVICES".to_string()),
            GpuProbeResult::Unavailable { reason } => Some(reason.clone()),
        }
    }
}

/// Something that can tell whether a GPU runtime is present.
pub trait GpuProbe: Send + Sync {
    fn probe(&self) -> GpuProbeResult;
}

/// Probe using `nvidia-smi --query-gpu=name`.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    program: String,
}

impl NvidiaSmiProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl GpuProbe for NvidiaSmiProbe {
    fn probe(&self) -> GpuProbeResult {
        if gpu_hidden(std::env::var("CUDA_VISIBLE_DEVICES").ok().as_deref()) {
            return GpuProbeResult::Hidden;
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(["--query-gpu=name", "--format=csv,noheader"])
            .stdin(Stdio::null());

        tracing::debug!("Probing GPU: {:?}", cmd);

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                return GpuProbeResult::Unavailable {
                    reason: format!("no GPU / detection failed ({}: {})", self.program, e),
                }
            }
        };

        if !output.status.success() {
            return GpuProbeResult::Unavailable {
                reason: format!(
                    "no GPU / detection failed ({} exited with {:?})",
                    self.program,
                    output.status.code()
                ),
            };
        }

        parse_gpu_name(&String::from_utf8_lossy(&output.stdout))
            .map(|name| GpuProbeResult::Available { name })
            .unwrap_or_else(|| GpuProbeResult::Unavailable {
                reason: "no GPU / detection failed (no devices listed)".to_string(),
            })
    }
}

/// Whether a `CUDA_VISIBLE_DEVICES` value hides every device.
pub fn gpu_hidden(value: Option<&str>) -> bool {
    match value {
        Some(v) => {
            let v = v.trim();
            v.is_empty() || v == "-1"
        }
        None => false,
    }
}

/// First device name from `csv,noheader` output.
pub fn parse_gpu_name(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuda_visible_devices_handling() {
        assert!(!gpu_hidden(None));
        assert!(gpu_hidden(Some("")));
        assert!(gpu_hidden(Some("-1")));
        assert!(!gpu_hidden(Some("0")));
        assert!(!gpu_hidden(Some("0,1")));
    }

    #[test]
    fn parses_first_gpu_name() {
        let out = "\nNVIDIA GeForce RTX 4090\nNVIDIA GeForce RTX 3060\n";
        assert_eq!(parse_gpu_name(out).as_deref(), Some("NVIDIA GeForce RTX 4090"));
        assert_eq!(parse_gpu_name("  \n"), None);
    }

    #[test]
    fn missing_probe_program_is_unavailable() {
        let probe = NvidiaSmiProbe::new("jsub-no-such-nvidia-smi");
        match probe.probe() {
            GpuProbeResult::Unavailable { reason } => assert!(reason.contains("no GPU")),
            // CI machines may hide devices through the environment
            GpuProbeResult::Hidden => {}
            other => panic!("unexpected probe result: {:?}", other),
        }
    }
}
