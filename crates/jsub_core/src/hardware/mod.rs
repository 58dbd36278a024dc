//! Hardware profiler.
//!
//! Decides which device and numeric precision the recognizer runs with.
//! Probing is impure and lives behind [`GpuProbe`]; the decision itself is
//! the pure [`resolve`] table. Detection never fails: the worst case is a
//! CPU/float32 descriptor with the reason recorded.

mod policy;
mod probe;

use std::sync::OnceLock;

pub use policy::{resolve, Platform};
pub use probe::{gpu_hidden, parse_gpu_name, GpuProbe, GpuProbeResult, NvidiaSmiProbe};

use crate::models::{CapabilityDescriptor, ComputeTypePolicy};

/// Probe and resolve for the current platform.
pub fn detect(probe: &dyn GpuProbe, policy: ComputeTypePolicy) -> CapabilityDescriptor {
    let result = probe.probe();
    let capability = resolve(&result, Platform::current(), policy);

    match capability.fallback_reason {
        Some(ref reason) => tracing::warn!("{} - {}", capability.label(), reason),
        None => tracing::info!("{}", capability.label()),
    }

    capability
}

static DETECTED: OnceLock<CapabilityDescriptor> = OnceLock::new();

/// Detect once per process and reuse the result.
///
/// The first caller's probe and policy win; later calls return the cached
/// descriptor unchanged.
pub fn detect_once(probe: &dyn GpuProbe, policy: ComputeTypePolicy) -> CapabilityDescriptor {
    DETECTED.get_or_init(|| detect(probe, policy)).clone()
}
