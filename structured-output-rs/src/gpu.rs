//! GPU offload planning
//!
//! Picks how many model layers to offload from a rough VRAM estimate. Detection
//! only reads `vulkaninfo` output; it knows nothing about drivers.

use std::env;
use std::process::Stdio;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::process::Command;

/// VRAM assumed when detection fails
pub const DEFAULT_VRAM_MB: u64 = 4096;

/// Rough per-layer footprint of an 8B Q4 model
pub const DEFAULT_LAYER_SIZE_MB: u64 = 400;

/// Environment variable read by llama.cpp builds with several GPU backends
pub const BACKEND_ENV_VAR: &str = "LLAMA_CPP_BACKEND";

const VULKAN_BACKEND: &str = "GGML_VULKAN=1";

static DEVICE_LOCAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"deviceLocal\s*=\s*(\d+)").expect("static regex"));

/// Outcome of planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GpuPlan {
    pub vram_mb: u64,
    /// False when `vram_mb` is the fallback value
    pub detected: bool,
    pub layer_size_mb: u64,
    pub layers: u32,
}

/// Parse the first `deviceLocal = <bytes>` entry and convert it to MiB
pub fn parse_device_local_mb(vulkaninfo_output: &str) -> Option<u64> {
    DEVICE_LOCAL
        .captures(vulkaninfo_output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|bytes| bytes / (1024 * 1024))
}

/// Run `vulkaninfo` and read device-local memory. `None` on any failure.
pub async fn detect_vram_mb() -> Option<u64> {
    let output = Command::new("vulkaninfo")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            parse_device_local_mb(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            debug!("vulkaninfo exited with {}", output.status);
            None
        }
        Err(e) => {
            debug!("vulkaninfo unavailable: {}", e);
            None
        }
    }
}

/// `max(1, vram / layer_size)`, using the fallback VRAM when undetected.
/// A reading of 0 MiB counts as undetected.
pub fn plan_gpu_layers(vram_mb: Option<u64>, layer_size_mb: u64) -> GpuPlan {
    let vram_mb = vram_mb.filter(|&mb| mb > 0);
    let detected = vram_mb.is_some();
    let vram_mb = vram_mb.unwrap_or(DEFAULT_VRAM_MB);
    let layer_size_mb = layer_size_mb.max(1);
    let layers = (vram_mb / layer_size_mb).clamp(1, u32::MAX as u64) as u32;

    GpuPlan {
        vram_mb,
        detected,
        layer_size_mb,
        layers,
    }
}

/// Detect VRAM, then plan with the default layer size
pub async fn probe_gpu_plan() -> GpuPlan {
    let plan = plan_gpu_layers(detect_vram_mb().await, DEFAULT_LAYER_SIZE_MB);
    info!(
        "Usable VRAM: {} MB ({}), offloading {} layers",
        plan.vram_mb,
        if plan.detected { "detected" } else { "fallback" },
        plan.layers
    );
    plan
}

/// Force the Vulkan backend through the environment. Returns true if the
/// variable had to be changed.
pub fn ensure_vulkan_backend() -> bool {
    let current = env::var(BACKEND_ENV_VAR).unwrap_or_default();
    if current.contains(VULKAN_BACKEND) {
        return false;
    }
    env::set_var(BACKEND_ENV_VAR, VULKAN_BACKEND);
    info!("Vulkan backend enforced via {}", BACKEND_ENV_VAR);
    true
}
