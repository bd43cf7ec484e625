//! Label vocabulary of the inventory builder.

use std::collections::BTreeMap;

/// PCI vendor id of the only supported vendor.
pub const SUPPORTED_VENDOR: &str = "10de";

/// Instance-set name the node-feature source uses for GPUs.
pub const GPU_INSTANCE_SET: &str = "nvidia.com/gpu";

/// Node-level hardware default labels.
pub const LABEL_DRIVER_VERSION: &str = "nvidia.com/gpu.driver-version";
pub const LABEL_CUDA_RUNTIME: &str = "nvidia.com/cuda.runtime-version";
pub const LABEL_MIG_CAPABLE: &str = "nvidia.com/mig.capable";
pub const LABEL_MIG_STRATEGY: &str = "nvidia.com/mig.strategy";
pub const LABEL_NUMA: &str = "nvidia.com/gpu.numa";
pub const LABEL_POWER_LIMIT: &str = "nvidia.com/gpu.power-limit";
pub const LABEL_SM_COUNT: &str = "nvidia.com/gpu.sm-count";
pub const LABEL_BOARD: &str = "nvidia.com/gpu.board";
pub const LABEL_FAMILY: &str = "nvidia.com/gpu.family";
pub const LABEL_SERIAL: &str = "nvidia.com/gpu.serial";
pub const LABEL_PSTATE: &str = "nvidia.com/gpu.pstate";
pub const LABEL_DISPLAY: &str = "nvidia.com/gpu.display";

/// Prefix of the MIG profile labels: `nvidia.com/mig-<name>.<metric>`.
pub const MIG_PROFILE_LABEL_PREFIX: &str = "nvidia.com/mig-";

/// Merge node and node-feature labels: node labels win, feature labels only
/// fill gaps.
pub fn merge_labels(
    node_labels: &BTreeMap<String, String>,
    feature_labels: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = feature_labels.clone();
    for (k, v) in node_labels {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Canonical form of a device index: trimmed, and reparsed as a decimal
/// integer when possible (dropping leading zeros); otherwise preserved.
pub fn canonical_index(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(n) => n.to_string(),
        Err(_) => trimmed.to_string(),
    }
}
