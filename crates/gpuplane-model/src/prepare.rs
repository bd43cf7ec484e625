//! Prepare/unprepare requests, per-device configuration and results.

use crate::attrs::AttributeMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sharing strategy selected by a device configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SharingStrategy {
    /// Kernel-level time multiplexing.
    TimeSlicing,
    /// MPS control-daemon multiplexing.
    Mps,
    /// Exclusive consumption.
    None,
}

/// Scheduler time-slice length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSliceInterval {
    /// Driver default; also the reset value applied on unprepare.
    #[default]
    Default,
    /// Shortest supported slice.
    Short,
    /// Medium slice.
    Medium,
    /// Longest supported slice.
    Long,
}

/// Time-slicing parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSlicingConfig {
    /// Slice length shared by every device in the group; required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<TimeSliceInterval>,
}

/// MPS daemon parameters. Devices with byte-identical configs share one
/// control daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MpsConfig {
    /// `CUDA_MPS_ACTIVE_THREAD_PERCENTAGE` for clients of this daemon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_active_thread_percentage: Option<i64>,
    /// Per-device pinned memory limits, device index to MiB.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub default_pinned_device_memory_limits: BTreeMap<String, i64>,
}

/// Sharing block of a device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingConfig {
    /// Selected strategy.
    pub strategy: SharingStrategy,
    /// Parameters when `strategy` is `TimeSlicing`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slicing: Option<TimeSlicingConfig>,
    /// Parameters when `strategy` is `Mps`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mps: Option<MpsConfig>,
}

/// Configuration for a whole physical GPU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpuConfig {
    /// Optional sharing block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharing: Option<SharingConfig>,
}

/// Configuration for a MIG slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigDeviceConfig {
    /// MIG profile to instantiate (e.g. `1g.10gb`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub profile: String,
    /// Optional sharing block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharing: Option<SharingConfig>,
}

/// Configuration for VFIO pass-through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VfioDeviceConfig {}

/// Tagged per-device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeviceConfig {
    /// Whole-GPU consumption.
    Gpu(GpuConfig),
    /// MIG slice.
    MigDevice(MigDeviceConfig),
    /// VFIO pass-through.
    VfioDevice(VfioDeviceConfig),
}

impl DeviceConfig {
    /// The sharing strategy this configuration selects; a pure function of
    /// the variant.
    pub fn sharing_strategy(&self) -> SharingStrategy {
        match self.sharing() {
            Some(sharing) => sharing.strategy,
            None => SharingStrategy::None,
        }
    }

    /// The sharing block, if the variant carries one.
    pub fn sharing(&self) -> Option<&SharingConfig> {
        match self {
            DeviceConfig::Gpu(c) => c.sharing.as_ref(),
            DeviceConfig::MigDevice(c) => c.sharing.as_ref(),
            DeviceConfig::VfioDevice(_) => None,
        }
    }
}

/// One device of a prepare request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareDevice {
    /// Name of the request line this device satisfies.
    pub request: String,
    /// Pool the device was allocated from.
    pub pool: String,
    /// Canonical device name within the pool.
    pub device: String,
    /// Share identifier for multi-allocation devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    /// Capacity the claim consumes, by capacity name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumed_capacity: BTreeMap<String, i64>,
    /// Device attributes at allocation time.
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
    /// Per-device configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DeviceConfig>,
}

/// Request to prepare a claim's devices on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    /// UID of the resource claim.
    pub claim_uid: String,
    /// Node the devices live on.
    pub node_name: String,
    /// Whether the claim asks for VFIO pass-through.
    #[serde(default)]
    pub vfio: bool,
    /// Devices to prepare.
    pub devices: Vec<PrepareDevice>,
}

/// Symmetric unprepare request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnprepareRequest {
    /// UID of the resource claim to tear down.
    pub claim_uid: String,
}

/// Per-device slice of a prepare result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedDeviceResult {
    /// Request line the device satisfies.
    pub request: String,
    /// Pool the device came from.
    pub pool: String,
    /// Canonical device name.
    pub device: String,
    /// Container-device-injection IDs assigned by the CDI writer.
    pub cdi_device_ids: Vec<String>,
}

/// Outcome of a successful prepare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResult {
    /// UID of the prepared claim.
    pub claim_uid: String,
    /// One entry per prepared device.
    pub devices: Vec<PreparedDeviceResult>,
}
