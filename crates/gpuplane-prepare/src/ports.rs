//! Port interfaces to the external collaborators of the pipeline.
//!
//! Every port is expected to be idempotent given identical inputs; the
//! pipeline guarantees it never calls a port for work the checkpoint already
//! records.

use crate::error::{CheckpointError, HardwareError};
use async_trait::async_trait;
use gpuplane_model::{
    MpsConfig, PrepareCheckpoint, PrepareRequest, PreparedMigState, PreparedVfioState,
    TimeSliceInterval,
};
use std::collections::BTreeMap;

/// MIG creation request, assembled from device attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct MigPrepareRequest {
    /// Profile to instantiate, e.g. `1g.10gb`.
    pub profile: String,
    /// PCI address of the parent physical GPU.
    pub parent_pci_address: String,
    /// UUID of the parent physical GPU, when known.
    pub parent_uuid: String,
}

/// Outcome of a MIG creation.
#[derive(Debug, Clone, PartialEq)]
pub struct MigPrepareResponse {
    /// UUID of the instantiated MIG device.
    pub device_uuid: String,
}

/// Creates and destroys MIG instances.
#[async_trait]
pub trait MigManager: Send + Sync {
    async fn prepare(&self, request: MigPrepareRequest) -> Result<MigPrepareResponse, HardwareError>;
    async fn unprepare(&self, state: &PreparedMigState) -> Result<(), HardwareError>;
}

/// Rebinds physical GPUs to the pass-through driver and back.
#[async_trait]
pub trait VfioManager: Send + Sync {
    async fn prepare(&self, pci_address: &str) -> Result<(), HardwareError>;
    async fn unprepare(&self, state: &PreparedVfioState) -> Result<(), HardwareError>;
}

/// Start request for one MPS control daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct MpsStartRequest {
    /// Stable identifier of the daemon.
    pub control_id: String,
    /// Sorted, deduplicated UUIDs of the devices the daemon multiplexes.
    pub device_uuids: Vec<String>,
    /// Daemon parameters.
    pub config: MpsConfig,
}

/// Host directories of a running MPS daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct MpsRuntimeDirs {
    pub pipe_dir: String,
    pub shm_dir: String,
    pub log_dir: String,
}

/// Runs MPS control daemons.
#[async_trait]
pub trait MpsManager: Send + Sync {
    async fn start(&self, request: MpsStartRequest) -> Result<MpsRuntimeDirs, HardwareError>;
    async fn stop(&self, control_id: &str) -> Result<(), HardwareError>;
}

/// Applies time-slice scheduling to groups of physical GPUs.
#[async_trait]
pub trait TimeSlicingManager: Send + Sync {
    async fn set_time_slice(
        &self,
        device_uuids: &[String],
        interval: TimeSliceInterval,
    ) -> Result<(), HardwareError>;
}

/// Writes and deletes per-claim container-device-injection specs.
#[async_trait]
pub trait CdiWriter: Send + Sync {
    /// Returns the injection IDs assigned to each device, keyed by canonical
    /// device name.
    async fn write(&self, request: &PrepareRequest) -> Result<BTreeMap<String, Vec<String>>, HardwareError>;
    async fn delete(&self, claim_uid: &str) -> Result<(), HardwareError>;
}

/// Confirms no compute process is using a physical GPU.
#[async_trait]
pub trait GpuProcessChecker: Send + Sync {
    async fn ensure_gpu_free(&self, pci_address: &str) -> Result<(), HardwareError>;
}

/// Durable per-node claim preparation state.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<PrepareCheckpoint, CheckpointError>;
    async fn save(&self, checkpoint: &PrepareCheckpoint) -> Result<(), CheckpointError>;
}

/// Signals the inventory republisher that node resources changed.
pub trait ResourcesChangedNotifier: Send + Sync {
    fn notify(&self);
}
