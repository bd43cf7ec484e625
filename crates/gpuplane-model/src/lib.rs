#![warn(missing_docs)]

//! gpuplane allocatable domain model: device value types, prepare
//! requests/results, device configuration and the durable checkpoint records.

pub mod attrs;
pub mod checkpoint;
pub mod device;
pub mod prepare;
pub mod sanitize;
pub mod snapshot;

pub use attrs::{AttributeMap, AttributeValue};
pub use checkpoint::{
    ClaimState, PrepareCheckpoint, PreparedClaim, PreparedDeviceState, PreparedMigState,
    PreparedMpsState, PreparedSharing, PreparedVfioState, CHECKPOINT_SCHEMA_VERSION,
};
pub use device::{
    new_gpu_device, new_mig_device, pgpu_counter_set, Capacity, CapacityPolicy, CapacityUnit,
    CounterConsumption, CounterValue, Device, DeviceType,
};
pub use prepare::{
    DeviceConfig, GpuConfig, MigDeviceConfig, MpsConfig, PrepareDevice, PrepareRequest,
    PrepareResult, PreparedDeviceResult, SharingConfig, SharingStrategy, TimeSliceInterval,
    TimeSlicingConfig, UnprepareRequest, VfioDeviceConfig,
};
pub use sanitize::sanitize_dns_label;
pub use snapshot::InventorySnapshot;
