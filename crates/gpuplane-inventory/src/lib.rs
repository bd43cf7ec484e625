//! gpuplane inventory: turns raw node/label/feature snapshots into a
//! normalized per-node device inventory.

pub mod approval;
pub mod builder;
pub mod defaults;
pub mod labels;
pub mod memory;
pub mod snapshot;

pub use approval::auto_attach;
pub use builder::{build_node_snapshot, DriverInfo, GpuDeviceInfo, NodeSnapshot};
pub use defaults::{MigProfileMetric, NodeHardwareDefaults};
pub use memory::parse_memory_mib;
pub use snapshot::{build_inventory_snapshot, build_node_state};
