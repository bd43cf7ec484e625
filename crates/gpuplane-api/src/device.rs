//! The `Device` and `NodeState` custom resources.

use crate::meta::{Condition, ObjectMeta};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a discovered device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    #[default]
    Pending,
    Ready,
    Unavailable,
}

/// Reference from a device to the pool that claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRef {
    pub name: String,
    /// `None` for cluster pools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// MIG placement recorded on a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub profile: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
}

/// Hardware identity of a device as discovered on its node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceHardware {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pci_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub product: String,
    pub memory_mib: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mig: Option<MigInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceStatus {
    pub state: DeviceState,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    pub hardware: DeviceHardware,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_ref: Option<PoolRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// A discovered accelerator, one object per allocation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub metadata: ObjectMeta,
    pub status: DeviceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStateStatus {
    pub managed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub driver_version: String,
    /// Canonical names of the devices discovered on this node.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Per-node rollup: discovered inventory plus conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeState {
    pub metadata: ObjectMeta,
    pub status: NodeStateStatus,
}
