//! Per-node inventory snapshot published to the scheduler.

use crate::device::Device;
use serde::{Deserialize, Serialize};

/// Normalized device inventory of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventorySnapshot {
    /// Node the inventory was discovered on.
    pub node_name: String,
    /// UID of that node object.
    pub node_uid: String,
    /// Allocation units, in discovery order.
    pub inventory: Vec<Device>,
}

impl InventorySnapshot {
    /// Snapshot with no devices.
    pub fn empty(node_name: &str, node_uid: &str) -> Self {
        Self {
            node_name: node_name.to_string(),
            node_uid: node_uid.to_string(),
            inventory: Vec::new(),
        }
    }

    /// Device lookup by canonical name.
    pub fn device(&self, canonical_name: &str) -> Option<&Device> {
        self.inventory.iter().find(|d| d.canonical_name == canonical_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeMap;
    use crate::device::new_gpu_device;

    #[test]
    fn test_device_lookup() {
        let mut snap = InventorySnapshot::empty("n1", "uid-1");
        snap.inventory.push(new_gpu_device("p", "gpu-0", "GPU-x", AttributeMap::new()));
        assert!(snap.device("gpu-0").is_some());
        assert!(snap.device("gpu-1").is_none());
    }
}
