//! Device publisher: materializes per-node inventory snapshots as `Device`
//! objects.
//!
//! The node agents publish an `InventorySnapshot` per node; this turns each
//! allocation unit into (or updates) a cluster-visible `Device`, removes
//! devices that vanished from their node, and feeds the resulting events
//! through the watch relay.

use crate::cache::ClusterCache;
use crate::controller::WatchRelay;
use gpuplane_api::{Device, DeviceState, MigInfo, ObjectMeta};
use gpuplane_model::attrs::{ATTR_MIG_PROFILE, ATTR_MIG_UUID, ATTR_PCI_ADDRESS};
use gpuplane_model::{DeviceType, InventorySnapshot};
use gpuplane_config::{DeviceApproval, ModuleConfig};
use gpuplane_inventory::auto_attach;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Publishes inventory snapshots into the cluster cache.
pub struct DevicePublisher {
    cache: Arc<ClusterCache>,
    relay: Arc<WatchRelay>,
}

impl DevicePublisher {
    pub fn new(cache: Arc<ClusterCache>, relay: Arc<WatchRelay>) -> Self {
        Self { cache, relay }
    }

    /// Cluster-wide name of one allocation unit: `<node>-<canonical-name>`.
    pub fn device_object_name(node_name: &str, canonical_name: &str) -> String {
        gpuplane_model::sanitize_dns_label(&format!("{node_name}-{canonical_name}"))
    }

    /// Upsert every device of the snapshot and delete the node's devices
    /// that are no longer discovered. `managed` comes from the node snapshot
    /// the inventory was built from.
    pub async fn publish(&self, snapshot: &InventorySnapshot, managed: bool, config: &ModuleConfig) {
        let mut published: BTreeSet<String> = BTreeSet::new();
        for unit in &snapshot.inventory {
            let name = Self::device_object_name(&snapshot.node_name, &unit.canonical_name);
            published.insert(name.clone());
            let device = self.device_from_unit(&name, snapshot, unit, managed, &config.device_approval);
            let event = self.cache.upsert_device(device);
            self.relay.on_device_event(&event).await;
        }

        let stale: Vec<String> = self
            .cache
            .devices
            .iter()
            .filter(|d| d.status.node_name == snapshot.node_name)
            .map(|d| d.metadata.name.clone())
            .filter(|name| !published.contains(name))
            .collect();
        for name in stale {
            info!(device = %name, node = %snapshot.node_name, "device vanished from inventory");
            if let Some(event) = self.cache.delete_device(&name) {
                self.relay.on_device_event(&event).await;
            }
        }
        debug!(
            node = %snapshot.node_name,
            devices = snapshot.inventory.len(),
            "inventory published"
        );
    }

    fn device_from_unit(
        &self,
        name: &str,
        snapshot: &InventorySnapshot,
        unit: &gpuplane_model::Device,
        managed: bool,
        approval: &DeviceApproval,
    ) -> Device {
        // Keep the stored pool reference and annotations across republishes;
        // the pool controller owns them.
        let mut device = self
            .cache
            .devices
            .get(name)
            .map(|d| d.clone())
            .unwrap_or_else(|| Device {
                metadata: ObjectMeta::named(name),
                ..Default::default()
            });

        device.status.node_name = snapshot.node_name.clone();
        device.status.hardware.uuid = unit.uuid.clone();
        device.status.hardware.pci_address = unit.attribute(ATTR_PCI_ADDRESS);
        device.status.hardware.memory_mib = unit
            .capacity
            .get("memory")
            .map(|c| c.value as u64)
            .unwrap_or(0);
        device.status.hardware.mig = if unit.device_type == DeviceType::Mig {
            Some(MigInfo {
                profile: unit.attribute(ATTR_MIG_PROFILE),
                uuid: unit.attribute(ATTR_MIG_UUID),
            })
        } else {
            None
        };
        device.status.state = if auto_attach(approval, managed, &device.metadata.labels) {
            DeviceState::Ready
        } else if device.status.state == DeviceState::Ready {
            // An operator approved it earlier; approval is sticky.
            DeviceState::Ready
        } else {
            DeviceState::Pending
        };
        device
    }
}
