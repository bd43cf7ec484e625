//! Conversion of a `NodeSnapshot` into the allocatable inventory.

use crate::builder::{GpuDeviceInfo, NodeSnapshot};
use gpuplane_model::attrs::{
    ATTR_CC_MAJOR, ATTR_CC_MINOR, ATTR_DRIVER_VERSION, ATTR_GPU_UUID, ATTR_MIG_PROFILE,
    ATTR_PCI_ADDRESS, ATTR_VENDOR,
};
use gpuplane_model::{
    new_gpu_device, new_mig_device, sanitize_dns_label, AttributeMap, Capacity, CapacityUnit,
    CounterValue, InventorySnapshot,
};
use std::collections::BTreeMap;

/// Build the per-node inventory: one allocation unit per physical GPU plus
/// one per instantiable MIG slice.
pub fn build_inventory_snapshot(
    pool: &str,
    node_uid: &str,
    node_name: &str,
    snapshot: &NodeSnapshot,
) -> InventorySnapshot {
    let mut inventory = InventorySnapshot::empty(node_name, node_uid);
    for device in &snapshot.devices {
        let gpu_name = sanitize_dns_label(&format!("gpu-{}", device.index));
        let mut gpu = new_gpu_device(pool, &gpu_name, &device.uuid, gpu_attributes(device, snapshot));
        if device.memory_mib > 0 {
            gpu.capacity.insert(
                "memory".to_string(),
                Capacity::new(device.memory_mib as i64, CapacityUnit::Mi),
            );
        }
        inventory.inventory.push(gpu);

        if snapshot.defaults.mig_capable && !device.pci_address.is_empty() {
            push_mig_slices(pool, &gpu_name, device, snapshot, &mut inventory);
        }
    }
    inventory
}

fn gpu_attributes(device: &GpuDeviceInfo, snapshot: &NodeSnapshot) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.set(ATTR_VENDOR, device.vendor.as_str());
    if !device.uuid.is_empty() {
        attrs.set(ATTR_GPU_UUID, device.uuid.as_str());
    }
    if !device.pci_address.is_empty() {
        attrs.set(ATTR_PCI_ADDRESS, device.pci_address.as_str());
    }
    if !snapshot.driver.version.is_empty() {
        attrs.set(
            ATTR_DRIVER_VERSION,
            gpuplane_model::AttributeValue::Version(snapshot.driver.version.clone()),
        );
    }
    if let Ok(n) = device.cc_major.parse::<i64>() {
        attrs.set(ATTR_CC_MAJOR, n);
    }
    if let Ok(n) = device.cc_minor.parse::<i64>() {
        attrs.set(ATTR_CC_MINOR, n);
    }
    attrs
}

fn push_mig_slices(
    pool: &str,
    gpu_name: &str,
    device: &GpuDeviceInfo,
    snapshot: &NodeSnapshot,
    inventory: &mut InventorySnapshot,
) {
    for (profile, capacity) in &snapshot.defaults.mig_profiles {
        let Some((slices, memory_mib)) = parse_mig_profile(profile) else {
            continue;
        };
        for i in 0..capacity.count {
            let name = sanitize_dns_label(&format!("{gpu_name}-mig-{profile}-{i}"));
            let mut counters = BTreeMap::new();
            counters.insert(
                "memory".to_string(),
                CounterValue {
                    value: memory_mib,
                    unit: CapacityUnit::Mi,
                },
            );
            counters.insert(
                "slices".to_string(),
                CounterValue {
                    value: slices,
                    unit: CapacityUnit::Percent,
                },
            );
            let mut attrs = AttributeMap::new();
            attrs.set(ATTR_VENDOR, device.vendor.as_str());
            attrs.set(ATTR_MIG_PROFILE, profile.as_str());
            attrs.set(ATTR_PCI_ADDRESS, device.pci_address.as_str());
            let mig = new_mig_device(pool, &name, "", &device.pci_address, counters, attrs);
            inventory.inventory.push(mig);
        }
    }
}

/// Roll the snapshot up into the node-scoped status object.
pub fn build_node_state(
    node_name: &str,
    snapshot: &NodeSnapshot,
    inventory: &InventorySnapshot,
    now_secs: u64,
) -> gpuplane_api::NodeState {
    use gpuplane_api::labels::CONDITION_READY;
    use gpuplane_api::meta::set_condition;
    use gpuplane_api::{Condition, ConditionStatus, NodeState, ObjectMeta};

    let mut state = NodeState {
        metadata: ObjectMeta::named(node_name),
        ..Default::default()
    };
    state.status.managed = snapshot.managed;
    state.status.driver_version = snapshot.driver.version.clone();
    state.status.devices = inventory
        .inventory
        .iter()
        .map(|d| d.canonical_name.clone())
        .collect();
    let cond = if snapshot.feature_detected && !inventory.inventory.is_empty() {
        Condition::new(CONDITION_READY, ConditionStatus::True).with_reason("InventoryPublished", "")
    } else {
        Condition::new(CONDITION_READY, ConditionStatus::False)
            .with_reason("NoDevices", "no supported devices discovered")
    };
    set_condition(&mut state.status.conditions, cond, now_secs);
    state
}

/// Parse `<n>g.<m>gb` into `(slices, memory MiB)`.
fn parse_mig_profile(profile: &str) -> Option<(i64, i64)> {
    let (slices_part, memory_part) = profile.split_once('.')?;
    let slices: i64 = slices_part.strip_suffix('g')?.parse().ok()?;
    let memory_gb: i64 = memory_part.strip_suffix("gb")?.parse().ok()?;
    Some((slices, memory_gb * 1024))
}
