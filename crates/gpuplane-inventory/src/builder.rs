//! The node snapshot builder: merged labels in, normalized device list out.

use crate::defaults::NodeHardwareDefaults;
use crate::labels::{canonical_index, merge_labels, GPU_INSTANCE_SET, SUPPORTED_VENDOR};
use crate::memory::parse_memory_mib;
use gpuplane_api::labels::DEVICE_LABEL_PREFIX;
use gpuplane_api::{Node, NodeFeature, NodeFeatureInstance};
use gpuplane_config::ModuleConfig;
use std::collections::BTreeMap;
use tracing::debug;

/// Driver stack discovered on a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverInfo {
    pub version: String,
    pub cuda_runtime: String,
}

/// One discovered GPU, before conversion into an allocation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuDeviceInfo {
    /// Canonical device index (decimal-normalized when numeric).
    pub index: String,
    /// PCI vendor id.
    pub vendor: String,
    /// PCI device id.
    pub device: String,
    /// PCI class.
    pub class: String,
    pub product: String,
    pub memory_mib: u64,
    pub uuid: String,
    pub cc_major: String,
    pub cc_minor: String,
    pub pci_address: String,
    pub numa: String,
    pub power_limit: String,
    pub family: String,
    pub pstate: String,
    pub display: String,
    /// Lowercased, deduplicated, ascending.
    pub precisions: Vec<String>,
}

/// Everything the builder learned about one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSnapshot {
    pub managed: bool,
    pub feature_detected: bool,
    pub driver: DriverInfo,
    pub devices: Vec<GpuDeviceInfo>,
    /// Merged node + feature labels; node labels win.
    pub labels: BTreeMap<String, String>,
    /// Node hardware defaults the devices were enriched from.
    pub defaults: NodeHardwareDefaults,
}

/// Build a `NodeSnapshot` from a node, its optional feature object and the
/// module config.
pub fn build_node_snapshot(
    node: &Node,
    feature: Option<&NodeFeature>,
    config: &ModuleConfig,
) -> NodeSnapshot {
    let empty = BTreeMap::new();
    let feature_labels = feature.map(|f| &f.spec.labels).unwrap_or(&empty);
    let labels = merge_labels(&node.metadata.labels, feature_labels);

    let defaults = NodeHardwareDefaults::from_labels(&labels);
    let mut devices = extract_label_devices(&labels);

    if let Some(feature) = feature {
        if let Some(instances) = feature.spec.instances.get(GPU_INSTANCE_SET) {
            enrich_from_instances(&mut devices, instances);
        }
    }

    devices.retain(|_, d| {
        let keep = d.vendor == SUPPORTED_VENDOR
            && !d.vendor.is_empty()
            && !d.device.is_empty()
            && !d.class.is_empty();
        if !keep {
            debug!(index = %d.index, vendor = %d.vendor, "discarding unsupported device");
        }
        keep
    });

    let mut devices: Vec<GpuDeviceInfo> = devices.into_values().collect();
    for device in &mut devices {
        enrich_from_defaults(device, &defaults);
        normalize_precisions(&mut device.precisions);
    }
    // Operator-visible ordering matches label key ordering, so the sort is
    // lexicographic even for numeric indexes.
    devices.sort_by(|a, b| a.index.cmp(&b.index));

    NodeSnapshot {
        managed: resolve_managed(node, config),
        feature_detected: feature.is_some(),
        driver: DriverInfo {
            version: defaults.driver_version.clone(),
            cuda_runtime: defaults.cuda_runtime.clone(),
        },
        devices,
        labels,
        defaults,
    }
}

/// Managed decision: an explicit node label wins (anything but a
/// case-insensitive `false` enables), otherwise the policy default.
fn resolve_managed(node: &Node, config: &ModuleConfig) -> bool {
    match node.metadata.labels.get(&config.managed_nodes.label_key) {
        Some(value) => !value.trim().eq_ignore_ascii_case("false"),
        None => config.managed_nodes.enabled_by_default,
    }
}

/// Collect `<deviceLabelPrefix><index>.<field>` subrecords.
fn extract_label_devices(labels: &BTreeMap<String, String>) -> BTreeMap<String, GpuDeviceInfo> {
    let mut devices: BTreeMap<String, GpuDeviceInfo> = BTreeMap::new();
    for (key, value) in labels {
        let Some(rest) = key.strip_prefix(DEVICE_LABEL_PREFIX) else {
            continue;
        };
        let Some((raw_index, field)) = rest.split_once('.') else {
            continue;
        };
        let index = canonical_index(raw_index);
        let device = devices.entry(index.clone()).or_insert_with(|| GpuDeviceInfo {
            index,
            ..Default::default()
        });
        let value = value.trim();
        match field {
            "vendor" => device.vendor = value.to_lowercase(),
            "device" => device.device = value.to_lowercase(),
            "class" => device.class = value.to_lowercase(),
            "product" => device.product = value.to_string(),
            "memoryMiB" => device.memory_mib = parse_memory_mib(value),
            _ => {}
        }
    }
    devices
}

/// Fold the per-element feature attributes into the matching devices;
/// unmatched elements with full PCI identity become new devices.
fn enrich_from_instances(
    devices: &mut BTreeMap<String, GpuDeviceInfo>,
    instances: &[NodeFeatureInstance],
) {
    for instance in instances {
        let index = canonical_index(instance.attribute("index"));
        if index.is_empty() {
            continue;
        }
        if !devices.contains_key(&index) {
            let vendor = instance.attribute("pci.vendor").to_lowercase();
            let device_id = instance.attribute("pci.device").to_lowercase();
            let class = instance.attribute("pci.class").to_lowercase();
            if vendor.is_empty() || device_id.is_empty() || class.is_empty() {
                continue;
            }
            devices.insert(
                index.clone(),
                GpuDeviceInfo {
                    index: index.clone(),
                    vendor,
                    device: device_id,
                    class,
                    ..Default::default()
                },
            );
        }
        let Some(device) = devices.get_mut(&index) else {
            continue;
        };
        apply_instance(device, instance);
    }
}

fn apply_instance(device: &mut GpuDeviceInfo, instance: &NodeFeatureInstance) {
    let set = |slot: &mut String, value: &str| {
        if !value.is_empty() {
            *slot = value.to_string();
        }
    };
    set(&mut device.uuid, instance.attribute("uuid"));
    set(&mut device.product, instance.attribute("product"));
    set(&mut device.cc_major, instance.attribute("compute.major"));
    set(&mut device.cc_minor, instance.attribute("compute.minor"));
    set(&mut device.pci_address, instance.attribute("pci.address"));
    set(&mut device.numa, instance.attribute("numa.node"));
    set(&mut device.power_limit, instance.attribute("power.limit"));

    let memory = instance.attribute("memory.total");
    if !memory.is_empty() {
        device.memory_mib = parse_memory_mib(memory);
    }

    let listed = instance.attribute("precision");
    device
        .precisions
        .extend(listed.split(',').map(str::trim).filter(|p| !p.is_empty()).map(String::from));
    for (key, value) in &instance.attributes {
        if let Some(name) = key.strip_prefix("precision.") {
            if !name.is_empty() && value.trim().eq_ignore_ascii_case("true") {
                device.precisions.push(name.to_string());
            }
        }
    }
}

/// Empty device fields fall back to the node-level defaults.
fn enrich_from_defaults(device: &mut GpuDeviceInfo, defaults: &NodeHardwareDefaults) {
    let fallback = |slot: &mut String, default: &str| {
        if slot.is_empty() && !default.is_empty() {
            *slot = default.to_string();
        }
    };
    fallback(&mut device.product, &defaults.board);
    fallback(&mut device.numa, &defaults.numa);
    fallback(&mut device.power_limit, &defaults.power_limit);
    fallback(&mut device.family, &defaults.family);
    fallback(&mut device.pstate, &defaults.pstate);
    fallback(&mut device.display, &defaults.display);
}

/// Lowercase, deduplicate and sort the precision list.
fn normalize_precisions(precisions: &mut Vec<String>) {
    for p in precisions.iter_mut() {
        *p = p.to_lowercase();
    }
    precisions.sort();
    precisions.dedup();
}
