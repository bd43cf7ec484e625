//! Allocatable devices: the value types the scheduler and the preparation
//! pipeline agree on.

use crate::attrs::{AttributeMap, ATTR_DEVICE_TYPE};
use crate::sanitize::sanitize_dns_label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Binding condition every device carries unless overridden.
pub const DEFAULT_BINDING_CONDITION: &str = "Ready";

/// Kind of allocation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// A whole physical GPU.
    Physical,
    /// A MIG slice of a physical GPU.
    Mig,
}

impl DeviceType {
    /// Case-insensitive parse against the canonical strings.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("physical") {
            Some(DeviceType::Physical)
        } else if s.eq_ignore_ascii_case("mig") {
            Some(DeviceType::Mig)
        } else {
            None
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Physical => write!(f, "physical"),
            DeviceType::Mig => write!(f, "mig"),
        }
    }
}

/// Unit of a capacity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityUnit {
    /// Mebibytes.
    Mi,
    /// Gibibytes.
    Gi,
    /// Percentage of the parent resource.
    Percent,
}

/// Optional consumption policy attached to a capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityPolicy {
    /// Amount assigned when the consumer does not ask for a specific value.
    pub default: i64,
    /// Smallest allowed request.
    pub min: i64,
    /// Largest allowed request.
    pub max: i64,
    /// Request granularity.
    pub step: i64,
    /// Unit the bounds are expressed in.
    pub unit: CapacityUnit,
}

/// A named capacity a device exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    /// Amount in `unit`.
    pub value: i64,
    /// Unit of `value`.
    pub unit: CapacityUnit,
    /// Optional request policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<CapacityPolicy>,
}

impl Capacity {
    /// Capacity without a policy.
    pub fn new(value: i64, unit: CapacityUnit) -> Self {
        Self {
            value,
            unit,
            policy: None,
        }
    }
}

/// A single counter debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterValue {
    /// Amount debited.
    pub value: i64,
    /// Unit of the debit.
    pub unit: CapacityUnit,
}

/// Debits a device charges against a named counter set; this is how MIG
/// slices consume their parent physical GPU's budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterConsumption {
    /// Name of the counter set being debited.
    pub counter_set: String,
    /// Counter name to debit amount.
    pub counters: BTreeMap<String, CounterValue>,
}

/// Counter-set name for the physical GPU at `pci_address`.
pub fn pgpu_counter_set(pci_address: &str) -> String {
    format!("pgpu-{}", sanitize_dns_label(pci_address))
}

/// An allocation unit. Identity is `(pool, canonical_name)`; `uuid` is the
/// hardware identifier and may be empty for abstract devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Pool the device is published under.
    pub pool: String,
    /// Canonical (DNS-label) name within the pool.
    pub canonical_name: String,
    /// Hardware identifier; empty for abstract devices.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    /// Physical or MIG.
    pub device_type: DeviceType,
    /// Well-known attributes.
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
    /// Named capacities.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: BTreeMap<String, Capacity>,
    /// Counter debits against parent counter sets, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<CounterConsumption>,
    /// Whether several claims may hold the device at once.
    pub allow_multiple_allocations: bool,
    /// Condition keys gating successful attachment.
    pub binding_conditions: Vec<String>,
    /// Condition keys that mark attachment as failed.
    pub binding_failure_conditions: Vec<String>,
}

impl Device {
    /// Trimmed attribute lookup; empty string when absent.
    pub fn attribute(&self, key: &str) -> String {
        self.attributes.get(key)
    }

    /// Whether this device is of `ty`, comparing case-insensitively against
    /// the canonical type strings.
    pub fn is_type(&self, ty: DeviceType) -> bool {
        match DeviceType::parse(&self.attributes.get(ATTR_DEVICE_TYPE)) {
            Some(parsed) => parsed == ty,
            None => self.device_type == ty,
        }
    }
}

fn default_binding_conditions() -> Vec<String> {
    vec![DEFAULT_BINDING_CONDITION.to_string()]
}

/// A shareable physical GPU with default binding conditions.
pub fn new_gpu_device(pool: &str, canonical_name: &str, uuid: &str, attributes: AttributeMap) -> Device {
    let mut attributes = attributes;
    attributes.set(ATTR_DEVICE_TYPE, DeviceType::Physical.to_string());
    Device {
        pool: pool.to_string(),
        canonical_name: canonical_name.to_string(),
        uuid: uuid.to_string(),
        device_type: DeviceType::Physical,
        attributes,
        capacity: BTreeMap::new(),
        consumes: Vec::new(),
        allow_multiple_allocations: true,
        binding_conditions: default_binding_conditions(),
        binding_failure_conditions: Vec::new(),
    }
}

/// An exclusive MIG slice debiting its parent GPU's counter set.
pub fn new_mig_device(
    pool: &str,
    canonical_name: &str,
    uuid: &str,
    parent_pci_address: &str,
    counters: BTreeMap<String, CounterValue>,
    attributes: AttributeMap,
) -> Device {
    let mut attributes = attributes;
    attributes.set(ATTR_DEVICE_TYPE, DeviceType::Mig.to_string());
    Device {
        pool: pool.to_string(),
        canonical_name: canonical_name.to_string(),
        uuid: uuid.to_string(),
        device_type: DeviceType::Mig,
        attributes,
        capacity: BTreeMap::new(),
        consumes: vec![CounterConsumption {
            counter_set: pgpu_counter_set(parent_pci_address),
            counters,
        }],
        allow_multiple_allocations: false,
        binding_conditions: default_binding_conditions(),
        binding_failure_conditions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::ATTR_PCI_ADDRESS;

    #[test]
    fn test_device_type_parse_case_insensitive() {
        assert_eq!(DeviceType::parse("Physical"), Some(DeviceType::Physical));
        assert_eq!(DeviceType::parse("MIG"), Some(DeviceType::Mig));
        assert_eq!(DeviceType::parse("mig"), Some(DeviceType::Mig));
        assert_eq!(DeviceType::parse("virtual"), None);
    }

    #[test]
    fn test_new_gpu_device_defaults() {
        let d = new_gpu_device("pool-a", "gpu-0", "GPU-x", AttributeMap::new());
        assert!(d.allow_multiple_allocations);
        assert_eq!(d.binding_conditions, vec!["Ready".to_string()]);
        assert!(d.binding_failure_conditions.is_empty());
        assert_eq!(d.attribute(ATTR_DEVICE_TYPE), "physical");
    }

    #[test]
    fn test_new_mig_device_defaults_and_counter_set() {
        let mut counters = BTreeMap::new();
        counters.insert(
            "memory".to_string(),
            CounterValue {
                value: 10240,
                unit: CapacityUnit::Mi,
            },
        );
        let d = new_mig_device(
            "pool-a",
            "gpu-0-mig-1g-10gb-0",
            "MIG-1",
            "0000:3B:00.0",
            counters,
            AttributeMap::new(),
        );
        assert!(!d.allow_multiple_allocations);
        assert_eq!(d.consumes.len(), 1);
        assert_eq!(d.consumes[0].counter_set, "pgpu-0000-3b-00-0");
        assert_eq!(d.attribute(ATTR_DEVICE_TYPE), "mig");
    }

    #[test]
    fn test_is_type_prefers_attribute() {
        let mut d = new_gpu_device("p", "g0", "GPU-x", AttributeMap::new());
        // Attribute wins over the structural field if they ever disagree.
        d.attributes.set(ATTR_DEVICE_TYPE, "MIG");
        assert!(d.is_type(DeviceType::Mig));
        assert!(!d.is_type(DeviceType::Physical));
    }

    #[test]
    fn test_attribute_lookup_trims() {
        let mut attrs = AttributeMap::new();
        attrs.set(ATTR_PCI_ADDRESS, " 0000:3b:00.0 ");
        let d = new_gpu_device("p", "g0", "GPU-x", attrs);
        assert_eq!(d.attribute(ATTR_PCI_ADDRESS), "0000:3b:00.0");
    }
}
