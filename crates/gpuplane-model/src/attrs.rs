//! Device attributes: well-known keys and the tagged attribute value.
//!
//! Two vocabularies circulate for the same attributes: the canonical
//! vendor-qualified keys written by this module, and legacy short names still
//! present in older node payloads. Lookups accept both; writes always emit
//! the canonical key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical attribute key: device vendor PCI id.
pub const ATTR_VENDOR: &str = "nvidia.com/vendor";
/// Canonical attribute key: device type (`physical` or `mig`).
pub const ATTR_DEVICE_TYPE: &str = "nvidia.com/deviceType";
/// Canonical attribute key: PCI address of the physical GPU.
pub const ATTR_PCI_ADDRESS: &str = "nvidia.com/pciAddress";
/// Canonical attribute key: hardware UUID of the physical GPU.
pub const ATTR_GPU_UUID: &str = "nvidia.com/gpuUUID";
/// Canonical attribute key: installed driver version.
pub const ATTR_DRIVER_VERSION: &str = "nvidia.com/driverVersion";
/// Canonical attribute key: compute capability major.
pub const ATTR_CC_MAJOR: &str = "nvidia.com/ccMajor";
/// Canonical attribute key: compute capability minor.
pub const ATTR_CC_MINOR: &str = "nvidia.com/ccMinor";
/// Canonical attribute key: MIG profile name (e.g. `1g.10gb`).
pub const ATTR_MIG_PROFILE: &str = "nvidia.com/migProfile";
/// Canonical attribute key: UUID of an instantiated MIG device.
pub const ATTR_MIG_UUID: &str = "nvidia.com/migUUID";
/// Canonical attribute key: MPS daemon pipe directory.
pub const ATTR_MPS_PIPE_DIR: &str = "nvidia.com/mpsPipeDir";
/// Canonical attribute key: MPS daemon shared-memory directory.
pub const ATTR_MPS_SHM_DIR: &str = "nvidia.com/mpsShmDir";
/// Canonical attribute key: MPS daemon log directory.
pub const ATTR_MPS_LOG_DIR: &str = "nvidia.com/mpsLogDir";

/// Legacy short aliases accepted on read, keyed by canonical name.
const LEGACY_ALIASES: &[(&str, &str)] = &[
    (ATTR_VENDOR, "vendor"),
    (ATTR_DEVICE_TYPE, "device_type"),
    (ATTR_PCI_ADDRESS, "pci_address"),
    (ATTR_GPU_UUID, "gpu_uuid"),
    (ATTR_DRIVER_VERSION, "driver_version"),
    (ATTR_CC_MAJOR, "cc_major"),
    (ATTR_CC_MINOR, "cc_minor"),
    (ATTR_MIG_PROFILE, "mig_profile"),
    (ATTR_MIG_UUID, "mig_uuid"),
    (ATTR_MPS_PIPE_DIR, "mps_pipe_dir"),
    (ATTR_MPS_SHM_DIR, "mps_shm_dir"),
    (ATTR_MPS_LOG_DIR, "mps_log_dir"),
];

fn legacy_alias(canonical: &str) -> Option<&'static str> {
    LEGACY_ALIASES
        .iter()
        .find(|(c, _)| *c == canonical)
        .map(|(_, legacy)| *legacy)
}

/// Tagged attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    /// Free-form string.
    String(String),
    /// Signed integer.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// Dotted version string, kept verbatim.
    Version(String),
}

impl AttributeValue {
    /// Render the value as the string form used in lookups.
    pub fn as_str(&self) -> String {
        match self {
            AttributeValue::String(s) | AttributeValue::Version(s) => s.clone(),
            AttributeValue::Int(n) => n.to_string(),
            AttributeValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Int(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// Attribute bag keyed by well-known names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap(pub BTreeMap<String, AttributeValue>);

impl AttributeMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed string value for `key`, falling back to the legacy alias;
    /// empty string when absent.
    pub fn get(&self, key: &str) -> String {
        let hit = self.0.get(key).or_else(|| {
            legacy_alias(key).and_then(|alias| self.0.get(alias))
        });
        hit.map(|v| v.as_str().trim().to_string()).unwrap_or_default()
    }

    /// True when `key` (or its legacy alias) is present and non-empty.
    pub fn has(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    /// Insert under the canonical key.
    pub fn set(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no attributes are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
