//! The `GpuPool` (namespaced) and `GpuClusterPool` (cluster) custom resources.

use crate::meta::{Condition, ObjectMeta};
use crate::selector::LabelSelector;
use serde::{Deserialize, Serialize};

/// Which API scope a pool lives in. Both scopes share one name space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PoolScope {
    Namespaced,
    Cluster,
}

impl std::fmt::Display for PoolScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolScope::Namespaced => write!(f, "Namespaced"),
            PoolScope::Cluster => write!(f, "Cluster"),
        }
    }
}

/// How workloads in a pool are distributed over its nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingStrategy {
    #[default]
    Spread,
    BinPack,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolScheduling {
    /// Whether member nodes are tainted for the pool; absent means enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taints_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<SchedulingStrategy>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub topology_key: String,
}

impl PoolScheduling {
    pub fn taints_enabled(&self) -> bool {
        self.taints_enabled.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolSpec {
    /// Device membership predicate; empty selects nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<PoolScheduling>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolCapacity {
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolStatus {
    pub capacity: PoolCapacity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Namespaced pool of devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpuPool {
    pub metadata: ObjectMeta,
    pub spec: PoolSpec,
    pub status: PoolStatus,
}

/// Cluster-wide pool of devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpuClusterPool {
    pub metadata: ObjectMeta,
    pub spec: PoolSpec,
    pub status: PoolStatus,
}
