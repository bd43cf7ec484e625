//! Nodes, taints and the node-feature object published by the external
//! feature-discovery source.

use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Taint effects the admission mutator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

/// A node taint. An empty `value` means the taint matches `Exists` tolerations only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub effect: TaintEffect,
}

/// A worker node: labels plus taints are all the core reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    pub metadata: ObjectMeta,
    pub spec: NodeSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

/// One element of a node-feature instance set (e.g. one GPU), a flat
/// attribute bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeFeatureInstance {
    pub attributes: BTreeMap<String, String>,
}

impl NodeFeatureInstance {
    pub fn attribute(&self, key: &str) -> &str {
        self.attributes.get(key).map(String::as_str).unwrap_or("")
    }
}

/// The per-node feature object: discovered labels plus named instance sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeFeature {
    pub metadata: ObjectMeta,
    pub spec: NodeFeatureSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeFeatureSpec {
    /// Labels the feature source proposes; node labels win over these.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Instance sets keyed by feature name (the core reads `nvidia.com/gpu`).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub instances: BTreeMap<String, Vec<NodeFeatureInstance>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taint_roundtrip() {
        let t = Taint {
            key: "gpu.deckhouse.io/pool".into(),
            value: "pool-a".into(),
            effect: TaintEffect::NoSchedule,
        };
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"NoSchedule\""));
        let back: Taint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_empty_taint_value_omitted() {
        let t = Taint {
            key: "dedicated".into(),
            value: String::new(),
            effect: TaintEffect::NoExecute,
        };
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("value"));
    }

    #[test]
    fn test_instance_attribute_missing_is_empty() {
        let inst = NodeFeatureInstance::default();
        assert_eq!(inst.attribute("uuid"), "");
    }
}
