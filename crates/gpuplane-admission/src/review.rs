//! Admission request/response envelope and the JSON Patch diff.

use gpuplane_api::Pod;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the API server is doing to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// One incoming admission review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub operation: Operation,
    pub object: Pod,
}

/// One JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Admission verdict plus the patch for mutating reviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patch: Vec<PatchOp>,
}

impl AdmissionResponse {
    pub fn allow(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: true,
            message: String::new(),
            warnings: Vec::new(),
            patch: Vec::new(),
        }
    }

    pub fn deny(uid: &str, message: impl Into<String>) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: false,
            message: message.into(),
            warnings: Vec::new(),
            patch: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Section-level JSON Patch between the original and the mutated pod: one
/// `add`/`replace` per rewritten region.
pub fn diff_pods(original: &Pod, mutated: &Pod) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    section(
        &mut ops,
        "/metadata/labels",
        original.metadata.labels.is_empty(),
        serde_json::to_value(&original.metadata.labels),
        serde_json::to_value(&mutated.metadata.labels),
    );
    section(
        &mut ops,
        "/spec/nodeSelector",
        original.spec.node_selector.is_empty(),
        serde_json::to_value(&original.spec.node_selector),
        serde_json::to_value(&mutated.spec.node_selector),
    );
    section(
        &mut ops,
        "/spec/tolerations",
        original.spec.tolerations.is_empty(),
        serde_json::to_value(&original.spec.tolerations),
        serde_json::to_value(&mutated.spec.tolerations),
    );
    section(
        &mut ops,
        "/spec/affinity",
        original.spec.affinity.is_none(),
        serde_json::to_value(&original.spec.affinity),
        serde_json::to_value(&mutated.spec.affinity),
    );
    section(
        &mut ops,
        "/spec/topologySpreadConstraints",
        original.spec.topology_spread_constraints.is_empty(),
        serde_json::to_value(&original.spec.topology_spread_constraints),
        serde_json::to_value(&mutated.spec.topology_spread_constraints),
    );
    ops
}

fn section(
    ops: &mut Vec<PatchOp>,
    path: &str,
    was_absent: bool,
    original: Result<Value, serde_json::Error>,
    mutated: Result<Value, serde_json::Error>,
) {
    let (Ok(original), Ok(mutated)) = (original, mutated) else {
        return;
    };
    if original == mutated {
        return;
    }
    ops.push(PatchOp {
        op: if was_absent { "add" } else { "replace" }.to_string(),
        path: path.to_string(),
        value: Some(mutated),
    });
}
