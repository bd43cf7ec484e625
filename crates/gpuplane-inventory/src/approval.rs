//! Device approval: whether a discovered device attaches to the module
//! automatically.

use gpuplane_config::{ApprovalMode, DeviceApproval};
use std::collections::BTreeMap;

/// Auto-attach decision for a device on a node with `labels`.
///
/// Unmanaged nodes never auto-attach. On managed nodes `Automatic` always
/// attaches, `Selector` consults the policy selector, `Manual` never does.
pub fn auto_attach(policy: &DeviceApproval, managed: bool, labels: &BTreeMap<String, String>) -> bool {
    if !managed {
        return false;
    }
    match policy.mode {
        ApprovalMode::Automatic => true,
        ApprovalMode::Selector => policy
            .selector
            .as_ref()
            .map(|s| s.matches(labels))
            .unwrap_or(false),
        ApprovalMode::Manual => false,
    }
}
