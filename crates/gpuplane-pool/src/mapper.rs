//! Enqueue mapping: from a device event to the pools that must reconcile.

use crate::cache::ObjectEvent;
use crate::index::FieldIndexes;
use crate::queue::ReconcileKey;
use gpuplane_api::labels::{CLUSTER_ASSIGNMENT_ANNOTATION, NAMESPACED_ASSIGNMENT_ANNOTATION};
use gpuplane_api::Device;
use std::collections::BTreeSet;

/// Reconcile requests for every pool a device event touches: the pool-ref
/// name plus both assignment annotations, resolved through the pool-by-name
/// index, with duplicates collapsed.
pub fn pools_for_device_event(
    indexes: &FieldIndexes,
    event: &ObjectEvent<Device>,
) -> Vec<ReconcileKey> {
    let mut names: BTreeSet<String> = BTreeSet::new();
    let mut collect = |device: &Device| {
        if let Some(pool_ref) = &device.status.pool_ref {
            names.insert(pool_ref.name.clone());
        }
        for annotation in [NAMESPACED_ASSIGNMENT_ANNOTATION, CLUSTER_ASSIGNMENT_ANNOTATION] {
            let value = device.metadata.annotation(annotation);
            if !value.is_empty() {
                names.insert(value.to_string());
            }
        }
    };
    match event {
        ObjectEvent::Added(d) | ObjectEvent::Deleted(d) => collect(d),
        ObjectEvent::Modified { old, new } => {
            collect(old);
            collect(new);
        }
    }

    let mut keys = BTreeSet::new();
    for name in names {
        for pool_key in indexes.pools_by_name(&name) {
            keys.insert(pool_key_to_reconcile(&pool_key));
        }
    }
    keys.into_iter().collect()
}

/// Decode a pool-by-name index entry (`namespace/name` or bare cluster
/// name) into its reconcile key.
pub fn pool_key_to_reconcile(pool_key: &str) -> ReconcileKey {
    match pool_key.split_once('/') {
        Some((namespace, name)) => ReconcileKey::namespaced("GpuPool", namespace, name),
        None => ReconcileKey::cluster("GpuClusterPool", pool_key),
    }
}
