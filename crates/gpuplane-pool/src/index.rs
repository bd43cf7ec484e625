//! Field indexes installed once at startup and kept current by the watch
//! relays.

use dashmap::DashMap;
use gpuplane_api::labels::{CLUSTER_ASSIGNMENT_ANNOTATION, NAMESPACED_ASSIGNMENT_ANNOTATION};
use gpuplane_api::{Device, GpuClusterPool, GpuPool, Node};
use std::collections::BTreeSet;

/// One inverted index: key value to object names.
#[derive(Default)]
struct Index {
    entries: DashMap<String, BTreeSet<String>>,
}

impl Index {
    fn insert(&self, key: &str, object: &str) {
        if key.is_empty() {
            return;
        }
        self.entries.entry(key.to_string()).or_default().insert(object.to_string());
    }

    fn remove(&self, key: &str, object: &str) {
        if let Some(mut set) = self.entries.get_mut(key) {
            set.remove(object);
        }
    }

    fn get(&self, key: &str) -> BTreeSet<String> {
        self.entries.get(key).map(|s| s.clone()).unwrap_or_default()
    }
}

/// The read-mostly index set the reconcilers and mappers query.
#[derive(Default)]
pub struct FieldIndexes {
    node_by_taint_key: Index,
    device_by_pool_ref_name: Index,
    device_by_namespaced_assignment: Index,
    device_by_cluster_assignment: Index,
    pool_by_name: Index,
}

impl FieldIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reindex a device after a watch event; `old` is the prior object.
    pub fn update_device(&self, old: Option<&Device>, new: Option<&Device>) {
        if let Some(old) = old {
            let name = &old.metadata.name;
            if let Some(pool_ref) = &old.status.pool_ref {
                self.device_by_pool_ref_name.remove(&pool_ref.name, name);
            }
            self.device_by_namespaced_assignment
                .remove(old.metadata.annotation(NAMESPACED_ASSIGNMENT_ANNOTATION), name);
            self.device_by_cluster_assignment
                .remove(old.metadata.annotation(CLUSTER_ASSIGNMENT_ANNOTATION), name);
        }
        if let Some(new) = new {
            let name = &new.metadata.name;
            if let Some(pool_ref) = &new.status.pool_ref {
                self.device_by_pool_ref_name.insert(&pool_ref.name, name);
            }
            self.device_by_namespaced_assignment
                .insert(new.metadata.annotation(NAMESPACED_ASSIGNMENT_ANNOTATION), name);
            self.device_by_cluster_assignment
                .insert(new.metadata.annotation(CLUSTER_ASSIGNMENT_ANNOTATION), name);
        }
    }

    /// Reindex a node's taints.
    pub fn update_node(&self, old: Option<&Node>, new: Option<&Node>) {
        if let Some(old) = old {
            for taint in &old.spec.taints {
                self.node_by_taint_key.remove(&taint.key, &old.metadata.name);
            }
        }
        if let Some(new) = new {
            for taint in &new.spec.taints {
                self.node_by_taint_key.insert(&taint.key, &new.metadata.name);
            }
        }
    }

    /// Reindex a namespaced pool. The indexed value is `namespace/name`.
    pub fn update_pool(&self, old: Option<&GpuPool>, new: Option<&GpuPool>) {
        if let Some(old) = old {
            self.pool_by_name.remove(&old.metadata.name, &pool_key(old));
        }
        if let Some(new) = new {
            self.pool_by_name.insert(&new.metadata.name, &pool_key(new));
        }
    }

    /// Reindex a cluster pool. The indexed value is the bare name.
    pub fn update_cluster_pool(&self, old: Option<&GpuClusterPool>, new: Option<&GpuClusterPool>) {
        if let Some(old) = old {
            self.pool_by_name.remove(&old.metadata.name, &old.metadata.name);
        }
        if let Some(new) = new {
            self.pool_by_name.insert(&new.metadata.name, &new.metadata.name);
        }
    }

    pub fn nodes_with_taint_key(&self, key: &str) -> BTreeSet<String> {
        self.node_by_taint_key.get(key)
    }

    pub fn devices_by_pool_ref(&self, pool_name: &str) -> BTreeSet<String> {
        self.device_by_pool_ref_name.get(pool_name)
    }

    pub fn devices_by_namespaced_assignment(&self, pool_name: &str) -> BTreeSet<String> {
        self.device_by_namespaced_assignment.get(pool_name)
    }

    pub fn devices_by_cluster_assignment(&self, pool_name: &str) -> BTreeSet<String> {
        self.device_by_cluster_assignment.get(pool_name)
    }

    /// Pool cache keys (namespaced `ns/name` or cluster `name`) registered
    /// under `pool_name`.
    pub fn pools_by_name(&self, pool_name: &str) -> BTreeSet<String> {
        self.pool_by_name.get(pool_name)
    }
}

fn pool_key(pool: &GpuPool) -> String {
    format!(
        "{}/{}",
        pool.metadata.namespace.as_deref().unwrap_or_default(),
        pool.metadata.name
    )
}
