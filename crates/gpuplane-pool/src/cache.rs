//! In-memory cluster-object cache.
//!
//! A read-mostly mirror of the watched kinds. Writers are the watch
//! relays and the reconcilers; readers are reconcile handlers and the
//! admission handlers. Status writes go through an optimistic
//! resource-version check the way the API server would arbitrate them.

use dashmap::DashMap;
use gpuplane_api::{Device, GpuClusterPool, GpuPool, Node, NodeFeature, ObjectMeta};

/// What changed about an object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEvent<T> {
    Added(T),
    Modified { old: T, new: T },
    Deleted(T),
}

/// The slice of a pod the pool controller watches: identity, placement and
/// readiness of validator pods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodRecord {
    pub metadata: ObjectMeta,
    pub node_name: String,
    pub ready: bool,
}

/// Cached cluster state, keyed the way the API server names objects.
#[derive(Default)]
pub struct ClusterCache {
    pub devices: DashMap<String, Device>,
    pub pools: DashMap<(String, String), GpuPool>,
    pub cluster_pools: DashMap<String, GpuClusterPool>,
    pub nodes: DashMap<String, Node>,
    pub node_features: DashMap<String, NodeFeature>,
    pub pods: DashMap<(String, String), PodRecord>,
    /// Namespace metadata, for the managed-namespace gate.
    pub namespaces: DashMap<String, ObjectMeta>,
}

fn bump_version(meta: &mut ObjectMeta) {
    let next = meta.resource_version.parse::<u64>().unwrap_or(0) + 1;
    meta.resource_version = next.to_string();
}

impl ClusterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device, returning the resulting event.
    pub fn upsert_device(&self, mut device: Device) -> ObjectEvent<Device> {
        bump_version(&mut device.metadata);
        let name = device.metadata.name.clone();
        match self.devices.insert(name, device.clone()) {
            Some(old) => ObjectEvent::Modified { old, new: device },
            None => ObjectEvent::Added(device),
        }
    }

    pub fn delete_device(&self, name: &str) -> Option<ObjectEvent<Device>> {
        self.devices.remove(name).map(|(_, old)| ObjectEvent::Deleted(old))
    }

    pub fn upsert_pool(&self, mut pool: GpuPool) -> ObjectEvent<GpuPool> {
        bump_version(&mut pool.metadata);
        let key = (
            pool.metadata.namespace.clone().unwrap_or_default(),
            pool.metadata.name.clone(),
        );
        match self.pools.insert(key, pool.clone()) {
            Some(old) => ObjectEvent::Modified { old, new: pool },
            None => ObjectEvent::Added(pool),
        }
    }

    pub fn upsert_cluster_pool(&self, mut pool: GpuClusterPool) -> ObjectEvent<GpuClusterPool> {
        bump_version(&mut pool.metadata);
        let name = pool.metadata.name.clone();
        match self.cluster_pools.insert(name, pool.clone()) {
            Some(old) => ObjectEvent::Modified { old, new: pool },
            None => ObjectEvent::Added(pool),
        }
    }

    pub fn upsert_node(&self, node: Node) -> ObjectEvent<Node> {
        let name = node.metadata.name.clone();
        match self.nodes.insert(name, node.clone()) {
            Some(old) => ObjectEvent::Modified { old, new: node },
            None => ObjectEvent::Added(node),
        }
    }

    pub fn upsert_pod(&self, pod: PodRecord) -> ObjectEvent<PodRecord> {
        let key = (
            pod.metadata.namespace.clone().unwrap_or_default(),
            pod.metadata.name.clone(),
        );
        match self.pods.insert(key, pod.clone()) {
            Some(old) => ObjectEvent::Modified { old, new: pod },
            None => ObjectEvent::Added(pod),
        }
    }

    /// Optimistic status write: succeeds only when the stored resource
    /// version still matches the one the reconciler read.
    pub fn update_pool_status(&self, pool: &GpuPool) -> Result<(), crate::error::PoolError> {
        let key = (
            pool.metadata.namespace.clone().unwrap_or_default(),
            pool.metadata.name.clone(),
        );
        let mut entry = self.pools.get_mut(&key).ok_or(crate::error::PoolError::StaleWrite {
            kind: "GpuPool",
            name: pool.metadata.name.clone(),
        })?;
        if entry.metadata.resource_version != pool.metadata.resource_version {
            return Err(crate::error::PoolError::StaleWrite {
                kind: "GpuPool",
                name: pool.metadata.name.clone(),
            });
        }
        entry.status = pool.status.clone();
        bump_version(&mut entry.metadata);
        Ok(())
    }

    /// Optimistic status write for cluster pools.
    pub fn update_cluster_pool_status(
        &self,
        pool: &GpuClusterPool,
    ) -> Result<(), crate::error::PoolError> {
        let mut entry =
            self.cluster_pools
                .get_mut(&pool.metadata.name)
                .ok_or(crate::error::PoolError::StaleWrite {
                    kind: "GpuClusterPool",
                    name: pool.metadata.name.clone(),
                })?;
        if entry.metadata.resource_version != pool.metadata.resource_version {
            return Err(crate::error::PoolError::StaleWrite {
                kind: "GpuClusterPool",
                name: pool.metadata.name.clone(),
            });
        }
        entry.status = pool.status.clone();
        bump_version(&mut entry.metadata);
        Ok(())
    }

    pub fn upsert_namespace(&self, meta: ObjectMeta) {
        self.namespaces.insert(meta.name.clone(), meta);
    }

    /// Nodes carrying `labels[key] == value`.
    pub fn nodes_with_label(&self, key: &str, value: &str) -> Vec<Node> {
        self.nodes
            .iter()
            .filter(|n| n.metadata.label(key) == value)
            .map(|n| n.clone())
            .collect()
    }
}
