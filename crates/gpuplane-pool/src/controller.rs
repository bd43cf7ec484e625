//! Watch relay: feeds filtered cluster events into the reconcile queue.

use crate::cache::{ClusterCache, ObjectEvent, PodRecord};
use crate::index::FieldIndexes;
use crate::mapper::{pool_key_to_reconcile, pools_for_device_event};
use crate::predicate::{device_event_relevant, validator_pod_event_relevant, WatchScope};
use crate::queue::{ReconcileKey, ReconcileQueue};
use gpuplane_api::labels::{POOL_LABEL_KEY, VALIDATOR_POOL_LABEL};
use gpuplane_api::{Device, GpuClusterPool, GpuPool, Node};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Relays watch events to the queue, keeping the cached objects and the
/// field indexes current.
pub struct WatchRelay {
    cache: Arc<ClusterCache>,
    indexes: Arc<FieldIndexes>,
    queue: ReconcileQueue,
}

impl WatchRelay {
    pub fn new(cache: Arc<ClusterCache>, indexes: Arc<FieldIndexes>, queue: ReconcileQueue) -> Self {
        Self {
            cache,
            indexes,
            queue,
        }
    }

    /// Device events fan out to every pool the device names, once per
    /// watcher scope that considers the change relevant.
    pub async fn on_device_event(&self, event: &ObjectEvent<Device>) {
        match event {
            ObjectEvent::Added(new) => self.indexes.update_device(None, Some(new)),
            ObjectEvent::Modified { old, new } => self.indexes.update_device(Some(old), Some(new)),
            ObjectEvent::Deleted(old) => self.indexes.update_device(Some(old), None),
        }
        let relevant = device_event_relevant(WatchScope::Namespaced, event)
            || device_event_relevant(WatchScope::Cluster, event);
        if !relevant {
            return;
        }
        for key in pools_for_device_event(&self.indexes, event) {
            debug!(key = %key, "device event enqueues pool");
            self.queue.add(key).await;
        }
    }

    /// Node events keep the cached node and the taint index current, then
    /// requeue the pools the node is labeled into so taint upkeep runs.
    pub async fn on_node_event(&self, event: &ObjectEvent<Node>) {
        match event {
            ObjectEvent::Added(new) => {
                self.cache.upsert_node(new.clone());
                self.indexes.update_node(None, Some(new));
            }
            ObjectEvent::Modified { old, new } => {
                self.cache.upsert_node(new.clone());
                self.indexes.update_node(Some(old), Some(new));
            }
            ObjectEvent::Deleted(old) => {
                self.cache.nodes.remove(&old.metadata.name);
                self.indexes.update_node(Some(old), None);
            }
        }

        let mut pool_names: BTreeSet<String> = BTreeSet::new();
        let mut collect = |node: &Node| {
            let label = node.metadata.label(POOL_LABEL_KEY);
            if !label.is_empty() {
                pool_names.insert(label.to_string());
            }
        };
        match event {
            ObjectEvent::Added(node) | ObjectEvent::Deleted(node) => collect(node),
            ObjectEvent::Modified { old, new } => {
                collect(old);
                collect(new);
            }
        }
        for name in pool_names {
            for pool_key in self.indexes.pools_by_name(&name) {
                debug!(pool = %pool_key, "node event enqueues pool");
                self.queue.add(pool_key_to_reconcile(&pool_key)).await;
            }
        }
    }

    pub async fn on_pool_event(&self, event: &ObjectEvent<GpuPool>) {
        let pool = match event {
            ObjectEvent::Added(new) => {
                self.indexes.update_pool(None, Some(new));
                new
            }
            ObjectEvent::Modified { old, new } => {
                self.indexes.update_pool(Some(old), Some(new));
                new
            }
            ObjectEvent::Deleted(old) => {
                self.indexes.update_pool(Some(old), None);
                old
            }
        };
        self.queue
            .add(ReconcileKey::namespaced(
                "GpuPool",
                pool.metadata.namespace.as_deref().unwrap_or_default(),
                &pool.metadata.name,
            ))
            .await;
    }

    pub async fn on_cluster_pool_event(&self, event: &ObjectEvent<GpuClusterPool>) {
        let pool = match event {
            ObjectEvent::Added(new) => {
                self.indexes.update_cluster_pool(None, Some(new));
                new
            }
            ObjectEvent::Modified { old, new } => {
                self.indexes.update_cluster_pool(Some(old), Some(new));
                new
            }
            ObjectEvent::Deleted(old) => {
                self.indexes.update_cluster_pool(Some(old), None);
                old
            }
        };
        self.queue
            .add(ReconcileKey::cluster("GpuClusterPool", &pool.metadata.name))
            .await;
    }

    /// Node-feature changes can move devices between pools, so every pool
    /// re-evaluates.
    pub async fn on_node_feature_event(&self) {
        self.requeue_all_pools().await;
    }

    /// A new module-config snapshot changes scheduling defaults for every
    /// pool.
    pub async fn on_module_config_change(&self) {
        self.requeue_all_pools().await;
    }

    async fn requeue_all_pools(&self) {
        let namespaced: Vec<ReconcileKey> = self
            .cache
            .pools
            .iter()
            .map(|p| {
                ReconcileKey::namespaced(
                    "GpuPool",
                    p.metadata.namespace.as_deref().unwrap_or_default(),
                    &p.metadata.name,
                )
            })
            .collect();
        let cluster: Vec<ReconcileKey> = self
            .cache
            .cluster_pools
            .iter()
            .map(|p| ReconcileKey::cluster("GpuClusterPool", &p.metadata.name))
            .collect();
        for key in namespaced.into_iter().chain(cluster) {
            self.queue.add(key).await;
        }
    }

    /// Validator-pod readiness maps to the pool named in the pod labels.
    pub async fn on_validator_pod_event(&self, event: &ObjectEvent<PodRecord>) {
        if !validator_pod_event_relevant(event) {
            return;
        }
        let pod = match event {
            ObjectEvent::Added(pod) | ObjectEvent::Deleted(pod) => pod,
            ObjectEvent::Modified { new, .. } => new,
        };
        let pool_name = pod.metadata.label(VALIDATOR_POOL_LABEL);
        for pool_key in self.indexes.pools_by_name(pool_name) {
            self.queue.add(pool_key_to_reconcile(&pool_key)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuplane_api::{ObjectMeta, PoolRef, Taint, TaintEffect};

    fn relay() -> (WatchRelay, ReconcileQueue, Arc<FieldIndexes>, Arc<ClusterCache>) {
        let cache = Arc::new(ClusterCache::new());
        let indexes = Arc::new(FieldIndexes::new());
        let queue = ReconcileQueue::new();
        let relay = WatchRelay::new(Arc::clone(&cache), Arc::clone(&indexes), queue.clone());
        (relay, queue, indexes, cache)
    }

    fn seeded_pool(indexes: &FieldIndexes) {
        let mut pool = GpuPool::default();
        pool.metadata = ObjectMeta::namespaced("team-a", "pool-a");
        indexes.update_pool(None, Some(&pool));
    }

    fn pool_node(name: &str, pool: &str) -> Node {
        let mut node = Node::default();
        node.metadata = ObjectMeta::named(name);
        node.metadata.labels.insert(POOL_LABEL_KEY.into(), pool.into());
        node
    }

    #[tokio::test]
    async fn test_device_event_enqueues_matching_pool() {
        let (relay, queue, indexes, _) = relay();
        seeded_pool(&indexes);

        let mut device = Device::default();
        device.metadata = ObjectMeta::named("d0");
        device.status.pool_ref = Some(PoolRef {
            name: "pool-a".into(),
            namespace: Some("team-a".into()),
        });
        relay.on_device_event(&ObjectEvent::Added(device)).await;
        assert_eq!(queue_pending(&queue).await, 1);

        // The same event again collapses into the pending entry.
        let mut device = Device::default();
        device.metadata = ObjectMeta::named("d0");
        device.status.pool_ref = Some(PoolRef {
            name: "pool-a".into(),
            namespace: Some("team-a".into()),
        });
        relay.on_device_event(&ObjectEvent::Added(device)).await;
        assert_eq!(queue_pending(&queue).await, 1);
    }

    #[tokio::test]
    async fn test_irrelevant_device_modification_not_enqueued() {
        let (relay, queue, indexes, _) = relay();
        seeded_pool(&indexes);

        let mut old = Device::default();
        old.metadata = ObjectMeta::named("d0");
        let mut new = old.clone();
        new.metadata.labels.insert("touched".into(), "yes".into());
        relay
            .on_device_event(&ObjectEvent::Modified { old, new })
            .await;

        // Nothing was enqueued for the unrelated label change.
        assert_eq!(queue_pending(&queue).await, 0);
    }

    #[tokio::test]
    async fn test_node_event_caches_node_and_indexes_taints() {
        let (relay, queue, indexes, cache) = relay();
        seeded_pool(&indexes);

        let mut node = pool_node("n1", "pool-a");
        node.spec.taints.push(Taint {
            key: POOL_LABEL_KEY.into(),
            value: "pool-a".into(),
            effect: TaintEffect::NoSchedule,
        });
        relay.on_node_event(&ObjectEvent::Added(node)).await;

        assert!(cache.nodes.get("n1").is_some());
        assert!(indexes.nodes_with_taint_key(POOL_LABEL_KEY).contains("n1"));
        assert_eq!(queue_pending(&queue).await, 1);
    }

    #[tokio::test]
    async fn test_node_relabel_enqueues_both_pools() {
        let (relay, queue, indexes, _) = relay();
        seeded_pool(&indexes);
        let mut other = GpuPool::default();
        other.metadata = ObjectMeta::namespaced("team-b", "pool-b");
        indexes.update_pool(None, Some(&other));

        relay
            .on_node_event(&ObjectEvent::Modified {
                old: pool_node("n1", "pool-a"),
                new: pool_node("n1", "pool-b"),
            })
            .await;
        assert_eq!(queue_pending(&queue).await, 2);
    }

    #[tokio::test]
    async fn test_node_deletion_clears_cache_and_index() {
        let (relay, _, indexes, cache) = relay();
        let mut node = pool_node("n1", "pool-a");
        node.spec.taints.push(Taint {
            key: "dedicated".into(),
            value: String::new(),
            effect: TaintEffect::NoExecute,
        });
        relay.on_node_event(&ObjectEvent::Added(node.clone())).await;
        assert!(cache.nodes.get("n1").is_some());

        relay.on_node_event(&ObjectEvent::Deleted(node)).await;
        assert!(cache.nodes.get("n1").is_none());
        assert!(indexes.nodes_with_taint_key("dedicated").is_empty());
    }

    #[tokio::test]
    async fn test_validator_pod_event_targets_named_pool() {
        let (relay, queue, indexes, _) = relay();
        seeded_pool(&indexes);

        let mut pod = PodRecord::default();
        pod.metadata = ObjectMeta::namespaced("gpu-system", "validator-0");
        pod.metadata
            .labels
            .insert("app".into(), "nvidia-operator-validator".into());
        pod.metadata
            .labels
            .insert(VALIDATOR_POOL_LABEL.into(), "pool-a".into());
        pod.ready = true;
        relay.on_validator_pod_event(&ObjectEvent::Added(pod)).await;
        assert_eq!(queue_pending(&queue).await, 1);
    }

    #[tokio::test]
    async fn test_module_config_change_requeues_every_pool() {
        let (relay, queue, indexes, cache) = relay();
        for name in ["pool-a", "pool-b"] {
            let mut pool = GpuPool::default();
            pool.metadata = ObjectMeta::namespaced("team-a", name);
            indexes.update_pool(None, Some(&pool));
            cache.upsert_pool(pool);
        }
        let mut cp = GpuClusterPool::default();
        cp.metadata = ObjectMeta::named("shared");
        cache.upsert_cluster_pool(cp);

        relay.on_module_config_change().await;
        assert_eq!(queue_pending(&queue).await, 3);
    }

    async fn queue_pending(queue: &ReconcileQueue) -> usize {
        queue.pending_len().await
    }
}
