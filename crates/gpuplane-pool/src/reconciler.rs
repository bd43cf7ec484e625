//! The pool reconciler: an ordered chain of handlers over one pool object.

use crate::cache::ClusterCache;
use crate::error::PoolError;
use crate::index::FieldIndexes;
use crate::queue::{ReconcileKey, ReconcileOutcome};
use gpuplane_api::labels::{
    CLUSTER_ASSIGNMENT_ANNOTATION, CONDITION_BINDING_READY, CONDITION_CONFIGURED, CONDITION_READY,
    NAMESPACED_ASSIGNMENT_ANNOTATION, POOL_LABEL_KEY, VALIDATOR_APP_LABEL_VALUE,
    VALIDATOR_POOL_LABEL,
};
use gpuplane_api::meta::set_condition;
use gpuplane_api::{
    Condition, ConditionStatus, Device, DeviceState, GpuClusterPool, GpuPool, PoolRef, PoolScope,
    PoolSpec, PoolStatus, Taint, TaintEffect,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long to wait for a validator pod before checking again.
const VALIDATOR_RECHECK: Duration = Duration::from_secs(30);
/// Retry delay after losing an optimistic status write.
const STALE_WRITE_RETRY: Duration = Duration::from_millis(500);

/// A pool of either scope, reconciled uniformly.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolObject {
    Namespaced(GpuPool),
    Cluster(GpuClusterPool),
}

impl PoolObject {
    pub fn name(&self) -> &str {
        match self {
            PoolObject::Namespaced(p) => &p.metadata.name,
            PoolObject::Cluster(p) => &p.metadata.name,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            PoolObject::Namespaced(p) => p.metadata.namespace.as_deref(),
            PoolObject::Cluster(_) => None,
        }
    }

    pub fn scope(&self) -> PoolScope {
        match self {
            PoolObject::Namespaced(_) => PoolScope::Namespaced,
            PoolObject::Cluster(_) => PoolScope::Cluster,
        }
    }

    pub fn spec(&self) -> &PoolSpec {
        match self {
            PoolObject::Namespaced(p) => &p.spec,
            PoolObject::Cluster(p) => &p.spec,
        }
    }

    pub fn status(&self) -> &PoolStatus {
        match self {
            PoolObject::Namespaced(p) => &p.status,
            PoolObject::Cluster(p) => &p.status,
        }
    }

    pub fn status_mut(&mut self) -> &mut PoolStatus {
        match self {
            PoolObject::Namespaced(p) => &mut p.status,
            PoolObject::Cluster(p) => &mut p.status,
        }
    }
}

/// Reconciles one pool per call.
pub struct PoolReconciler {
    cache: Arc<ClusterCache>,
    indexes: Arc<FieldIndexes>,
}

impl PoolReconciler {
    pub fn new(cache: Arc<ClusterCache>, indexes: Arc<FieldIndexes>) -> Self {
        Self { cache, indexes }
    }

    /// Run the handler chain for `key`. A vanished pool is success.
    pub async fn reconcile(
        &self,
        key: &ReconcileKey,
        now_secs: u64,
    ) -> Result<ReconcileOutcome, PoolError> {
        let Some(mut pool) = self.fetch(key) else {
            debug!(key = %key, "pool gone, nothing to do");
            return Ok(ReconcileOutcome::done());
        };
        let stored = pool.clone();

        self.check_name_unique(&pool, now_secs)?;

        let mut outcome = ReconcileOutcome::done();
        let members = match self.compile_selector(&mut pool, now_secs) {
            Some(()) => {
                let members = self.enumerate_members(&pool);
                self.claim_members(&pool, &members);
                outcome = outcome.merge(self.aggregate_capacity(&mut pool, &members));
                outcome = outcome.merge(self.evaluate_conditions(&mut pool, &members, now_secs));
                outcome = outcome.merge(self.release_orphans(&pool, &members));
                outcome = outcome.merge(self.reconcile_node_taints(&pool));
                members
            }
            None => Vec::new(),
        };
        debug!(pool = pool.name(), members = members.len(), "membership evaluated");

        if pool.status() != stored.status() {
            match self.persist_status(&pool) {
                Ok(()) => info!(pool = pool.name(), total = pool.status().capacity.total, "pool status updated"),
                // Lost the optimistic write; a later pass converges.
                Err(PoolError::StaleWrite { .. }) => {
                    outcome = outcome.merge(ReconcileOutcome::after(STALE_WRITE_RETRY));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    fn fetch(&self, key: &ReconcileKey) -> Option<PoolObject> {
        match key.kind.as_str() {
            "GpuPool" => self
                .cache
                .pools
                .get(&(key.namespace.clone(), key.name.clone()))
                .map(|p| PoolObject::Namespaced(p.clone())),
            "GpuClusterPool" => self
                .cache
                .cluster_pools
                .get(&key.name)
                .map(|p| PoolObject::Cluster(p.clone())),
            _ => None,
        }
    }

    /// Cluster and namespaced pools share one name space.
    fn check_name_unique(&self, pool: &PoolObject, _now_secs: u64) -> Result<(), PoolError> {
        if let PoolObject::Namespaced(p) = pool {
            if self.cache.cluster_pools.contains_key(&p.metadata.name) {
                return Err(PoolError::NameConflict {
                    name: p.metadata.name.clone(),
                    holder: "a cluster pool".to_string(),
                });
            }
            let namespace = p.metadata.namespace.as_deref().unwrap_or_default();
            for other in self.cache.pools.iter() {
                let (other_ns, other_name) = other.key();
                if other_name == &p.metadata.name && other_ns != namespace {
                    return Err(PoolError::NameConflict {
                        name: p.metadata.name.clone(),
                        holder: format!("pool in namespace {other_ns:?}"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate the selector; on failure mark the pool unconfigured and stop
    /// the chain.
    fn compile_selector(&self, pool: &mut PoolObject, now_secs: u64) -> Option<()> {
        let Some(selector) = pool.spec().selector.clone() else {
            set_condition(
                &mut pool.status_mut().conditions,
                Condition::new(CONDITION_CONFIGURED, ConditionStatus::False)
                    .with_reason("NoSelector", "pool has no device selector"),
                now_secs,
            );
            return None;
        };
        if let Err(e) = selector.validate() {
            set_condition(
                &mut pool.status_mut().conditions,
                Condition::new(CONDITION_CONFIGURED, ConditionStatus::False)
                    .with_reason("InvalidSelector", &e.to_string()),
                now_secs,
            );
            return None;
        }
        set_condition(
            &mut pool.status_mut().conditions,
            Condition::new(CONDITION_CONFIGURED, ConditionStatus::True).with_reason("SelectorValid", ""),
            now_secs,
        );
        Some(())
    }

    /// Member devices: selector matches, plus reverse lookups through the
    /// pool-ref and scope-matching assignment indexes.
    fn enumerate_members(&self, pool: &PoolObject) -> Vec<Device> {
        let selector = pool.spec().selector.clone().unwrap_or_default();
        let mut names: BTreeSet<String> = BTreeSet::new();

        for device in self.cache.devices.iter() {
            if !selector.is_empty() && selector.matches(&device.metadata.labels) {
                names.insert(device.metadata.name.clone());
            }
        }
        names.extend(self.indexes.devices_by_pool_ref(pool.name()));
        match pool.scope() {
            PoolScope::Namespaced => {
                names.extend(self.indexes.devices_by_namespaced_assignment(pool.name()))
            }
            PoolScope::Cluster => {
                names.extend(self.indexes.devices_by_cluster_assignment(pool.name()))
            }
        }

        names
            .into_iter()
            .filter_map(|name| self.cache.devices.get(&name).map(|d| d.clone()))
            .filter(|d| self.references_pool(pool, d) || selector.matches(&d.metadata.labels))
            .collect()
    }

    fn references_pool(&self, pool: &PoolObject, device: &Device) -> bool {
        let annotation = match pool.scope() {
            PoolScope::Namespaced => NAMESPACED_ASSIGNMENT_ANNOTATION,
            PoolScope::Cluster => CLUSTER_ASSIGNMENT_ANNOTATION,
        };
        device.metadata.annotation(annotation) == pool.name()
    }

    fn aggregate_capacity(&self, pool: &mut PoolObject, members: &[Device]) -> ReconcileOutcome {
        pool.status_mut().capacity.total = members.len() as i64;
        ReconcileOutcome::done()
    }

    fn evaluate_conditions(
        &self,
        pool: &mut PoolObject,
        members: &[Device],
        now_secs: u64,
    ) -> ReconcileOutcome {
        let validator_ready = self.cache.pods.iter().any(|pod| {
            pod.metadata.label("app") == VALIDATOR_APP_LABEL_VALUE
                && pod.metadata.label(VALIDATOR_POOL_LABEL) == pool.name()
                && pod.ready
        });
        let ready_cond = if validator_ready {
            Condition::new(CONDITION_READY, ConditionStatus::True).with_reason("ValidatorReady", "")
        } else {
            Condition::new(CONDITION_READY, ConditionStatus::False)
                .with_reason("ValidatorUnready", "no ready validator pod for this pool")
        };
        set_condition(&mut pool.status_mut().conditions, ready_cond, now_secs);

        let any_bound = members.iter().any(|d| d.status.state == DeviceState::Ready);
        let binding_cond = if any_bound {
            Condition::new(CONDITION_BINDING_READY, ConditionStatus::True).with_reason("DevicesReady", "")
        } else {
            Condition::new(CONDITION_BINDING_READY, ConditionStatus::False)
                .with_reason("NoReadyDevices", "no member device is ready")
        };
        set_condition(&mut pool.status_mut().conditions, binding_cond, now_secs);

        if validator_ready {
            ReconcileOutcome::done()
        } else {
            ReconcileOutcome::after(VALIDATOR_RECHECK)
        }
    }

    /// Devices that reference this pool but neither match the selector nor
    /// carry an assignment get their pool reference cleared.
    fn release_orphans(&self, pool: &PoolObject, members: &[Device]) -> ReconcileOutcome {
        let member_names: BTreeSet<&str> = members.iter().map(|d| d.metadata.name.as_str()).collect();
        for name in self.indexes.devices_by_pool_ref(pool.name()) {
            if member_names.contains(name.as_str()) {
                continue;
            }
            let Some(device) = self.cache.devices.get(&name).map(|d| d.clone()) else {
                continue;
            };
            let mut released = device.clone();
            released.status.pool_ref = None;
            info!(device = %name, pool = pool.name(), "releasing orphaned device");
            self.cache.upsert_device(released.clone());
            self.indexes.update_device(Some(&device), Some(&released));
        }
        ReconcileOutcome::done()
    }

    /// Keep the pool taint on nodes in line with the pool label: labeled
    /// member nodes carry `<poolKey>=<name>:NoSchedule`, nodes that left
    /// the pool lose it. Stale taints are found through the
    /// `node-by-taint-key` index.
    fn reconcile_node_taints(&self, pool: &PoolObject) -> ReconcileOutcome {
        let taints_enabled = pool
            .spec()
            .scheduling
            .as_ref()
            .map(|s| s.taints_enabled())
            .unwrap_or(true);
        if !taints_enabled {
            return ReconcileOutcome::done();
        }
        let pool_taint = Taint {
            key: POOL_LABEL_KEY.to_string(),
            value: pool.name().to_string(),
            effect: TaintEffect::NoSchedule,
        };

        for node in self.cache.nodes_with_label(POOL_LABEL_KEY, pool.name()) {
            if node.spec.taints.contains(&pool_taint) {
                continue;
            }
            let mut tainted = node.clone();
            tainted.spec.taints.push(pool_taint.clone());
            info!(node = %node.metadata.name, pool = pool.name(), "tainting pool member node");
            self.cache.upsert_node(tainted.clone());
            self.indexes.update_node(Some(&node), Some(&tainted));
        }

        for name in self.indexes.nodes_with_taint_key(POOL_LABEL_KEY) {
            let Some(node) = self.cache.nodes.get(&name).map(|n| n.clone()) else {
                continue;
            };
            if node.metadata.label(POOL_LABEL_KEY) == pool.name() {
                continue;
            }
            if !node.spec.taints.contains(&pool_taint) {
                continue;
            }
            let mut cleaned = node.clone();
            cleaned.spec.taints.retain(|t| t != &pool_taint);
            info!(node = %name, pool = pool.name(), "removing stale pool taint");
            self.cache.upsert_node(cleaned.clone());
            self.indexes.update_node(Some(&node), Some(&cleaned));
        }
        ReconcileOutcome::done()
    }

    /// Claim selector-matching members that have no pool reference yet.
    fn claim_members(&self, pool: &PoolObject, members: &[Device]) {
        for device in members {
            if device.status.pool_ref.is_some() {
                continue;
            }
            let mut claimed = device.clone();
            claimed.status.pool_ref = Some(PoolRef {
                name: pool.name().to_string(),
                namespace: pool.namespace().map(String::from),
            });
            self.cache.upsert_device(claimed.clone());
            self.indexes.update_device(Some(device), Some(&claimed));
        }
    }

    fn persist_status(&self, pool: &PoolObject) -> Result<(), PoolError> {
        match pool {
            PoolObject::Namespaced(p) => self.cache.update_pool_status(p),
            PoolObject::Cluster(p) => self.cache.update_cluster_pool_status(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PodRecord;
    use gpuplane_api::meta::find_condition;
    use gpuplane_api::{LabelSelector, Node, ObjectMeta};

    fn setup() -> (Arc<ClusterCache>, Arc<FieldIndexes>, PoolReconciler) {
        let cache = Arc::new(ClusterCache::new());
        let indexes = Arc::new(FieldIndexes::new());
        let reconciler = PoolReconciler::new(Arc::clone(&cache), Arc::clone(&indexes));
        (cache, indexes, reconciler)
    }

    fn pool_with_selector(namespace: &str, name: &str, tier: &str) -> GpuPool {
        let mut pool = GpuPool::default();
        pool.metadata = ObjectMeta::namespaced(namespace, name);
        pool.spec.selector = Some(LabelSelector::from_labels([("tier", tier)]));
        pool
    }

    fn device_with_tier(name: &str, tier: &str, state: DeviceState) -> Device {
        let mut d = Device::default();
        d.metadata = ObjectMeta::named(name);
        d.metadata.labels.insert("tier".into(), tier.into());
        d.status.state = state;
        d
    }

    fn ready_validator(pool: &str) -> PodRecord {
        let mut pod = PodRecord::default();
        pod.metadata = ObjectMeta::namespaced("gpu-system", format!("validator-{pool}"));
        pod.metadata.labels.insert("app".into(), VALIDATOR_APP_LABEL_VALUE.into());
        pod.metadata.labels.insert(VALIDATOR_POOL_LABEL.into(), pool.into());
        pod.ready = true;
        pod.node_name = "n1".into();
        pod
    }

    #[tokio::test]
    async fn test_missing_pool_is_success() {
        let (_, _, reconciler) = setup();
        let outcome = reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "ns", "ghost"), 100)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::done());
    }

    #[tokio::test]
    async fn test_capacity_counts_selector_members() {
        let (cache, indexes, reconciler) = setup();
        let pool = pool_with_selector("team-a", "pool-a", "a100");
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);
        for d in [
            device_with_tier("d0", "a100", DeviceState::Ready),
            device_with_tier("d1", "a100", DeviceState::Pending),
            device_with_tier("d2", "t4", DeviceState::Ready),
        ] {
            cache.upsert_device(d.clone());
            indexes.update_device(None, Some(&d));
        }
        cache.upsert_pod(ready_validator("pool-a"));

        reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 100)
            .await
            .unwrap();

        let stored = cache.pools.get(&("team-a".into(), "pool-a".into())).unwrap();
        assert_eq!(stored.status.capacity.total, 2);
        assert_eq!(
            find_condition(&stored.status.conditions, CONDITION_CONFIGURED).unwrap().status,
            ConditionStatus::True
        );
        assert_eq!(
            find_condition(&stored.status.conditions, CONDITION_READY).unwrap().status,
            ConditionStatus::True
        );
        assert_eq!(
            find_condition(&stored.status.conditions, CONDITION_BINDING_READY).unwrap().status,
            ConditionStatus::True
        );
    }

    #[tokio::test]
    async fn test_no_validator_sets_ready_false_and_requeues() {
        let (cache, indexes, reconciler) = setup();
        let pool = pool_with_selector("team-a", "pool-a", "a100");
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);

        let outcome = reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 100)
            .await
            .unwrap();
        assert_eq!(outcome.requeue_after, Some(VALIDATOR_RECHECK));

        let stored = cache.pools.get(&("team-a".into(), "pool-a".into())).unwrap();
        assert_eq!(
            find_condition(&stored.status.conditions, CONDITION_READY).unwrap().status,
            ConditionStatus::False
        );
    }

    #[tokio::test]
    async fn test_name_conflict_with_cluster_pool() {
        let (cache, indexes, reconciler) = setup();
        let mut cp = GpuClusterPool::default();
        cp.metadata = ObjectMeta::named("shared");
        indexes.update_cluster_pool(None, Some(&cp));
        cache.upsert_cluster_pool(cp);

        let pool = pool_with_selector("team-a", "shared", "a100");
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);

        let result = reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "shared"), 100)
            .await;
        assert!(matches!(result, Err(PoolError::NameConflict { .. })));
    }

    #[tokio::test]
    async fn test_name_conflict_across_namespaces() {
        let (cache, indexes, reconciler) = setup();
        for ns in ["team-a", "team-b"] {
            let pool = pool_with_selector(ns, "shared", "a100");
            indexes.update_pool(None, Some(&pool));
            cache.upsert_pool(pool);
        }
        let result = reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "shared"), 100)
            .await;
        assert!(matches!(result, Err(PoolError::NameConflict { .. })));
    }

    #[tokio::test]
    async fn test_missing_selector_marks_unconfigured() {
        let (cache, indexes, reconciler) = setup();
        let mut pool = GpuPool::default();
        pool.metadata = ObjectMeta::namespaced("team-a", "pool-a");
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);

        reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 100)
            .await
            .unwrap();

        let stored = cache.pools.get(&("team-a".into(), "pool-a".into())).unwrap();
        let cond = find_condition(&stored.status.conditions, CONDITION_CONFIGURED).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert!(!cond.message.is_empty());
    }

    #[tokio::test]
    async fn test_orphaned_device_released() {
        let (cache, indexes, reconciler) = setup();
        let pool = pool_with_selector("team-a", "pool-a", "a100");
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);
        cache.upsert_pod(ready_validator("pool-a"));

        // References the pool but no longer matches its selector.
        let mut stale = device_with_tier("d0", "t4", DeviceState::Ready);
        stale.status.pool_ref = Some(PoolRef {
            name: "pool-a".into(),
            namespace: Some("team-a".into()),
        });
        cache.upsert_device(stale.clone());
        indexes.update_device(None, Some(&stale));

        reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 100)
            .await
            .unwrap();

        let released = cache.devices.get("d0").unwrap();
        assert!(released.status.pool_ref.is_none());
        assert!(indexes.devices_by_pool_ref("pool-a").is_empty());
    }

    #[tokio::test]
    async fn test_member_node_gets_pool_taint() {
        let (cache, indexes, reconciler) = setup();
        let pool = pool_with_selector("team-a", "pool-a", "a100");
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);
        cache.upsert_pod(ready_validator("pool-a"));

        let mut node = Node::default();
        node.metadata = ObjectMeta::named("n1");
        node.metadata.labels.insert(POOL_LABEL_KEY.into(), "pool-a".into());
        cache.upsert_node(node.clone());
        indexes.update_node(None, Some(&node));

        reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 100)
            .await
            .unwrap();

        let stored = cache.nodes.get("n1").unwrap().clone();
        assert_eq!(stored.spec.taints.len(), 1);
        assert_eq!(stored.spec.taints[0].key, POOL_LABEL_KEY);
        assert_eq!(stored.spec.taints[0].value, "pool-a");
        assert_eq!(stored.spec.taints[0].effect, TaintEffect::NoSchedule);
        assert!(indexes.nodes_with_taint_key(POOL_LABEL_KEY).contains("n1"));

        // A second pass leaves the node untouched.
        reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 200)
            .await
            .unwrap();
        assert_eq!(cache.nodes.get("n1").unwrap().spec.taints.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_pool_taint_removed() {
        let (cache, indexes, reconciler) = setup();
        let pool = pool_with_selector("team-a", "pool-a", "a100");
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);
        cache.upsert_pod(ready_validator("pool-a"));

        // Tainted for the pool but no longer labeled into it.
        let mut node = Node::default();
        node.metadata = ObjectMeta::named("n1");
        node.spec.taints.push(Taint {
            key: POOL_LABEL_KEY.into(),
            value: "pool-a".into(),
            effect: TaintEffect::NoSchedule,
        });
        cache.upsert_node(node.clone());
        indexes.update_node(None, Some(&node));

        reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 100)
            .await
            .unwrap();

        let stored = cache.nodes.get("n1").unwrap().clone();
        assert!(stored.spec.taints.is_empty());
        assert!(indexes.nodes_with_taint_key(POOL_LABEL_KEY).is_empty());
    }

    #[tokio::test]
    async fn test_taints_disabled_leaves_nodes_alone() {
        let (cache, indexes, reconciler) = setup();
        let mut pool = pool_with_selector("team-a", "pool-a", "a100");
        pool.spec.scheduling = Some(gpuplane_api::PoolScheduling {
            taints_enabled: Some(false),
            ..Default::default()
        });
        indexes.update_pool(None, Some(&pool));
        cache.upsert_pool(pool);
        cache.upsert_pod(ready_validator("pool-a"));

        let mut node = Node::default();
        node.metadata = ObjectMeta::named("n1");
        node.metadata.labels.insert(POOL_LABEL_KEY.into(), "pool-a".into());
        cache.upsert_node(node.clone());
        indexes.update_node(None, Some(&node));

        reconciler
            .reconcile(&ReconcileKey::namespaced("GpuPool", "team-a", "pool-a"), 100)
            .await
            .unwrap();
        assert!(cache.nodes.get("n1").unwrap().spec.taints.is_empty());
    }

    #[tokio::test]
    async fn test_cluster_pool_reconcile() {
        let (cache, indexes, reconciler) = setup();
        let mut pool = GpuClusterPool::default();
        pool.metadata = ObjectMeta::named("pool-b");
        pool.spec.selector = Some(LabelSelector::from_labels([("tier", "h100")]));
        indexes.update_cluster_pool(None, Some(&pool));
        cache.upsert_cluster_pool(pool);
        cache.upsert_pod(ready_validator("pool-b"));

        let d = device_with_tier("d0", "h100", DeviceState::Ready);
        cache.upsert_device(d.clone());
        indexes.update_device(None, Some(&d));

        reconciler
            .reconcile(&ReconcileKey::cluster("GpuClusterPool", "pool-b"), 100)
            .await
            .unwrap();
        let stored = cache.cluster_pools.get("pool-b").unwrap();
        assert_eq!(stored.status.capacity.total, 1);
    }
}
