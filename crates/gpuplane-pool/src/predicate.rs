//! Watch predicates: which raw events are worth a reconcile.

use crate::cache::{ObjectEvent, PodRecord};
use gpuplane_api::labels::{
    CLUSTER_ASSIGNMENT_ANNOTATION, NAMESPACED_ASSIGNMENT_ANNOTATION, VALIDATOR_APP_LABEL_VALUE,
    VALIDATOR_POOL_LABEL,
};
use gpuplane_api::{Device, PoolRef};

/// Which pool scope a watcher feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchScope {
    Namespaced,
    Cluster,
}

impl WatchScope {
    fn assignment_annotation(self) -> &'static str {
        match self {
            WatchScope::Namespaced => NAMESPACED_ASSIGNMENT_ANNOTATION,
            WatchScope::Cluster => CLUSTER_ASSIGNMENT_ANNOTATION,
        }
    }

    /// Pool references out of this watcher's scope read as absent.
    fn visible_ref<'a>(self, pool_ref: Option<&'a PoolRef>) -> Option<&'a PoolRef> {
        pool_ref.filter(|r| match self {
            WatchScope::Namespaced => r.namespace.is_some(),
            WatchScope::Cluster => r.namespace.is_none(),
        })
    }
}

/// Device events are relayed only when a field the pool controller consumes
/// actually changed.
pub fn device_event_relevant(scope: WatchScope, event: &ObjectEvent<Device>) -> bool {
    let (old, new) = match event {
        ObjectEvent::Added(_) | ObjectEvent::Deleted(_) => return true,
        ObjectEvent::Modified { old, new } => (old, new),
    };
    let annotation = scope.assignment_annotation();
    old.metadata.annotation(annotation) != new.metadata.annotation(annotation)
        || old.status.state != new.status.state
        || old.status.node_name != new.status.node_name
        || old.status.hardware.uuid != new.status.hardware.uuid
        || old.status.hardware.mig != new.status.hardware.mig
        || scope.visible_ref(old.status.pool_ref.as_ref())
            != scope.visible_ref(new.status.pool_ref.as_ref())
}

/// Validator-pod events are relayed only for validator pods bound to a pool,
/// and only when readiness or placement changed.
pub fn validator_pod_event_relevant(event: &ObjectEvent<PodRecord>) -> bool {
    let pod = match event {
        ObjectEvent::Added(pod) | ObjectEvent::Deleted(pod) => pod,
        ObjectEvent::Modified { new, .. } => new,
    };
    if pod.metadata.label("app") != VALIDATOR_APP_LABEL_VALUE
        || pod.metadata.label(VALIDATOR_POOL_LABEL).is_empty()
    {
        return false;
    }
    match event {
        ObjectEvent::Added(_) | ObjectEvent::Deleted(_) => true,
        ObjectEvent::Modified { old, new } => {
            old.ready != new.ready || old.node_name != new.node_name
        }
    }
}
