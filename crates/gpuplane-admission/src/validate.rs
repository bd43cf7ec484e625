//! The validating admission path.

use crate::mutate::resolve_pool;
use crate::review::{AdmissionRequest, AdmissionResponse, Operation};
use crate::select::select_pool;
use gpuplane_config::ModuleConfig;
use gpuplane_pool::ClusterCache;

/// Validate a pod against the selected pool's state: an unconfigured pool
/// blocks admission with its condition message; a configured one enforces
/// capacity.
pub fn validate_pod(
    request: &AdmissionRequest,
    cache: &ClusterCache,
    config: &ModuleConfig,
) -> AdmissionResponse {
    if request.operation == Operation::Delete {
        return AdmissionResponse::allow(&request.uid);
    }
    let pod = &request.object;
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");

    let pool_request = match select_pool(&pod.spec) {
        Ok(Some(pool_request)) => pool_request,
        Ok(None) => return AdmissionResponse::allow(&request.uid),
        Err(e) => return AdmissionResponse::deny(&request.uid, e.to_string()),
    };

    let Some(pool) = resolve_pool(cache, config, namespace, &pool_request) else {
        return AdmissionResponse::deny(
            &request.uid,
            format!("GPU pool {:?} does not exist", pool_request.pool_name),
        );
    };

    if let Some(message) = pool.unconfigured_message {
        return AdmissionResponse::deny(&request.uid, message);
    }
    if pool_request.quantity > pool.capacity_total {
        return AdmissionResponse::deny(
            &request.uid,
            format!(
                "requested {} devices from pool {:?} with capacity {}",
                pool_request.quantity, pool.name, pool.capacity_total
            ),
        );
    }
    AdmissionResponse::allow(&request.uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuplane_api::labels::CONDITION_CONFIGURED;
    use gpuplane_api::meta::set_condition;
    use gpuplane_api::{
        Condition, ConditionStatus, Container, GpuPool, ObjectMeta, Pod, Quantity,
    };

    fn cache_with_pool(configured: bool, capacity: i64) -> ClusterCache {
        let cache = ClusterCache::new();
        let mut pool = GpuPool::default();
        pool.metadata = ObjectMeta::namespaced("team-a", "pool-a");
        pool.status.capacity.total = capacity;
        let cond = if configured {
            Condition::new(CONDITION_CONFIGURED, ConditionStatus::True)
        } else {
            Condition::new(CONDITION_CONFIGURED, ConditionStatus::False)
                .with_reason("InvalidSelector", "selector key must not be empty")
        };
        set_condition(&mut pool.status.conditions, cond, 100);
        cache.upsert_pool(pool);
        cache
    }

    fn gpu_pod(quantity: i64) -> AdmissionRequest {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::namespaced("team-a", "train-0");
        let mut c = Container::default();
        c.resources
            .limits
            .insert("gpu.deckhouse.io/pool-a".into(), Quantity(quantity));
        pod.spec.containers.push(c);
        AdmissionRequest {
            uid: "req-1".into(),
            operation: Operation::Create,
            object: pod,
        }
    }

    #[test]
    fn test_configured_pool_with_capacity_allows() {
        let cache = cache_with_pool(true, 4);
        let response = validate_pod(&gpu_pod(2), &cache, &ModuleConfig::default());
        assert!(response.allowed);
    }

    #[test]
    fn test_unconfigured_pool_denies_with_condition_message() {
        let cache = cache_with_pool(false, 4);
        let response = validate_pod(&gpu_pod(1), &cache, &ModuleConfig::default());
        assert!(!response.allowed);
        assert_eq!(response.message, "selector key must not be empty");
    }

    #[test]
    fn test_over_capacity_denies() {
        let cache = cache_with_pool(true, 1);
        let response = validate_pod(&gpu_pod(2), &cache, &ModuleConfig::default());
        assert!(!response.allowed);
    }

    #[test]
    fn test_delete_always_allowed() {
        let cache = cache_with_pool(false, 0);
        let mut request = gpu_pod(1);
        request.operation = Operation::Delete;
        assert!(validate_pod(&request, &cache, &ModuleConfig::default()).allowed);
    }

    #[test]
    fn test_pod_without_pool_resources_allowed() {
        let cache = cache_with_pool(false, 0);
        let mut request = gpu_pod(1);
        request.object.spec.containers[0].resources.limits.clear();
        assert!(validate_pod(&request, &cache, &ModuleConfig::default()).allowed);
    }
}
