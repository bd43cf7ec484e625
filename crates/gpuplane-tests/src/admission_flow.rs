//! End-to-end admission tests over a seeded cluster cache.

#[cfg(test)]
mod tests {
    use gpuplane_admission::{mutate_pod, validate_pod, AdmissionRequest, Operation};
    use gpuplane_api::labels::{
        CONDITION_CONFIGURED, MANAGED_NAMESPACE_LABEL, POD_POOL_NAME_LABEL, POOL_LABEL_KEY,
    };
    use gpuplane_api::meta::set_condition;
    use gpuplane_api::{
        Condition, ConditionStatus, Container, GpuPool, Node, ObjectMeta, Pod, PoolScheduling,
        Quantity, SchedulingStrategy,
    };
    use gpuplane_config::ModuleConfig;
    use gpuplane_pool::ClusterCache;

    fn seeded_cache(with_zone_label: bool) -> ClusterCache {
        let cache = ClusterCache::new();

        let mut ns = ObjectMeta::named("team-a");
        ns.labels.insert(MANAGED_NAMESPACE_LABEL.into(), "true".into());
        cache.upsert_namespace(ns);

        let mut pool = GpuPool::default();
        pool.metadata = ObjectMeta::namespaced("team-a", "pool-a");
        pool.spec.scheduling = Some(PoolScheduling {
            taints_enabled: None,
            strategy: Some(SchedulingStrategy::Spread),
            topology_key: "zone".into(),
        });
        pool.status.capacity.total = 8;
        set_condition(
            &mut pool.status.conditions,
            Condition::new(CONDITION_CONFIGURED, ConditionStatus::True),
            100,
        );
        cache.upsert_pool(pool);

        let mut node = Node::default();
        node.metadata = ObjectMeta::named("n1");
        node.metadata.labels.insert(POOL_LABEL_KEY.into(), "pool-a".into());
        if with_zone_label {
            node.metadata.labels.insert("zone".into(), "z1".into());
        }
        cache.upsert_node(node);
        cache
    }

    fn pod_requesting(resources: &[(&str, i64)]) -> AdmissionRequest {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::namespaced("team-a", "train-0");
        for (i, (resource, quantity)) in resources.iter().enumerate() {
            let mut c = Container {
                name: format!("c{i}"),
                ..Default::default()
            };
            c.resources
                .limits
                .insert(resource.to_string(), Quantity(*quantity));
            pod.spec.containers.push(c);
        }
        AdmissionRequest {
            uid: "review-1".into(),
            operation: Operation::Create,
            object: pod,
        }
    }

    #[test]
    fn test_workload_mutation_scenario() {
        let cache = seeded_cache(true);
        let response = mutate_pod(
            &pod_requesting(&[("gpu.deckhouse.io/pool-a", 1)]),
            &cache,
            &ModuleConfig::default(),
        );
        assert!(response.allowed, "{}", response.message);

        let patch = serde_json::to_value(&response.patch).unwrap();
        let rendered = patch.to_string();
        assert!(rendered.contains(POD_POOL_NAME_LABEL));
        assert!(rendered.contains("pool-a"));
        assert!(rendered.contains("nodeSelector") || rendered.contains("/spec/nodeSelector"));
        assert!(rendered.contains("NoSchedule"));
        assert!(rendered.contains("topologySpreadConstraints") || rendered.contains("zone"));

        let spread = response
            .patch
            .iter()
            .find(|p| p.path == "/spec/topologySpreadConstraints")
            .expect("spread constraint patched");
        let constraints = spread.value.as_ref().unwrap().as_array().unwrap();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0]["topologyKey"], "zone");
        assert_eq!(constraints[0]["maxSkew"], 1);
    }

    #[test]
    fn test_single_pool_rule_denies_two_pools() {
        let cache = seeded_cache(true);
        let response = mutate_pod(
            &pod_requesting(&[("gpu.deckhouse.io/pool-a", 1), ("gpu.deckhouse.io/pool-b", 1)]),
            &cache,
            &ModuleConfig::default(),
        );
        assert!(!response.allowed);
        assert!(response.message.contains("multiple"));
    }

    #[test]
    fn test_topology_spread_suppressed_without_labeled_topology() {
        let cache = seeded_cache(false);
        let response = mutate_pod(
            &pod_requesting(&[("gpu.deckhouse.io/pool-a", 1)]),
            &cache,
            &ModuleConfig::default(),
        );
        assert!(response.allowed);
        assert!(!response
            .patch
            .iter()
            .any(|p| p.path == "/spec/topologySpreadConstraints"));
    }

    #[test]
    fn test_validator_agrees_with_mutator() {
        let cache = seeded_cache(true);
        let request = pod_requesting(&[("gpu.deckhouse.io/pool-a", 2)]);
        assert!(mutate_pod(&request, &cache, &ModuleConfig::default()).allowed);
        assert!(validate_pod(&request, &cache, &ModuleConfig::default()).allowed);
    }

    #[test]
    fn test_validator_denies_unconfigured_pool() {
        let cache = seeded_cache(true);
        {
            let mut pool = cache
                .pools
                .get(&("team-a".to_string(), "pool-a".to_string()))
                .unwrap()
                .clone();
            set_condition(
                &mut pool.status.conditions,
                Condition::new(CONDITION_CONFIGURED, ConditionStatus::False)
                    .with_reason("InvalidSelector", "device selector is malformed"),
                200,
            );
            cache.upsert_pool(pool);
        }
        let response = validate_pod(
            &pod_requesting(&[("gpu.deckhouse.io/pool-a", 1)]),
            &cache,
            &ModuleConfig::default(),
        );
        assert!(!response.allowed);
        assert_eq!(response.message, "device selector is malformed");
    }
}
