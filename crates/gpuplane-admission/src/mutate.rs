//! The mutating admission path: pin a pod to its requested pool.

use crate::review::{diff_pods, AdmissionRequest, AdmissionResponse, Operation};
use crate::select::{select_pool, PoolRequest};
use gpuplane_api::labels::{
    MANAGED_NAMESPACE_LABEL, POD_POOL_NAME_LABEL, POD_POOL_SCOPE_LABEL, POOL_LABEL_KEY,
};
use gpuplane_api::meta::find_condition;
use gpuplane_api::{
    Affinity, ConditionStatus, NodeAffinity, NodeSelector, NodeSelectorOperator,
    NodeSelectorRequirement, NodeSelectorTerm, Pod, PoolScope, SchedulingStrategy, Taint,
    TaintEffect, Toleration, TolerationOperator, TopologySpreadConstraint, UnsatisfiableAction,
};
use gpuplane_config::ModuleConfig;
use gpuplane_pool::ClusterCache;
use tracing::debug;

/// Everything the mutations need to know about the selected pool.
#[derive(Debug, Clone)]
pub struct ResolvedPool {
    pub scope: PoolScope,
    pub name: String,
    pub taints_enabled: bool,
    pub strategy: SchedulingStrategy,
    pub topology_key: String,
    pub capacity_total: i64,
    /// Message of a `Configured=False` condition, when present.
    pub unconfigured_message: Option<String>,
}

/// Look the requested pool up and fold in the module scheduling defaults.
pub fn resolve_pool(
    cache: &ClusterCache,
    config: &ModuleConfig,
    pod_namespace: &str,
    request: &PoolRequest,
) -> Option<ResolvedPool> {
    let (spec, status) = match request.scope {
        PoolScope::Namespaced => {
            let pool = cache
                .pools
                .get(&(pod_namespace.to_string(), request.pool_name.clone()))?;
            (pool.spec.clone(), pool.status.clone())
        }
        PoolScope::Cluster => {
            let pool = cache.cluster_pools.get(&request.pool_name)?;
            (pool.spec.clone(), pool.status.clone())
        }
    };
    let scheduling = spec.scheduling.unwrap_or_default();
    let topology_key = if scheduling.topology_key.is_empty() {
        config.scheduling.topology_key.clone()
    } else {
        scheduling.topology_key.clone()
    };
    let unconfigured_message = find_condition(&status.conditions, gpuplane_api::labels::CONDITION_CONFIGURED)
        .filter(|c| c.status == ConditionStatus::False)
        .map(|c| {
            if c.message.is_empty() {
                "pool is not configured".to_string()
            } else {
                c.message.clone()
            }
        });
    Some(ResolvedPool {
        scope: request.scope,
        name: request.pool_name.clone(),
        taints_enabled: scheduling.taints_enabled(),
        strategy: scheduling.strategy.unwrap_or(config.scheduling.default_strategy),
        topology_key,
        capacity_total: status.capacity.total,
        unconfigured_message,
    })
}

/// The mutating webhook entry point.
pub fn mutate_pod(
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
    debug!(pool = %pool_request.pool_name, quantity = pool_request.quantity, "pod requests a pool");

    let Some(pool) = resolve_pool(cache, config, namespace, &pool_request) else {
        return AdmissionResponse::deny(
            &request.uid,
            format!("GPU pool {:?} does not exist", pool_request.pool_name),
        );
    };

    if pool.scope == PoolScope::Namespaced {
        let managed = cache
            .namespaces
            .get(namespace)
            .map(|ns| ns.label(MANAGED_NAMESPACE_LABEL) == "true")
            .unwrap_or(false);
        if !managed {
            return AdmissionResponse::deny(
                &request.uid,
                format!("namespace {namespace:?} is not managed by the GPU module"),
            );
        }
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

    let mut mutated = pod.clone();
    if let Err(message) = apply_mutations(&mut mutated, cache, &pool) {
        return AdmissionResponse::deny(&request.uid, message);
    }
    apply_custom_tolerations(&mut mutated, &config.placement.custom_toleration_keys);

    let mut response = AdmissionResponse::allow(&request.uid);
    if pool_request.quantity == 0 {
        response = response.with_warning(format!(
            "pool resource {:?} is referenced with quantity 0",
            pool_request.resource_name
        ));
    }
    response.patch = diff_pods(pod, &mutated);
    response
}

/// Run the ordered mutation chain; each step is idempotent and fails on a
/// conflicting pre-existing value.
fn apply_mutations(pod: &mut Pod, cache: &ClusterCache, pool: &ResolvedPool) -> Result<(), String> {
    apply_labels(pod, pool)?;
    apply_node_selector(pod, pool)?;
    if pool.taints_enabled {
        apply_pool_toleration(pod, pool)?;
        apply_node_taint_tolerations(pod, cache, pool);
        apply_affinity(pod, pool)?;
    }
    apply_topology_spread(pod, cache, pool)
}

fn apply_labels(pod: &mut Pod, pool: &ResolvedPool) -> Result<(), String> {
    for (key, value) in [
        (POD_POOL_NAME_LABEL, pool.name.clone()),
        (POD_POOL_SCOPE_LABEL, pool.scope.to_string()),
    ] {
        match pod.metadata.labels.get(key) {
            Some(existing) if existing != &value => {
                return Err(format!(
                    "label {key:?} is already set to {existing:?}, expected {value:?}"
                ));
            }
            _ => {
                pod.metadata.labels.insert(key.to_string(), value);
            }
        }
    }
    Ok(())
}

fn apply_node_selector(pod: &mut Pod, pool: &ResolvedPool) -> Result<(), String> {
    match pod.spec.node_selector.get(POOL_LABEL_KEY) {
        Some(existing) if existing != &pool.name => Err(format!(
            "node selector {POOL_LABEL_KEY:?} is already set to {existing:?}"
        )),
        _ => {
            pod.spec
                .node_selector
                .insert(POOL_LABEL_KEY.to_string(), pool.name.clone());
            Ok(())
        }
    }
}

/// Upsert the `<poolKey>=<poolName>:NoSchedule` toleration.
fn apply_pool_toleration(pod: &mut Pod, pool: &ResolvedPool) -> Result<(), String> {
    for toleration in &mut pod.spec.tolerations {
        if toleration.key != POOL_LABEL_KEY {
            continue;
        }
        if let Some(effect) = toleration.effect {
            if effect != TaintEffect::NoSchedule {
                return Err(format!(
                    "toleration on {POOL_LABEL_KEY:?} carries unsupported effect {effect:?}"
                ));
            }
        }
        match toleration.operator {
            Some(TolerationOperator::Exists) => return Ok(()),
            Some(TolerationOperator::Equal) | None => {
                if toleration.value.is_empty() {
                    toleration.value = pool.name.clone();
                    toleration.operator = Some(TolerationOperator::Equal);
                    toleration.effect = Some(TaintEffect::NoSchedule);
                    return Ok(());
                }
                if toleration.value == pool.name {
                    return Ok(());
                }
                return Err(format!(
                    "toleration on {POOL_LABEL_KEY:?} is already bound to {:?}",
                    toleration.value
                ));
            }
        }
    }
    pod.spec
        .tolerations
        .push(Toleration::equal(POOL_LABEL_KEY, &pool.name, TaintEffect::NoSchedule));
    Ok(())
}

/// Tolerate every distinct taint observed on the pool's nodes.
fn apply_node_taint_tolerations(pod: &mut Pod, cache: &ClusterCache, pool: &ResolvedPool) {
    let mut seen: Vec<Taint> = Vec::new();
    for node in cache.nodes_with_label(POOL_LABEL_KEY, &pool.name) {
        for taint in &node.spec.taints {
            if seen.contains(taint) {
                continue;
            }
            seen.push(taint.clone());
            if pod.spec.tolerations.iter().any(|t| t.tolerates(taint)) {
                continue;
            }
            let toleration = if taint.value.is_empty() {
                Toleration::exists(&taint.key, Some(taint.effect))
            } else {
                Toleration::equal(&taint.key, &taint.value, taint.effect)
            };
            pod.spec.tolerations.push(toleration);
        }
    }
}

/// Ensure the required node affinity carries `<poolKey> In [poolName]`.
fn apply_affinity(pod: &mut Pod, pool: &ResolvedPool) -> Result<(), String> {
    let selector = pod
        .spec
        .affinity
        .get_or_insert_with(Affinity::default)
        .node_affinity
        .get_or_insert_with(NodeAffinity::default)
        .required_during_scheduling_ignored_during_execution
        .get_or_insert_with(NodeSelector::default);

    for term in &selector.node_selector_terms {
        for req in &term.match_expressions {
            if req.key == POOL_LABEL_KEY && req.operator == NodeSelectorOperator::In {
                if req.values == [pool.name.clone()] {
                    return Ok(());
                }
                return Err(format!(
                    "node affinity already binds {POOL_LABEL_KEY:?} to {:?}",
                    req.values
                ));
            }
        }
    }
    selector.node_selector_terms.push(NodeSelectorTerm {
        match_expressions: vec![NodeSelectorRequirement {
            key: POOL_LABEL_KEY.to_string(),
            operator: NodeSelectorOperator::In,
            values: vec![pool.name.clone()],
        }],
    });
    Ok(())
}

/// Spread pods over the pool's topology domains when the pool asks for it.
fn apply_topology_spread(pod: &mut Pod, cache: &ClusterCache, pool: &ResolvedPool) -> Result<(), String> {
    if pool.strategy != SchedulingStrategy::Spread || pool.topology_key.is_empty() {
        return Ok(());
    }
    let labeled = cache.nodes_with_label(POOL_LABEL_KEY, &pool.name);
    // Known topology: at least one pool node must carry the key. With no
    // pool nodes yet the answer is unknown and the constraint goes in anyway.
    if !labeled.is_empty()
        && !labeled
            .iter()
            .any(|n| !n.metadata.label(&pool.topology_key).is_empty())
    {
        debug!(pool = %pool.name, key = %pool.topology_key, "no pool node carries the topology key");
        return Ok(());
    }

    for constraint in &pod.spec.topology_spread_constraints {
        let bound = constraint
            .label_selector
            .as_ref()
            .and_then(|s| s.match_labels.get(POOL_LABEL_KEY));
        if let Some(value) = bound {
            if value == &pool.name {
                return Ok(());
            }
            return Err(format!(
                "topology spread constraint already binds {POOL_LABEL_KEY:?} to {value:?}"
            ));
        }
    }

    pod.spec.topology_spread_constraints.push(TopologySpreadConstraint {
        max_skew: 1,
        topology_key: pool.topology_key.clone(),
        when_unsatisfiable: UnsatisfiableAction::DoNotSchedule,
        label_selector: Some(gpuplane_api::LabelSelector::from_labels([(
            POOL_LABEL_KEY,
            pool.name.as_str(),
        )])),
    });
    Ok(())
}

/// Cluster-wide `Exists` tolerations from the module configuration.
fn apply_custom_tolerations(pod: &mut Pod, keys: &[String]) {
    for key in keys {
        if pod.spec.tolerations.iter().any(|t| &t.key == key) {
            continue;
        }
        pod.spec.tolerations.push(Toleration {
            key: key.clone(),
            operator: Some(TolerationOperator::Exists),
            value: String::new(),
            effect: None,
        });
    }
}
