//! The pool selection contract: which pool a pod asks for and how much.

use gpuplane_api::labels::{CLUSTER_POOL_RESOURCE_PREFIX, NAMESPACED_POOL_RESOURCE_PREFIX};
use gpuplane_api::{Container, PodSpec, PoolScope};
use std::collections::BTreeSet;
use thiserror::Error;

/// The single pool a pod is allowed to reference.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRequest {
    pub scope: PoolScope,
    pub pool_name: String,
    /// Full resource name, `<prefix><poolName>`.
    pub resource_name: String,
    /// max(Σ containers, max init containers).
    pub quantity: i64,
}

/// Violations of the selection contract.
#[derive(Debug, Error, PartialEq)]
pub enum SelectError {
    #[error("workload references multiple GPU pools: {0}")]
    MultiplePools(String),
}

/// Derive the pool request from a pod spec; `None` when no pool resource is
/// referenced at all.
pub fn select_pool(spec: &PodSpec) -> Result<Option<PoolRequest>, SelectError> {
    let mut referenced: BTreeSet<(PoolScope, String, String)> = BTreeSet::new();
    for container in spec.containers.iter().chain(spec.init_containers.iter()) {
        for resource in container
            .resources
            .limits
            .keys()
            .chain(container.resources.requests.keys())
        {
            if let Some((scope, pool_name)) = parse_pool_resource(resource) {
                referenced.insert((scope, pool_name, resource.clone()));
            }
        }
    }

    let mut iter = referenced.iter();
    let Some((scope, pool_name, resource_name)) = iter.next().cloned() else {
        return Ok(None);
    };
    let distinct: BTreeSet<&String> = referenced.iter().map(|(_, name, _)| name).collect();
    if distinct.len() > 1 {
        let names: Vec<String> = distinct.into_iter().cloned().collect();
        return Err(SelectError::MultiplePools(names.join(", ")));
    }

    Ok(Some(PoolRequest {
        scope,
        pool_name,
        quantity: requested_quantity(spec, &resource_name),
        resource_name,
    }))
}

/// Split a resource name into scope and pool name.
fn parse_pool_resource(resource: &str) -> Option<(PoolScope, String)> {
    if let Some(name) = resource.strip_prefix(CLUSTER_POOL_RESOURCE_PREFIX) {
        if !name.is_empty() && !name.contains('/') {
            return Some((PoolScope::Cluster, name.to_string()));
        }
    }
    if let Some(name) = resource.strip_prefix(NAMESPACED_POOL_RESOURCE_PREFIX) {
        if !name.is_empty() && !name.contains('/') {
            return Some((PoolScope::Namespaced, name.to_string()));
        }
    }
    None
}

/// Requested quantity: regular containers sum, init containers peak.
fn requested_quantity(spec: &PodSpec, resource: &str) -> i64 {
    let containers: i64 = spec.containers.iter().map(|c| effective(c, resource)).sum();
    let init_peak: i64 = spec
        .init_containers
        .iter()
        .map(|c| effective(c, resource))
        .max()
        .unwrap_or(0);
    containers.max(init_peak)
}

fn effective(container: &Container, resource: &str) -> i64 {
    container.resources.effective(resource)
}
