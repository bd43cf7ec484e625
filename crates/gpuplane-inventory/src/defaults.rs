//! Node-level hardware defaults parsed from vendor labels.

use crate::labels::*;
use std::collections::BTreeMap;

/// Source metric of a MIG profile capacity, in replacement priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigProfileMetric {
    /// Lowest priority.
    Available = 1,
    Ready = 2,
    /// Highest priority; replaces the others.
    Count = 3,
}

impl MigProfileMetric {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "count" => Some(MigProfileMetric::Count),
            "ready" => Some(MigProfileMetric::Ready),
            "available" => Some(MigProfileMetric::Available),
            _ => None,
        }
    }
}

/// Capacity entry for a MIG profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigProfileCapacity {
    pub count: u32,
    pub metric: MigProfileMetric,
}

/// Per-node hardware defaults every device falls back to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeHardwareDefaults {
    pub driver_version: String,
    pub cuda_runtime: String,
    pub mig_capable: bool,
    pub mig_strategy: String,
    /// Profile name to capacity, highest-priority metric wins.
    pub mig_profiles: BTreeMap<String, MigProfileCapacity>,
    pub numa: String,
    pub power_limit: String,
    pub sm_count: String,
    pub board: String,
    pub family: String,
    pub serial: String,
    pub pstate: String,
    pub display: String,
}

impl NodeHardwareDefaults {
    /// Parse the defaults record from the merged node labels.
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| labels.get(key).map(|s| s.trim().to_string()).unwrap_or_default();
        let mut defaults = Self {
            driver_version: get(LABEL_DRIVER_VERSION),
            cuda_runtime: get(LABEL_CUDA_RUNTIME),
            mig_capable: get(LABEL_MIG_CAPABLE).eq_ignore_ascii_case("true"),
            mig_strategy: get(LABEL_MIG_STRATEGY),
            numa: get(LABEL_NUMA),
            power_limit: get(LABEL_POWER_LIMIT),
            sm_count: get(LABEL_SM_COUNT),
            board: get(LABEL_BOARD),
            family: get(LABEL_FAMILY),
            serial: get(LABEL_SERIAL),
            pstate: get(LABEL_PSTATE),
            display: get(LABEL_DISPLAY),
            mig_profiles: BTreeMap::new(),
        };
        for (key, value) in labels {
            if let Some((profile, capacity)) = parse_profile_label(key, value) {
                defaults.apply_profile(profile, capacity);
            }
        }
        defaults
    }

    /// Record a profile capacity; a higher-priority metric replaces a lower
    /// one, same priority keeps the latest value.
    fn apply_profile(&mut self, profile: String, capacity: MigProfileCapacity) {
        match self.mig_profiles.get(&profile) {
            Some(existing) if existing.metric > capacity.metric => {}
            _ => {
                self.mig_profiles.insert(profile, capacity);
            }
        }
    }
}

/// Parse `nvidia.com/mig-<name>.<metric>` into a profile capacity entry.
fn parse_profile_label(key: &str, value: &str) -> Option<(String, MigProfileCapacity)> {
    let rest = key.strip_prefix(MIG_PROFILE_LABEL_PREFIX)?;
    let (profile, metric) = rest.rsplit_once('.')?;
    if profile.is_empty() {
        return None;
    }
    let metric = MigProfileMetric::parse(metric)?;
    let count: u32 = value.trim().parse().ok()?;
    Some((profile.to_string(), MigProfileCapacity { count, metric }))
}
