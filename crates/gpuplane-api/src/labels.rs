//! Well-known label, annotation and resource-name constants.

/// API group for everything the module owns.
pub const GROUP: &str = "gpu.deckhouse.io";

/// Node label binding a node to a pool: `gpu.deckhouse.io/pool=<poolName>`.
pub const POOL_LABEL_KEY: &str = "gpu.deckhouse.io/pool";

/// Pod label recording the selected pool name.
pub const POD_POOL_NAME_LABEL: &str = "gpu.deckhouse.io/pool-name";
/// Pod label recording the selected pool scope (`Namespaced` or `Cluster`).
pub const POD_POOL_SCOPE_LABEL: &str = "gpu.deckhouse.io/pool-scope";

/// Resource-name prefix for namespaced pools: `gpu.deckhouse.io/<poolName>`.
pub const NAMESPACED_POOL_RESOURCE_PREFIX: &str = "gpu.deckhouse.io/";
/// Resource-name prefix for cluster pools: `cluster.gpu.deckhouse.io/<poolName>`.
pub const CLUSTER_POOL_RESOURCE_PREFIX: &str = "cluster.gpu.deckhouse.io/";

/// Namespace label gating namespaced-pool consumption.
pub const MANAGED_NAMESPACE_LABEL: &str = "gpu.deckhouse.io/managed";

/// Default node label consulted for the managed-nodes decision.
pub const MANAGED_NODE_LABEL: &str = "gpu.deckhouse.io/managed";

/// Device annotation assigning a device to a namespaced pool.
pub const NAMESPACED_ASSIGNMENT_ANNOTATION: &str = "gpu.deckhouse.io/pool-assignment";
/// Device annotation assigning a device to a cluster pool.
pub const CLUSTER_ASSIGNMENT_ANNOTATION: &str = "gpu.deckhouse.io/cluster-pool-assignment";

/// Label prefix carrying per-device PCI subrecords on nodes:
/// `gpu.deckhouse.io/device-<index>.<field>`.
pub const DEVICE_LABEL_PREFIX: &str = "gpu.deckhouse.io/device-";

/// `app` label value of the validator pods the pool controller watches.
pub const VALIDATOR_APP_LABEL_VALUE: &str = "nvidia-operator-validator";
/// Pool label on validator pods.
pub const VALIDATOR_POOL_LABEL: &str = "pool";

/// Condition types maintained by the core.
pub const CONDITION_CONFIGURED: &str = "Configured";
pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_BINDING_READY: &str = "BindingReady";
