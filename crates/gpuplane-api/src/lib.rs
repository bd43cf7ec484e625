//! gpuplane API object surface: the Kubernetes-shaped types the control-plane
//! core reads and mutates.
//!
//! These are deliberately a subset of the upstream API: only the fields the
//! reconcilers, the preparation pipeline and the admission handlers actually
//! touch are modeled.

pub mod device;
pub mod labels;
pub mod meta;
pub mod node;
pub mod pod;
pub mod pool;
pub mod quantity;
pub mod selector;

pub use device::{Device, DeviceHardware, DeviceState, DeviceStatus, MigInfo, NodeState, NodeStateStatus, PoolRef};
pub use meta::{Condition, ConditionStatus, ObjectMeta};
pub use node::{Node, NodeFeature, NodeFeatureInstance, NodeFeatureSpec, NodeSpec, Taint, TaintEffect};
pub use pod::{
    Affinity, Container, NodeAffinity, NodeSelector, NodeSelectorOperator, NodeSelectorRequirement,
    NodeSelectorTerm, Pod, PodSpec, ResourceRequirements, Toleration, TolerationOperator,
    TopologySpreadConstraint, UnsatisfiableAction,
};
pub use pool::{GpuClusterPool, GpuPool, PoolCapacity, PoolScheduling, PoolScope, PoolSpec, PoolStatus, SchedulingStrategy};
pub use quantity::{Quantity, QuantityError};
pub use selector::{LabelSelector, SelectorError, SelectorOperator, SelectorRequirement};
