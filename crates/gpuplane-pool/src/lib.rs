//! gpuplane pool controller: reconciles pool objects against the device
//! inventory, maintains field indexes and relays filtered watch events into
//! a keyed reconcile queue.

pub mod cache;
pub mod controller;
pub mod error;
pub mod index;
pub mod mapper;
pub mod predicate;
pub mod publisher;
pub mod queue;
pub mod reconciler;

pub use cache::{ClusterCache, ObjectEvent, PodRecord};
pub use controller::WatchRelay;
pub use publisher::DevicePublisher;
pub use error::PoolError;
pub use index::FieldIndexes;
pub use mapper::pools_for_device_event;
pub use predicate::{device_event_relevant, validator_pod_event_relevant, WatchScope};
pub use queue::{ReconcileKey, ReconcileOutcome, ReconcileQueue};
pub use reconciler::{PoolObject, PoolReconciler};
