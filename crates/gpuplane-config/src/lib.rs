//! Module configuration: the single root document every component reads its
//! knobs from, plus the copy-on-write snapshot store.

pub mod config;
pub mod error;
pub mod reconciler;
pub mod snapshot;

pub use config::{
    ApprovalMode, CertManagerOptions, CustomCertificateOptions, DeviceApproval, HttpsMode,
    HttpsOptions, InventoryOptions, LogLevel, ManagedNodes, ModuleConfig, Monitoring, Placement,
    SchedulingDefaults,
};
pub use error::ConfigError;
pub use reconciler::ModuleConfigReconciler;
pub use snapshot::ConfigSnapshotStore;
