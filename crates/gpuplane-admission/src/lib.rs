//! gpuplane workload admission: rewrites incoming pods so they land on the
//! nodes of the pool they request, and validates them against pool state.

pub mod mutate;
pub mod review;
pub mod select;
pub mod server;
pub mod validate;

pub use mutate::mutate_pod;
pub use review::{AdmissionRequest, AdmissionResponse, Operation, PatchOp};
pub use select::{select_pool, PoolRequest};
pub use validate::validate_pod;
