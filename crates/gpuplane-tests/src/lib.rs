//! gpuplane test & validation infrastructure.
//!
//! Recording mock implementations of the preparation-pipeline ports plus
//! integration tests spanning inventory, preparation, pool reconciliation
//! and admission.

pub mod admission_flow;
pub mod inventory_flow;
pub mod mocks;
pub mod pool_flow;
pub mod prepare_flow;

pub use mocks::{CountingNotifier, MemCheckpointStore, MockHardware, PortCall};
