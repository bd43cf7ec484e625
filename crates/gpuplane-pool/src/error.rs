//! Error types for the pool controller.

use thiserror::Error;

/// Errors surfaced by pool reconciliation.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Cross-scope pool-name collision.
    #[error("pool name {name:?} already taken by {holder}")]
    NameConflict { name: String, holder: String },

    /// Pool selector failed validation.
    #[error("pool selector: {0}")]
    InvalidSelector(#[from] gpuplane_api::SelectorError),

    /// Optimistic-concurrency write lost; retry via requeue.
    #[error("stale write on {kind} {name:?}")]
    StaleWrite { kind: &'static str, name: String },
}
