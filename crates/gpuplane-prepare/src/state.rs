//! Per-claim state flowing through the pipeline.

use gpuplane_model::{
    PrepareCheckpoint, PrepareRequest, PrepareResult, PreparedClaim, PreparedDeviceState,
};
use std::collections::BTreeMap;
use tokio::sync::OwnedMutexGuard;

/// State threaded through the prepare steps.
pub struct PrepareState {
    /// The request as received; never mutated.
    pub request: PrepareRequest,
    /// Working copy; steps propagate assigned identifiers (MIG UUIDs, MPS
    /// runtime dirs) into its device attributes so later steps see them.
    pub mutable_request: PrepareRequest,
    /// Checkpoint as loaded, updated at commit boundaries.
    pub checkpoint: PrepareCheckpoint,
    /// Existing record for this claim, if one was checkpointed.
    pub claim: Option<PreparedClaim>,
    /// Canonical device name to index into `request.devices`.
    pub device_map: BTreeMap<String, usize>,
    /// Per-device progress, parallel to `request.devices`.
    pub device_states: Vec<PreparedDeviceState>,
    /// Monotonic: set once any hardware or checkpoint mutation happened.
    pub resources_changed: bool,
    /// The result under construction.
    pub result: Option<PrepareResult>,
    /// Node-lock guard; dropping it releases the lock on every exit path.
    pub unlock: Option<OwnedMutexGuard<()>>,
    /// Set when the claim short-circuits; remaining steps become no-ops.
    pub skip: bool,
}

impl PrepareState {
    pub fn new(request: PrepareRequest) -> Self {
        let mutable_request = request.clone();
        Self {
            request,
            mutable_request,
            checkpoint: PrepareCheckpoint::default(),
            claim: None,
            device_map: BTreeMap::new(),
            device_states: Vec::new(),
            resources_changed: false,
            result: None,
            unlock: None,
            skip: false,
        }
    }
}

/// State threaded through the unprepare steps.
pub struct UnprepareState {
    /// Claim being torn down.
    pub claim_uid: String,
    /// Checkpoint as loaded.
    pub checkpoint: PrepareCheckpoint,
    /// Record for the claim, if any.
    pub claim: Option<PreparedClaim>,
    /// Monotonic: set once anything was torn down or erased.
    pub resources_changed: bool,
    /// Node-lock guard.
    pub unlock: Option<OwnedMutexGuard<()>>,
    /// Set when teardown is skipped (no record, no devices, or the claim
    /// never completed); checkpoint cleanup still runs.
    pub skip: bool,
}

impl UnprepareState {
    pub fn new(claim_uid: &str) -> Self {
        Self {
            claim_uid: claim_uid.to_string(),
            checkpoint: PrepareCheckpoint::default(),
            claim: None,
            resources_changed: false,
            unlock: None,
            skip: false,
        }
    }
}
