//! Durable per-node record of claim preparation state.
//!
//! The checkpoint is the commit frontier of the preparation pipeline: it is
//! written after hardware mutations and before device injection, so a crash
//! leaves a record the next run can resume from without repeating hardware
//! calls.

use crate::prepare::{SharingStrategy, TimeSliceInterval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current checkpoint schema version. Readers reject anything greater.
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Preparation progress of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimState {
    /// Hardware operations have run; device injection not yet recorded.
    Started,
    /// Fully prepared, result reconstructable from the record.
    Completed,
}

/// MIG instance state recorded for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedMigState {
    /// UUID the MIG manager assigned.
    pub device_uuid: String,
    /// Profile that was instantiated.
    pub profile: String,
    /// PCI address of the parent physical GPU.
    pub parent_pci_address: String,
}

/// VFIO binding state recorded for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedVfioState {
    /// PCI address rebound to the pass-through driver.
    pub pci_address: String,
}

/// MPS daemon state shared by a sharing group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedMpsState {
    /// Stable identifier of the control daemon.
    pub control_id: String,
    /// Daemon pipe directory on the host.
    pub pipe_dir: String,
    /// Daemon shared-memory directory on the host.
    pub shm_dir: String,
    /// Daemon log directory on the host.
    pub log_dir: String,
}

/// Sharing state recorded for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSharing {
    /// Strategy that was applied.
    pub strategy: SharingStrategy,
    /// UUID of the device the strategy was applied to.
    pub device_uuid: String,
    /// Slice length, present for time-slicing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slice_interval: Option<TimeSliceInterval>,
    /// Daemon state, present for MPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mps: Option<PreparedMpsState>,
}

/// Everything recorded about one device of a claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreparedDeviceState {
    /// Request line the device satisfies.
    pub request: String,
    /// Pool the device came from.
    pub pool: String,
    /// Canonical device name.
    pub device: String,
    /// Injection IDs, recorded once the CDI spec is written.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cdi_device_ids: Vec<String>,
    /// MIG state, when the device is a MIG slice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mig: Option<PreparedMigState>,
    /// VFIO state, when the device is passed through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vfio: Option<PreparedVfioState>,
    /// Sharing state, when a strategy was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharing: Option<PreparedSharing>,
}

/// Per-claim checkpoint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedClaim {
    /// Progress marker.
    pub state: ClaimState,
    /// Per-device records.
    pub devices: Vec<PreparedDeviceState>,
}

/// The whole on-disk document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareCheckpoint {
    /// Schema tag for forward/backward compatibility.
    pub version: u32,
    /// Claim UID to record.
    pub claims: BTreeMap<String, PreparedClaim>,
}

impl Default for PrepareCheckpoint {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_SCHEMA_VERSION,
            claims: BTreeMap::new(),
        }
    }
}

impl PrepareCheckpoint {
    /// Record for `claim_uid`, if any.
    pub fn claim(&self, claim_uid: &str) -> Option<&PreparedClaim> {
        self.claims.get(claim_uid)
    }

    /// Insert or replace the record for `claim_uid`.
    pub fn put_claim(&mut self, claim_uid: &str, claim: PreparedClaim) {
        self.claims.insert(claim_uid.to_string(), claim);
    }

    /// Drop the record for `claim_uid`; true when something was removed.
    pub fn remove_claim(&mut self, claim_uid: &str) -> bool {
        self.claims.remove(claim_uid).is_some()
    }
}
