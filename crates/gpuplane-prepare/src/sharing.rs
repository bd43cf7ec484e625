//! Sharing-group bookkeeping: grouping keys, control-ID derivation and the
//! deduplication rules.

use gpuplane_model::{DeviceType, MpsConfig};
use sha2::{Digest, Sha256};

/// Grouping key for MPS: device type plus the first 8 hex chars of the
/// config digest, so byte-identical configs share one daemon.
pub fn mps_group_key(device_type: DeviceType, config: &MpsConfig) -> String {
    let encoded = serde_json::to_vec(config).unwrap_or_default();
    let digest = hex::encode(Sha256::digest(&encoded));
    format!("{}-{}", device_type, &digest[..8])
}

/// Stable control-daemon identifier:
/// `<claim_uid>-<sha256(claim_uid|group_key|sorted_uuids)[0..6]>`.
pub fn derive_control_id(claim_uid: &str, group_key: &str, sorted_uuids: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(claim_uid.as_bytes());
    hasher.update(b"|");
    hasher.update(group_key.as_bytes());
    for uuid in sorted_uuids {
        hasher.update(b"|");
        hasher.update(uuid.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", claim_uid, &digest[..6])
}

/// Deduplicate preserving first-seen order.
pub fn dedup_first_seen<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

/// Sorted, deduplicated copy.
pub fn dedup_sorted(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = items.to_vec();
    out.sort();
    out.dedup();
    out
}
