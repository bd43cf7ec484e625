//! The node-wide preparation lock.
//!
//! The only global resource in the core. Acquisition hands out an owned
//! guard that is attached to the per-claim state, so release happens on
//! every exit path.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes all claim preparation on one node.
#[derive(Clone, Default)]
pub struct PrepareLock {
    inner: Arc<Mutex<()>>,
}

impl PrepareLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire; the returned guard releases on drop.
    pub async fn lock(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.inner).lock_owned().await
    }
}
