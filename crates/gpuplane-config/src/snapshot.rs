//! Process-wide module-config snapshot.
//!
//! Readers clone an `Arc` per event and must not retain it across events;
//! the single writer is the module-config reconciler.

use crate::config::ModuleConfig;
use parking_lot::RwLock;
use std::sync::Arc;

/// Copy-on-write holder of the current module configuration.
pub struct ConfigSnapshotStore {
    current: RwLock<Arc<ModuleConfig>>,
    generation: RwLock<u64>,
}

impl ConfigSnapshotStore {
    /// Store seeded with `initial`.
    pub fn new(initial: ModuleConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            generation: RwLock::new(0),
        }
    }

    /// The current snapshot. Cheap; safe to call per admission request.
    pub fn load(&self) -> Arc<ModuleConfig> {
        Arc::clone(&self.current.read())
    }

    /// Replace the snapshot. Only the module-config reconciler calls this.
    pub fn store(&self, config: ModuleConfig) {
        let mut generation = self.generation.write();
        *self.current.write() = Arc::new(config);
        *generation += 1;
        tracing::debug!(generation = *generation, "module config snapshot replaced");
    }

    /// Number of replacements so far.
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }
}

impl Default for ConfigSnapshotStore {
    fn default() -> Self {
        Self::new(ModuleConfig::default())
    }
}
