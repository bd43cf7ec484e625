//! The module-config reconciler: the snapshot store's single writer.

use crate::config::ModuleConfig;
use crate::error::ConfigError;
use crate::snapshot::ConfigSnapshotStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Parses incoming configuration documents and swaps the process-wide
/// snapshot. Exactly one of these exists per process.
pub struct ModuleConfigReconciler {
    store: Arc<ConfigSnapshotStore>,
}

impl ModuleConfigReconciler {
    pub fn new(store: Arc<ConfigSnapshotStore>) -> Self {
        Self { store }
    }

    /// Parse, validate and publish a new document. A malformed document is
    /// rejected and the previous snapshot stays in effect.
    pub fn apply_document(&self, doc: &str) -> Result<(), ConfigError> {
        let config = match ModuleConfig::from_yaml(doc) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "rejecting module config update");
                return Err(e);
            }
        };
        self.store.store(config);
        info!(generation = self.store.generation(), "module config applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_apply_valid_document() {
        let store = Arc::new(ConfigSnapshotStore::default());
        let reconciler = ModuleConfigReconciler::new(Arc::clone(&store));
        reconciler.apply_document("logLevel: Debug\n").unwrap();
        assert_eq!(store.load().log_level, LogLevel::Debug);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_rejected_document_keeps_previous_snapshot() {
        let store = Arc::new(ConfigSnapshotStore::default());
        let reconciler = ModuleConfigReconciler::new(Arc::clone(&store));
        reconciler.apply_document("logLevel: Debug\n").unwrap();

        assert!(reconciler.apply_document("logLevel: Shouting\n").is_err());
        assert_eq!(store.load().log_level, LogLevel::Debug);
        assert_eq!(store.generation(), 1);
    }
}
