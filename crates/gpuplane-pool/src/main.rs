//! gpuplane controller: hosts the pool reconcilers.

use clap::Parser;
use gpuplane_pool::{ClusterCache, FieldIndexes, PoolReconciler, ReconcileQueue};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "gpud-controller", about = "gpuplane pool controller")]
struct Args {
    /// Path of the module configuration document.
    #[arg(long, env = "GPUD_MODULE_CONFIG")]
    module_config: Option<std::path::PathBuf>,

    /// Number of concurrent reconcile workers.
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.module_config {
        Some(path) => {
            let doc = std::fs::read_to_string(path)?;
            gpuplane_config::ModuleConfig::from_yaml(&doc)?
        }
        None => gpuplane_config::ModuleConfig::default(),
    };
    let snapshots = Arc::new(gpuplane_config::ConfigSnapshotStore::new(config));

    let cache = Arc::new(ClusterCache::new());
    let indexes = Arc::new(FieldIndexes::new());
    let reconciler = Arc::new(PoolReconciler::new(Arc::clone(&cache), Arc::clone(&indexes)));
    let queue = ReconcileQueue::new();

    tracing::info!(
        workers = args.workers,
        log_level = ?snapshots.load().log_level,
        "gpuplane controller starting"
    );

    queue
        .run(args.workers, move |key| {
            let reconciler = Arc::clone(&reconciler);
            async move {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                reconciler
                    .reconcile(&key, now)
                    .await
                    .map_err(anyhow::Error::from)
            }
        })
        .await;

    Ok(())
}
