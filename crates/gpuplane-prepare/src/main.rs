//! gpuplane node agent: hosts the per-node preparation pipeline.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "gpud-node-agent", about = "gpuplane per-node preparation agent")]
struct Args {
    /// Path of the claim preparation checkpoint file.
    #[arg(long, env = "GPUD_CHECKPOINT_PATH", default_value = "/var/lib/gpud/prepared-claims.json")]
    checkpoint_path: std::path::PathBuf,

    /// Node this agent runs on.
    #[arg(long, env = "GPUD_NODE_NAME")]
    node_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::info!(
        node = %args.node_name,
        checkpoint = %args.checkpoint_path.display(),
        "gpuplane node agent starting"
    );

    let store = gpuplane_prepare::FileCheckpointStore::new(&args.checkpoint_path);
    let checkpoint = gpuplane_prepare::ports::CheckpointStore::load(&store).await?;
    tracing::info!(claims = checkpoint.claims.len(), "checkpoint loaded");

    Ok(())
}
