//! gpuplane preparation pipeline: transforms the hardware state of a node so
//! a claim's devices are ready for consumption, checkpointing at each commit
//! boundary so replay after a crash is idempotent.

pub mod checkpoint_store;
pub mod error;
pub mod lock;
pub mod notify;
pub mod pipeline;
pub mod ports;
pub mod sharing;
pub mod state;

pub use checkpoint_store::FileCheckpointStore;
pub use error::{CheckpointError, HardwareError, PrepareError};
pub use lock::PrepareLock;
pub use notify::ChannelNotifier;
pub use pipeline::{PipelinePorts, PreparePipeline};
pub use ports::{
    CdiWriter, CheckpointStore, GpuProcessChecker, MigManager, MigPrepareRequest,
    MigPrepareResponse, MpsManager, MpsRuntimeDirs, MpsStartRequest, ResourcesChangedNotifier,
    TimeSlicingManager, VfioManager,
};
pub use state::{PrepareState, UnprepareState};
