//! Recording mock implementations of the preparation-pipeline ports.

use async_trait::async_trait;
use gpuplane_model::{
    PrepareCheckpoint, PrepareRequest, PreparedMigState, PreparedVfioState, TimeSliceInterval,
};
use gpuplane_prepare::{
    CdiWriter, CheckpointStore, GpuProcessChecker, HardwareError, MigManager, MigPrepareRequest,
    MigPrepareResponse, MpsManager, MpsRuntimeDirs, MpsStartRequest, ResourcesChangedNotifier,
    TimeSlicingManager,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Every observable interaction with a port.
#[derive(Debug, Clone, PartialEq)]
pub enum PortCall {
    MigPrepare(MigPrepareRequest),
    MigUnprepare(PreparedMigState),
    VfioPrepare(String),
    VfioUnprepare(PreparedVfioState),
    MpsStart(MpsStartRequest),
    MpsStop(String),
    SetTimeSlice(Vec<String>, TimeSliceInterval),
    /// Carries the request as seen by the CDI writer, attribute propagation
    /// included.
    CdiWrite(PrepareRequest),
    CdiDelete(String),
    EnsureGpuFree(String),
}

/// One mock standing in for every hardware manager.
#[derive(Default)]
pub struct MockHardware {
    calls: Mutex<Vec<PortCall>>,
    mig_counter: AtomicU32,
    /// Injection IDs keyed by device name; devices not listed get
    /// `gpu.example.com/dev=<name>`.
    pub cdi_ids: Mutex<BTreeMap<String, Vec<String>>>,
    /// When set, `CdiWriter::write` omits every listed device.
    pub cdi_omit: Mutex<Vec<String>>,
    /// When set, MPS start fails.
    pub fail_mps: std::sync::atomic::AtomicBool,
}

impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PortCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: PortCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MigManager for MockHardware {
    async fn prepare(&self, request: MigPrepareRequest) -> Result<MigPrepareResponse, HardwareError> {
        self.record(PortCall::MigPrepare(request));
        let n = self.mig_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MigPrepareResponse {
            device_uuid: format!("MIG-{n}"),
        })
    }

    async fn unprepare(&self, state: &PreparedMigState) -> Result<(), HardwareError> {
        self.record(PortCall::MigUnprepare(state.clone()));
        Ok(())
    }
}

#[async_trait]
impl gpuplane_prepare::ports::VfioManager for MockHardware {
    async fn prepare(&self, pci_address: &str) -> Result<(), HardwareError> {
        self.record(PortCall::VfioPrepare(pci_address.to_string()));
        Ok(())
    }

    async fn unprepare(&self, state: &PreparedVfioState) -> Result<(), HardwareError> {
        self.record(PortCall::VfioUnprepare(state.clone()));
        Ok(())
    }
}

#[async_trait]
impl MpsManager for MockHardware {
    async fn start(&self, request: MpsStartRequest) -> Result<MpsRuntimeDirs, HardwareError> {
        if self.fail_mps.load(Ordering::SeqCst) {
            return Err(HardwareError::new("mps daemon refused to start"));
        }
        let control_id = request.control_id.clone();
        self.record(PortCall::MpsStart(request));
        Ok(MpsRuntimeDirs {
            pipe_dir: format!("/var/run/mps/{control_id}/pipe"),
            shm_dir: format!("/var/run/mps/{control_id}/shm"),
            log_dir: format!("/var/log/mps/{control_id}"),
        })
    }

    async fn stop(&self, control_id: &str) -> Result<(), HardwareError> {
        self.record(PortCall::MpsStop(control_id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl TimeSlicingManager for MockHardware {
    async fn set_time_slice(
        &self,
        device_uuids: &[String],
        interval: TimeSliceInterval,
    ) -> Result<(), HardwareError> {
        self.record(PortCall::SetTimeSlice(device_uuids.to_vec(), interval));
        Ok(())
    }
}

#[async_trait]
impl CdiWriter for MockHardware {
    async fn write(&self, request: &PrepareRequest) -> Result<BTreeMap<String, Vec<String>>, HardwareError> {
        self.record(PortCall::CdiWrite(request.clone()));
        let omitted = self.cdi_omit.lock().unwrap().clone();
        let configured = self.cdi_ids.lock().unwrap().clone();
        Ok(request
            .devices
            .iter()
            .filter(|d| !omitted.contains(&d.device))
            .map(|d| {
                let ids = configured
                    .get(&d.device)
                    .cloned()
                    .unwrap_or_else(|| vec![format!("gpu.example.com/dev={}", d.device)]);
                (d.device.clone(), ids)
            })
            .collect())
    }

    async fn delete(&self, claim_uid: &str) -> Result<(), HardwareError> {
        self.record(PortCall::CdiDelete(claim_uid.to_string()));
        Ok(())
    }
}

#[async_trait]
impl GpuProcessChecker for MockHardware {
    async fn ensure_gpu_free(&self, pci_address: &str) -> Result<(), HardwareError> {
        self.record(PortCall::EnsureGpuFree(pci_address.to_string()));
        Ok(())
    }
}

/// In-memory checkpoint store.
#[derive(Default)]
pub struct MemCheckpointStore {
    inner: tokio::sync::Mutex<PrepareCheckpoint>,
}

impl MemCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, checkpoint: PrepareCheckpoint) {
        *self.inner.lock().await = checkpoint;
    }

    pub async fn snapshot(&self) -> PrepareCheckpoint {
        self.inner.lock().await.clone()
    }
}

#[async_trait]
impl CheckpointStore for MemCheckpointStore {
    async fn load(&self) -> Result<PrepareCheckpoint, gpuplane_prepare::CheckpointError> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, checkpoint: &PrepareCheckpoint) -> Result<(), gpuplane_prepare::CheckpointError> {
        *self.inner.lock().await = checkpoint.clone();
        Ok(())
    }
}

/// Notifier that counts invocations.
#[derive(Default)]
pub struct CountingNotifier {
    count: AtomicUsize,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ResourcesChangedNotifier for CountingNotifier {
    fn notify(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
