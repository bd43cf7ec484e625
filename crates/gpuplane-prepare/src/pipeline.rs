//! The preparation pipeline: an ordered chain of deterministic steps with a
//! checkpoint written at each commit boundary.
//!
//! Prepare runs validate → lock → load checkpoint → short-circuit → plan →
//! gpu free check → mig prepare → vfio prepare → sharing prepare → save
//! started → write cdi → save completed → notify → final. Unprepare mirrors
//! it in reverse. Replay after a partial crash observes the per-device state
//! in the checkpoint and skips hardware operations that already ran.

use crate::error::{HardwareError, PrepareError};
use crate::lock::PrepareLock;
use crate::ports::{
    CdiWriter, CheckpointStore, GpuProcessChecker, MigManager, MigPrepareRequest, MpsManager,
    MpsStartRequest, ResourcesChangedNotifier, TimeSlicingManager, VfioManager,
};
use crate::sharing::{dedup_first_seen, dedup_sorted, derive_control_id, mps_group_key};
use crate::state::{PrepareState, UnprepareState};
use gpuplane_model::attrs::{
    ATTR_DEVICE_TYPE, ATTR_GPU_UUID, ATTR_MIG_PROFILE, ATTR_MIG_UUID, ATTR_MPS_LOG_DIR,
    ATTR_MPS_PIPE_DIR, ATTR_MPS_SHM_DIR, ATTR_PCI_ADDRESS,
};
use gpuplane_model::{
    ClaimState, DeviceConfig, DeviceType, MpsConfig, PrepareDevice, PrepareRequest, PrepareResult,
    PreparedClaim, PreparedDeviceResult, PreparedDeviceState, PreparedMigState, PreparedMpsState,
    PreparedSharing, PreparedVfioState, SharingStrategy, TimeSliceInterval, UnprepareRequest,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything the pipeline needs from the outside world.
pub struct PipelinePorts {
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub cdi: Arc<dyn CdiWriter>,
    pub gpu_processes: Arc<dyn GpuProcessChecker>,
    pub time_slicing: Arc<dyn TimeSlicingManager>,
    pub mps: Arc<dyn MpsManager>,
    /// Absent on nodes without MIG support.
    pub mig: Option<Arc<dyn MigManager>>,
    /// Absent on nodes without VFIO support.
    pub vfio: Option<Arc<dyn VfioManager>>,
    pub notifier: Arc<dyn ResourcesChangedNotifier>,
}

/// The per-node preparation pipeline.
pub struct PreparePipeline {
    ports: PipelinePorts,
    lock: PrepareLock,
}

impl PreparePipeline {
    pub fn new(ports: PipelinePorts) -> Self {
        Self {
            ports,
            lock: PrepareLock::new(),
        }
    }

    /// Prepare a claim's devices; idempotent against the checkpoint.
    pub async fn prepare(&self, request: PrepareRequest) -> Result<PrepareResult, PrepareError> {
        let claim_uid = request.claim_uid.clone();
        let mut state = PrepareState::new(request);

        self.validate(&state)?;
        state.unlock = Some(self.lock.lock().await);
        self.load_checkpoint(&mut state).await?;
        self.short_circuit(&mut state);
        self.plan(&mut state)?;
        self.gpu_free_check(&mut state).await?;
        self.mig_prepare(&mut state).await?;
        self.vfio_prepare(&mut state).await?;
        self.sharing_prepare(&mut state).await?;
        self.save_checkpoint(&mut state, ClaimState::Started).await?;
        self.write_cdi(&mut state).await?;
        self.save_checkpoint(&mut state, ClaimState::Completed).await?;
        self.notify_resources(state.resources_changed);

        drop(state.unlock.take());
        let result = state.result.expect("short-circuit or cdi write set the result");
        info!(claim_uid = %claim_uid, devices = result.devices.len(), "claim prepared");
        Ok(result)
    }

    /// Tear a claim down; the inverse chain in reverse order.
    pub async fn unprepare(&self, request: UnprepareRequest) -> Result<(), PrepareError> {
        let mut state = UnprepareState::new(&request.claim_uid);

        state.unlock = Some(self.lock.lock().await);
        self.load_unprepare_checkpoint(&mut state).await?;
        self.delete_cdi(&mut state).await?;
        self.mps_stop(&mut state).await?;
        self.time_slicing_reset(&mut state).await?;
        self.vfio_unprepare(&mut state).await?;
        self.mig_unprepare(&mut state).await?;
        self.cleanup_checkpoint(&mut state).await?;
        self.notify_resources(state.resources_changed);

        drop(state.unlock.take());
        info!(claim_uid = %request.claim_uid, "claim unprepared");
        Ok(())
    }

    // --- prepare steps ---

    fn validate(&self, state: &PrepareState) -> Result<(), PrepareError> {
        if state.request.claim_uid.trim().is_empty() {
            return Err(PrepareError::InvalidRequest("claim UID must not be empty".into()));
        }
        if state.request.devices.is_empty() {
            return Err(PrepareError::InvalidRequest(
                "request must carry at least one device".into(),
            ));
        }
        Ok(())
    }

    async fn load_checkpoint(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        state.checkpoint = self.ports.checkpoints.load().await?;
        state.claim = state.checkpoint.claim(&state.request.claim_uid).cloned();
        Ok(())
    }

    /// A completed record means the whole pipeline already ran; reconstruct
    /// the result and finish without touching any manager.
    fn short_circuit(&self, state: &mut PrepareState) {
        let Some(claim) = &state.claim else { return };
        if claim.state != ClaimState::Completed {
            return;
        }
        debug!(claim_uid = %state.request.claim_uid, "claim already completed, short-circuiting");
        state.result = Some(result_from_devices(&state.request.claim_uid, &claim.devices));
        state.skip = true;
    }

    /// Validate per-device invariants and seed per-device state from any
    /// pre-existing checkpoint record.
    fn plan(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        const STEP: &str = "plan";
        if state.skip {
            return Ok(());
        }
        for (i, device) in state.request.devices.iter().enumerate() {
            let ty = device_type_of(device);
            if state.request.vfio {
                if ty != Some(DeviceType::Physical) {
                    return Err(PrepareError::precondition(
                        STEP,
                        &device.device,
                        "VFIO pass-through requires a physical device",
                    ));
                }
                if device.share_id.is_some() || !device.consumed_capacity.is_empty() {
                    return Err(PrepareError::precondition(
                        STEP,
                        &device.device,
                        "VFIO pass-through requires exclusive allocation",
                    ));
                }
                if self.ports.vfio.is_none() {
                    return Err(PrepareError::precondition(
                        STEP,
                        &device.device,
                        "no VFIO manager available on this node",
                    ));
                }
            }
            if ty == Some(DeviceType::Mig) && self.ports.mig.is_none() {
                return Err(PrepareError::precondition(
                    STEP,
                    &device.device,
                    "no MIG manager available on this node",
                ));
            }

            state.device_map.insert(device.device.clone(), i);
            let seeded = state
                .claim
                .as_ref()
                .and_then(|claim| {
                    claim
                        .devices
                        .iter()
                        .find(|d| d.request == device.request && d.device == device.device)
                        .cloned()
                })
                .unwrap_or_else(|| PreparedDeviceState {
                    request: device.request.clone(),
                    pool: device.pool.clone(),
                    device: device.device.clone(),
                    ..Default::default()
                });
            state.device_states.push(seeded);
        }
        Ok(())
    }

    /// For VFIO requests, require every referenced GPU to be idle.
    async fn gpu_free_check(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        const STEP: &str = "gpu free check";
        if state.skip || !state.request.vfio {
            return Ok(());
        }
        let mut addresses = Vec::new();
        for device in &state.request.devices {
            let pci = device.attributes.get(ATTR_PCI_ADDRESS);
            if pci.is_empty() {
                return Err(PrepareError::precondition(
                    STEP,
                    &device.device,
                    "device has no PCI address attribute",
                ));
            }
            addresses.push(pci);
        }
        for pci in dedup_first_seen(addresses) {
            self.ports
                .gpu_processes
                .ensure_gpu_free(&pci)
                .await
                .map_err(|e| PrepareError::hardware(STEP, &pci, e))?;
        }
        Ok(())
    }

    /// Instantiate MIG devices that have no prepared state yet; propagate the
    /// assigned UUID into the mutable request either way.
    async fn mig_prepare(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        const STEP: &str = "mig prepare";
        if state.skip {
            return Ok(());
        }
        for i in 0..state.request.devices.len() {
            let device = &state.request.devices[i];
            if device_type_of(device) != Some(DeviceType::Mig) {
                continue;
            }
            if state.device_states[i].mig.is_none() {
                let Some(manager) = self.ports.mig.as_ref() else {
                    return Err(PrepareError::precondition(
                        STEP,
                        &device.device,
                        "no MIG manager available on this node",
                    ));
                };
                let request = mig_request_from(STEP, device)?;
                let profile = request.profile.clone();
                let parent = request.parent_pci_address.clone();
                let response = manager
                    .prepare(request)
                    .await
                    .map_err(|e| PrepareError::hardware(STEP, &device.device, e))?;
                debug!(device = %device.device, mig_uuid = %response.device_uuid, "MIG instance ready");
                state.device_states[i].mig = Some(PreparedMigState {
                    device_uuid: response.device_uuid,
                    profile,
                    parent_pci_address: parent,
                });
                state.resources_changed = true;
            }
            let Some(prepared) = state.device_states[i].mig.as_ref() else {
                continue;
            };
            let uuid = prepared.device_uuid.clone();
            state.mutable_request.devices[i].attributes.set(ATTR_MIG_UUID, uuid);
        }
        Ok(())
    }

    /// Rebind VFIO-eligible physical devices that are not yet bound.
    async fn vfio_prepare(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        const STEP: &str = "vfio prepare";
        if state.skip || !state.request.vfio {
            return Ok(());
        }
        for i in 0..state.request.devices.len() {
            if state.device_states[i].vfio.is_some() {
                continue;
            }
            let device = &state.request.devices[i];
            let pci = device.attributes.get(ATTR_PCI_ADDRESS);
            let Some(manager) = self.ports.vfio.as_ref() else {
                return Err(PrepareError::precondition(
                    STEP,
                    &device.device,
                    "no VFIO manager available on this node",
                ));
            };
            manager
                .prepare(&pci)
                .await
                .map_err(|e| PrepareError::hardware(STEP, &device.device, e))?;
            state.device_states[i].vfio = Some(PreparedVfioState { pci_address: pci });
            state.resources_changed = true;
        }
        Ok(())
    }

    /// Apply sharing strategies group by group.
    async fn sharing_prepare(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        if state.skip {
            return Ok(());
        }
        self.time_slicing_prepare(state).await?;
        self.mps_prepare(state).await
    }

    async fn time_slicing_prepare(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        const STEP: &str = "time-slicing prepare";
        // Group members by interval.
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, device) in state.request.devices.iter().enumerate() {
            let Some(config) = device.config.as_ref() else { continue };
            if config.sharing_strategy() != SharingStrategy::TimeSlicing {
                continue;
            }
            if device_type_of(device) != Some(DeviceType::Physical) {
                return Err(PrepareError::precondition(
                    STEP,
                    &device.device,
                    "time-slicing requires a physical device",
                ));
            }
            let interval = config
                .sharing()
                .and_then(|s| s.time_slicing.as_ref())
                .and_then(|ts| ts.interval)
                .ok_or_else(|| {
                    PrepareError::precondition(STEP, &device.device, "time-slicing interval is not set")
                })?;
            groups
                .entry(format!("{interval:?}"))
                .or_default()
                .push(i);
        }

        for members in groups.values() {
            if members.iter().all(|&i| state.device_states[i].sharing.is_some()) {
                continue;
            }
            let interval = interval_of(&state.request.devices[members[0]])
                .expect("validated while grouping");
            let mut uuids = Vec::new();
            for &i in members {
                uuids.push(resolved_device_uuid(STEP, state, i)?);
            }
            let uuids = dedup_first_seen(uuids);
            self.ports
                .time_slicing
                .set_time_slice(&uuids, interval)
                .await
                .map_err(|e| {
                    PrepareError::hardware(STEP, &state.request.devices[members[0]].device, e)
                })?;
            state.resources_changed = true;
            for &i in members {
                if state.device_states[i].sharing.is_none() {
                    let device_uuid = resolved_device_uuid(STEP, state, i)?;
                    state.device_states[i].sharing = Some(PreparedSharing {
                        strategy: SharingStrategy::TimeSlicing,
                        device_uuid,
                        time_slice_interval: Some(interval),
                        mps: None,
                    });
                }
            }
        }
        Ok(())
    }

    async fn mps_prepare(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        const STEP: &str = "mps prepare";
        // Group members by (device type, config digest).
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, device) in state.request.devices.iter().enumerate() {
            let Some(config) = device.config.as_ref() else { continue };
            if config.sharing_strategy() != SharingStrategy::Mps {
                continue;
            }
            let ty = device_type_of(device).ok_or_else(|| {
                PrepareError::precondition(STEP, &device.device, "device has no device type attribute")
            })?;
            let mps_config = mps_config_of(config);
            groups.entry(mps_group_key(ty, &mps_config)).or_default().push(i);
        }

        for (group_key, members) in &groups {
            // Reuse the control ID of any member that already has one;
            // differing IDs inside a group mean the checkpoint is corrupt.
            let mut existing_id: Option<String> = None;
            for &i in members {
                if let Some(mps) = state.device_states[i].sharing.as_ref().and_then(|s| s.mps.as_ref()) {
                    match &existing_id {
                        Some(seen) if *seen != mps.control_id => {
                            return Err(PrepareError::ControlIdConflict {
                                first: seen.clone(),
                                second: mps.control_id.clone(),
                            });
                        }
                        _ => existing_id = Some(mps.control_id.clone()),
                    }
                }
            }

            let mut uuids = Vec::new();
            for &i in members {
                uuids.push(resolved_device_uuid(STEP, state, i)?);
            }
            let uuids = dedup_sorted(&uuids);

            let all_prepared = members.iter().all(|&i| state.device_states[i].sharing.is_some());
            let dirs = if all_prepared {
                // Replay: nothing to start, but the runtime dirs must still
                // reach the mutable request for the CDI write.
                let mps = state.device_states[members[0]]
                    .sharing
                    .as_ref()
                    .and_then(|s| s.mps.as_ref())
                    .expect("prepared MPS member has daemon state");
                crate::ports::MpsRuntimeDirs {
                    pipe_dir: mps.pipe_dir.clone(),
                    shm_dir: mps.shm_dir.clone(),
                    log_dir: mps.log_dir.clone(),
                }
            } else {
                let control_id = existing_id.clone().unwrap_or_else(|| {
                    derive_control_id(&state.request.claim_uid, group_key, &uuids)
                });
                let config = mps_config_of(
                    state.request.devices[members[0]]
                        .config
                        .as_ref()
                        .expect("grouped devices carry a config"),
                );
                let dirs = self
                    .ports
                    .mps
                    .start(MpsStartRequest {
                        control_id: control_id.clone(),
                        device_uuids: uuids.clone(),
                        config,
                    })
                    .await
                    .map_err(|e| {
                        PrepareError::hardware(STEP, &state.request.devices[members[0]].device, e)
                    })?;
                state.resources_changed = true;
                for &i in members {
                    if state.device_states[i].sharing.is_none() {
                        let device_uuid = resolved_device_uuid(STEP, state, i)?;
                        state.device_states[i].sharing = Some(PreparedSharing {
                            strategy: SharingStrategy::Mps,
                            device_uuid,
                            time_slice_interval: None,
                            mps: Some(PreparedMpsState {
                                control_id: control_id.clone(),
                                pipe_dir: dirs.pipe_dir.clone(),
                                shm_dir: dirs.shm_dir.clone(),
                                log_dir: dirs.log_dir.clone(),
                            }),
                        });
                    }
                }
                dirs
            };

            for &i in members {
                let attrs = &mut state.mutable_request.devices[i].attributes;
                attrs.set(ATTR_MPS_PIPE_DIR, dirs.pipe_dir.as_str());
                attrs.set(ATTR_MPS_SHM_DIR, dirs.shm_dir.as_str());
                attrs.set(ATTR_MPS_LOG_DIR, dirs.log_dir.as_str());
            }
        }
        Ok(())
    }

    async fn save_checkpoint(
        &self,
        state: &mut PrepareState,
        claim_state: ClaimState,
    ) -> Result<(), PrepareError> {
        if state.skip {
            return Ok(());
        }
        state.checkpoint.put_claim(
            &state.request.claim_uid,
            PreparedClaim {
                state: claim_state,
                devices: state.device_states.clone(),
            },
        );
        self.ports.checkpoints.save(&state.checkpoint).await?;
        Ok(())
    }

    /// Emit the per-claim injection spec and collect the device IDs.
    async fn write_cdi(&self, state: &mut PrepareState) -> Result<(), PrepareError> {
        const STEP: &str = "cdi write";
        if state.skip {
            return Ok(());
        }
        let ids = self
            .ports
            .cdi
            .write(&state.mutable_request)
            .await
            .map_err(|e| PrepareError::hardware(STEP, &state.request.claim_uid, e))?;
        for (i, device) in state.request.devices.iter().enumerate() {
            let device_ids = ids
                .get(&device.device)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| PrepareError::MissingCdiIds {
                    device: device.device.clone(),
                })?;
            state.device_states[i].cdi_device_ids = device_ids.clone();
        }
        state.result = Some(result_from_devices(
            &state.request.claim_uid,
            &state.device_states,
        ));
        Ok(())
    }

    fn notify_resources(&self, changed: bool) {
        if changed {
            self.ports.notifier.notify();
        }
    }

    // --- unprepare steps ---

    async fn load_unprepare_checkpoint(&self, state: &mut UnprepareState) -> Result<(), PrepareError> {
        state.checkpoint = self.ports.checkpoints.load().await?;
        state.claim = state.checkpoint.claim(&state.claim_uid).cloned();
        match &state.claim {
            None => state.skip = true,
            // An interrupted prepare never reached the completed frontier;
            // its hardware state is re-driven by a prepare retry, not torn
            // down here. The checkpoint entry is still cleaned up below.
            Some(claim) if claim.devices.is_empty() || claim.state == ClaimState::Started => {
                debug!(claim_uid = %state.claim_uid, "skipping teardown for incomplete claim");
                state.skip = true;
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn delete_cdi(&self, state: &mut UnprepareState) -> Result<(), PrepareError> {
        const STEP: &str = "cdi delete";
        if state.skip {
            return Ok(());
        }
        self.ports
            .cdi
            .delete(&state.claim_uid)
            .await
            .map_err(|e| PrepareError::hardware(STEP, &state.claim_uid, e))?;
        state.resources_changed = true;
        Ok(())
    }

    async fn mps_stop(&self, state: &mut UnprepareState) -> Result<(), PrepareError> {
        const STEP: &str = "mps stop";
        if state.skip {
            return Ok(());
        }
        let Some(claim) = state.claim.as_ref() else {
            return Ok(());
        };
        let control_ids = dedup_first_seen(
            claim
                .devices
                .iter()
                .filter_map(|d| d.sharing.as_ref())
                .filter_map(|s| s.mps.as_ref())
                .map(|m| m.control_id.clone()),
        );
        for control_id in control_ids {
            self.ports
                .mps
                .stop(&control_id)
                .await
                .map_err(|e| PrepareError::hardware(STEP, &control_id, e))?;
            state.resources_changed = true;
        }
        Ok(())
    }

    async fn time_slicing_reset(&self, state: &mut UnprepareState) -> Result<(), PrepareError> {
        const STEP: &str = "time-slicing reset";
        if state.skip {
            return Ok(());
        }
        let Some(claim) = state.claim.as_ref() else {
            return Ok(());
        };
        let uuids = dedup_first_seen(
            claim
                .devices
                .iter()
                .filter_map(|d| d.sharing.as_ref())
                .filter(|s| s.strategy == SharingStrategy::TimeSlicing)
                .map(|s| s.device_uuid.clone()),
        );
        if uuids.is_empty() {
            return Ok(());
        }
        self.ports
            .time_slicing
            .set_time_slice(&uuids, TimeSliceInterval::Default)
            .await
            .map_err(|e| PrepareError::hardware(STEP, &state.claim_uid, e))?;
        state.resources_changed = true;
        Ok(())
    }

    async fn vfio_unprepare(&self, state: &mut UnprepareState) -> Result<(), PrepareError> {
        const STEP: &str = "vfio unprepare";
        if state.skip {
            return Ok(());
        }
        let Some(claim) = state.claim.as_ref() else {
            return Ok(());
        };
        for device in &claim.devices {
            let Some(vfio_state) = &device.vfio else { continue };
            let manager = self.ports.vfio.as_ref().ok_or_else(|| {
                PrepareError::precondition(STEP, &device.device, "no VFIO manager available on this node")
            })?;
            manager
                .unprepare(vfio_state)
                .await
                .map_err(|e| PrepareError::hardware(STEP, &device.device, e))?;
            state.resources_changed = true;
        }
        Ok(())
    }

    async fn mig_unprepare(&self, state: &mut UnprepareState) -> Result<(), PrepareError> {
        const STEP: &str = "mig unprepare";
        if state.skip {
            return Ok(());
        }
        let Some(claim) = state.claim.as_ref() else {
            return Ok(());
        };
        for device in &claim.devices {
            let Some(mig_state) = &device.mig else { continue };
            let manager = self.ports.mig.as_ref().ok_or_else(|| {
                PrepareError::precondition(STEP, &device.device, "no MIG manager available on this node")
            })?;
            manager
                .unprepare(mig_state)
                .await
                .map_err(|e| PrepareError::hardware(STEP, &device.device, e))?;
            state.resources_changed = true;
        }
        Ok(())
    }

    /// Erase the claim from the checkpoint; runs even for skipped teardowns
    /// so interrupted prepares leave no residue.
    async fn cleanup_checkpoint(&self, state: &mut UnprepareState) -> Result<(), PrepareError> {
        if state.claim.is_none() {
            return Ok(());
        }
        state.checkpoint.remove_claim(&state.claim_uid);
        self.ports.checkpoints.save(&state.checkpoint).await?;
        state.resources_changed = true;
        Ok(())
    }
}

// --- helpers ---

/// Device type from attributes; comparisons are case-insensitive.
fn device_type_of(device: &PrepareDevice) -> Option<DeviceType> {
    DeviceType::parse(&device.attributes.get(ATTR_DEVICE_TYPE))
}

fn interval_of(device: &PrepareDevice) -> Option<TimeSliceInterval> {
    device
        .config
        .as_ref()
        .and_then(|c| c.sharing())
        .and_then(|s| s.time_slicing.as_ref())
        .and_then(|ts| ts.interval)
}

fn mps_config_of(config: &DeviceConfig) -> MpsConfig {
    config
        .sharing()
        .and_then(|s| s.mps.clone())
        .unwrap_or_default()
}

/// The hardware UUID a sharing strategy applies to, read from the mutable
/// request so MIG UUIDs assigned earlier in the run are visible.
fn resolved_device_uuid(
    step: &'static str,
    state: &PrepareState,
    index: usize,
) -> Result<String, PrepareError> {
    let device = &state.mutable_request.devices[index];
    let uuid = match device_type_of(device) {
        Some(DeviceType::Mig) => device.attributes.get(ATTR_MIG_UUID),
        _ => device.attributes.get(ATTR_GPU_UUID),
    };
    if uuid.is_empty() {
        return Err(PrepareError::precondition(
            step,
            &device.device,
            "device has no hardware UUID attribute",
        ));
    }
    Ok(uuid)
}

fn mig_request_from(step: &'static str, device: &PrepareDevice) -> Result<MigPrepareRequest, PrepareError> {
    let profile = match &device.config {
        Some(DeviceConfig::MigDevice(config)) if !config.profile.is_empty() => config.profile.clone(),
        _ => device.attributes.get(ATTR_MIG_PROFILE),
    };
    if profile.is_empty() {
        return Err(PrepareError::precondition(step, &device.device, "no MIG profile configured"));
    }
    let parent_pci_address = device.attributes.get(ATTR_PCI_ADDRESS);
    if parent_pci_address.is_empty() {
        return Err(PrepareError::precondition(
            step,
            &device.device,
            "device has no PCI address attribute",
        ));
    }
    Ok(MigPrepareRequest {
        profile,
        parent_pci_address,
        parent_uuid: device.attributes.get(ATTR_GPU_UUID),
    })
}

fn result_from_devices(claim_uid: &str, devices: &[PreparedDeviceState]) -> PrepareResult {
    PrepareResult {
        claim_uid: claim_uid.to_string(),
        devices: devices
            .iter()
            .map(|d| PreparedDeviceResult {
                request: d.request.clone(),
                pool: d.pool.clone(),
                device: d.device.clone(),
                cdi_device_ids: d.cdi_device_ids.clone(),
            })
            .collect(),
    }
}
