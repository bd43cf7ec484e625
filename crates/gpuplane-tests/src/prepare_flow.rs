//! Integration tests for the preparation pipeline against recording mocks.

#[cfg(test)]
mod tests {
    use crate::mocks::{CountingNotifier, MemCheckpointStore, MockHardware, PortCall};
    use gpuplane_model::attrs::{
        ATTR_DEVICE_TYPE, ATTR_GPU_UUID, ATTR_MIG_PROFILE, ATTR_MIG_UUID, ATTR_MPS_PIPE_DIR,
        ATTR_PCI_ADDRESS,
    };
    use gpuplane_model::{
        AttributeMap, ClaimState, DeviceConfig, GpuConfig, MigDeviceConfig, MpsConfig,
        PrepareCheckpoint, PrepareDevice, PrepareRequest, PreparedClaim, PreparedDeviceState,
        PreparedMigState, PreparedSharing, SharingConfig, SharingStrategy, TimeSliceInterval,
        TimeSlicingConfig, UnprepareRequest, VfioDeviceConfig,
    };
    use gpuplane_prepare::{PipelinePorts, PrepareError, PreparePipeline};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct Rig {
        pipeline: PreparePipeline,
        hardware: Arc<MockHardware>,
        store: Arc<MemCheckpointStore>,
        notifier: Arc<CountingNotifier>,
    }

    fn rig() -> Rig {
        let hardware = Arc::new(MockHardware::new());
        let store = Arc::new(MemCheckpointStore::new());
        let notifier = Arc::new(CountingNotifier::new());
        let pipeline = PreparePipeline::new(PipelinePorts {
            checkpoints: store.clone(),
            cdi: hardware.clone(),
            gpu_processes: hardware.clone(),
            time_slicing: hardware.clone(),
            mps: hardware.clone(),
            mig: Some(hardware.clone()),
            vfio: Some(hardware.clone()),
            notifier: notifier.clone(),
        });
        Rig {
            pipeline,
            hardware,
            store,
            notifier,
        }
    }

    fn physical(name: &str, uuid: &str) -> PrepareDevice {
        let mut attributes = AttributeMap::new();
        attributes.set(ATTR_DEVICE_TYPE, "physical");
        attributes.set(ATTR_GPU_UUID, uuid);
        attributes.set(ATTR_PCI_ADDRESS, format!("0000:3b:00.{name}"));
        PrepareDevice {
            request: "r0".into(),
            pool: "p".into(),
            device: name.into(),
            share_id: None,
            consumed_capacity: BTreeMap::new(),
            attributes,
            config: Some(DeviceConfig::Gpu(GpuConfig::default())),
        }
    }

    fn mig(name: &str, profile: &str) -> PrepareDevice {
        let mut attributes = AttributeMap::new();
        attributes.set(ATTR_DEVICE_TYPE, "mig");
        attributes.set(ATTR_GPU_UUID, "GPU-parent");
        attributes.set(ATTR_PCI_ADDRESS, "0000:3b:00.0");
        attributes.set(ATTR_MIG_PROFILE, profile);
        PrepareDevice {
            request: "r0".into(),
            pool: "p".into(),
            device: name.into(),
            share_id: None,
            consumed_capacity: BTreeMap::new(),
            attributes,
            config: Some(DeviceConfig::MigDevice(MigDeviceConfig {
                profile: profile.into(),
                sharing: None,
            })),
        }
    }

    fn with_mps(mut device: PrepareDevice, percentage: i64) -> PrepareDevice {
        let sharing = Some(SharingConfig {
            strategy: SharingStrategy::Mps,
            time_slicing: None,
            mps: Some(MpsConfig {
                default_active_thread_percentage: Some(percentage),
                default_pinned_device_memory_limits: BTreeMap::new(),
            }),
        });
        device.config = Some(match device.config.take() {
            Some(DeviceConfig::MigDevice(mut c)) => {
                c.sharing = sharing;
                DeviceConfig::MigDevice(c)
            }
            _ => DeviceConfig::Gpu(GpuConfig { sharing }),
        });
        device
    }

    fn with_time_slicing(mut device: PrepareDevice, interval: TimeSliceInterval) -> PrepareDevice {
        device.config = Some(DeviceConfig::Gpu(GpuConfig {
            sharing: Some(SharingConfig {
                strategy: SharingStrategy::TimeSlicing,
                time_slicing: Some(TimeSlicingConfig {
                    interval: Some(interval),
                }),
                mps: None,
            }),
        }));
        device
    }

    fn request(claim: &str, vfio: bool, devices: Vec<PrepareDevice>) -> PrepareRequest {
        PrepareRequest {
            claim_uid: claim.into(),
            node_name: "n1".into(),
            vfio,
            devices,
        }
    }

    mod physical_only {
        use super::*;

        #[tokio::test]
        async fn test_prepare_without_sharing() {
            let rig = rig();
            rig.hardware
                .cdi_ids
                .lock()
                .unwrap()
                .insert("g0".into(), vec!["gpu/v=0".into()]);

            let result = rig
                .pipeline
                .prepare(request("c1", false, vec![physical("g0", "GPU-x")]))
                .await
                .unwrap();

            assert_eq!(result.claim_uid, "c1");
            assert_eq!(result.devices.len(), 1);
            assert_eq!(result.devices[0].pool, "p");
            assert_eq!(result.devices[0].device, "g0");
            assert_eq!(result.devices[0].cdi_device_ids, vec!["gpu/v=0"]);

            let checkpoint = rig.store.snapshot().await;
            assert_eq!(checkpoint.claim("c1").unwrap().state, ClaimState::Completed);

            // The only port touched is the CDI writer.
            let calls = rig.hardware.calls();
            assert_eq!(calls.len(), 1);
            assert!(matches!(calls[0], PortCall::CdiWrite(_)));
            // Nothing on the node changed, so the republisher stays quiet.
            assert_eq!(rig.notifier.count(), 0);
        }
    }

    mod mig_flow {
        use super::*;

        #[tokio::test]
        async fn test_mig_uuid_propagates_to_cdi_write() {
            let rig = rig();
            rig.pipeline
                .prepare(request("c1", false, vec![mig("m0", "1g.10gb")]))
                .await
                .unwrap();

            let calls = rig.hardware.calls();
            let mig_call = calls
                .iter()
                .find_map(|c| match c {
                    PortCall::MigPrepare(r) => Some(r.clone()),
                    _ => None,
                })
                .expect("MIG manager invoked");
            assert_eq!(mig_call.profile, "1g.10gb");
            assert_eq!(mig_call.parent_pci_address, "0000:3b:00.0");

            let cdi_request = calls
                .iter()
                .find_map(|c| match c {
                    PortCall::CdiWrite(r) => Some(r.clone()),
                    _ => None,
                })
                .expect("CDI writer invoked");
            assert_eq!(cdi_request.devices[0].attributes.get(ATTR_MIG_UUID), "MIG-1");

            let checkpoint = rig.store.snapshot().await;
            let state = &checkpoint.claim("c1").unwrap().devices[0];
            assert_eq!(state.mig.as_ref().unwrap().device_uuid, "MIG-1");
            assert_eq!(rig.notifier.count(), 1);
        }

        #[tokio::test]
        async fn test_started_claim_resumes_without_repeating_mig() {
            let rig = rig();
            let mut checkpoint = PrepareCheckpoint::default();
            checkpoint.put_claim(
                "c1",
                PreparedClaim {
                    state: ClaimState::Started,
                    devices: vec![PreparedDeviceState {
                        request: "r0".into(),
                        pool: "p".into(),
                        device: "m0".into(),
                        mig: Some(PreparedMigState {
                            device_uuid: "MIG-9".into(),
                            profile: "1g.10gb".into(),
                            parent_pci_address: "0000:3b:00.0".into(),
                        }),
                        ..Default::default()
                    }],
                },
            );
            rig.store.seed(checkpoint).await;

            let result = rig
                .pipeline
                .prepare(request("c1", false, vec![mig("m0", "1g.10gb")]))
                .await
                .unwrap();
            assert_eq!(result.devices.len(), 1);

            let calls = rig.hardware.calls();
            assert!(!calls.iter().any(|c| matches!(c, PortCall::MigPrepare(_))));
            let cdi_request = calls
                .iter()
                .find_map(|c| match c {
                    PortCall::CdiWrite(r) => Some(r.clone()),
                    _ => None,
                })
                .unwrap();
            assert_eq!(cdi_request.devices[0].attributes.get(ATTR_MIG_UUID), "MIG-9");

            let checkpoint = rig.store.snapshot().await;
            assert_eq!(checkpoint.claim("c1").unwrap().state, ClaimState::Completed);
        }
    }

    mod mps_grouping {
        use super::*;

        #[tokio::test]
        async fn test_identical_configs_share_one_daemon() {
            let rig = rig();
            rig.pipeline
                .prepare(request(
                    "c1",
                    false,
                    vec![
                        with_mps(physical("g1", "GPU-b"), 50),
                        with_mps(physical("g0", "GPU-a"), 50),
                    ],
                ))
                .await
                .unwrap();

            let starts: Vec<_> = rig
                .hardware
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    PortCall::MpsStart(r) => Some(r),
                    _ => None,
                })
                .collect();
            assert_eq!(starts.len(), 1);
            // Sorted, deduplicated union of the group's GPU UUIDs.
            assert_eq!(starts[0].device_uuids, vec!["GPU-a", "GPU-b"]);
            let control_id = &starts[0].control_id;
            assert!(control_id.starts_with("c1-"), "{control_id}");
            let suffix = &control_id["c1-".len()..];
            assert_eq!(suffix.len(), 6);
            assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        }

        #[tokio::test]
        async fn test_different_configs_get_separate_daemons() {
            let rig = rig();
            rig.pipeline
                .prepare(request(
                    "c1",
                    false,
                    vec![
                        with_mps(physical("g0", "GPU-a"), 50),
                        with_mps(physical("g1", "GPU-b"), 25),
                    ],
                ))
                .await
                .unwrap();
            let starts = rig
                .hardware
                .calls()
                .into_iter()
                .filter(|c| matches!(c, PortCall::MpsStart(_)))
                .count();
            assert_eq!(starts, 2);
        }

        #[tokio::test]
        async fn test_runtime_dirs_reach_cdi_write() {
            let rig = rig();
            rig.pipeline
                .prepare(request("c1", false, vec![with_mps(physical("g0", "GPU-a"), 50)]))
                .await
                .unwrap();
            let cdi_request = rig
                .hardware
                .calls()
                .into_iter()
                .find_map(|c| match c {
                    PortCall::CdiWrite(r) => Some(r),
                    _ => None,
                })
                .unwrap();
            assert!(!cdi_request.devices[0].attributes.get(ATTR_MPS_PIPE_DIR).is_empty());
        }

        #[tokio::test]
        async fn test_mps_failure_leaves_no_checkpoint_entry() {
            let rig = rig();
            rig.hardware.fail_mps.store(true, std::sync::atomic::Ordering::SeqCst);
            let result = rig
                .pipeline
                .prepare(request("c1", false, vec![with_mps(physical("g0", "GPU-a"), 50)]))
                .await;
            assert!(matches!(result, Err(PrepareError::Hardware { .. })));
            assert!(rig.store.snapshot().await.claim("c1").is_none());
        }
    }

    mod vfio_flow {
        use super::*;

        #[tokio::test]
        async fn test_vfio_prepare_checks_gpu_free_once_per_address() {
            let rig = rig();
            let mut a = physical("g0", "GPU-a");
            let mut b = physical("g1", "GPU-b");
            a.config = Some(DeviceConfig::VfioDevice(VfioDeviceConfig::default()));
            b.config = Some(DeviceConfig::VfioDevice(VfioDeviceConfig::default()));
            // Same physical card referenced twice.
            b.attributes.set(ATTR_PCI_ADDRESS, "0000:3b:00.g0");
            a.attributes.set(ATTR_PCI_ADDRESS, "0000:3b:00.g0");

            rig.pipeline
                .prepare(request("c1", true, vec![a, b]))
                .await
                .unwrap();

            let free_checks = rig
                .hardware
                .calls()
                .into_iter()
                .filter(|c| matches!(c, PortCall::EnsureGpuFree(_)))
                .count();
            assert_eq!(free_checks, 1);
        }

        #[tokio::test]
        async fn test_vfio_mig_request_rejected() {
            let rig = rig();
            let result = rig
                .pipeline
                .prepare(request("c1", true, vec![mig("m0", "1g.10gb")]))
                .await;
            assert!(matches!(
                result,
                Err(PrepareError::Precondition { step: "plan", .. })
            ));
            assert!(rig.hardware.calls().is_empty());
        }

        #[tokio::test]
        async fn test_vfio_round_trip() {
            let rig = rig();
            let mut device = physical("g0", "GPU-a");
            device.config = Some(DeviceConfig::VfioDevice(VfioDeviceConfig::default()));
            rig.pipeline
                .prepare(request("c1", true, vec![device]))
                .await
                .unwrap();
            rig.pipeline
                .unprepare(UnprepareRequest {
                    claim_uid: "c1".into(),
                })
                .await
                .unwrap();

            let calls = rig.hardware.calls();
            let prepares = calls.iter().filter(|c| matches!(c, PortCall::VfioPrepare(_))).count();
            let unprepares = calls
                .iter()
                .filter(|c| matches!(c, PortCall::VfioUnprepare(_)))
                .count();
            assert_eq!(prepares, 1);
            assert_eq!(unprepares, 1);
        }
    }

    mod time_slicing {
        use super::*;

        #[tokio::test]
        async fn test_interval_group_single_call() {
            let rig = rig();
            rig.pipeline
                .prepare(request(
                    "c1",
                    false,
                    vec![
                        with_time_slicing(physical("g0", "GPU-a"), TimeSliceInterval::Short),
                        with_time_slicing(physical("g1", "GPU-b"), TimeSliceInterval::Short),
                    ],
                ))
                .await
                .unwrap();
            let slices: Vec<_> = rig
                .hardware
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    PortCall::SetTimeSlice(uuids, interval) => Some((uuids, interval)),
                    _ => None,
                })
                .collect();
            assert_eq!(slices.len(), 1);
            assert_eq!(slices[0].0, vec!["GPU-a", "GPU-b"]);
            assert_eq!(slices[0].1, TimeSliceInterval::Short);
        }

        #[tokio::test]
        async fn test_unprepare_resets_to_default() {
            let rig = rig();
            rig.pipeline
                .prepare(request(
                    "c1",
                    false,
                    vec![with_time_slicing(physical("g0", "GPU-a"), TimeSliceInterval::Long)],
                ))
                .await
                .unwrap();
            rig.hardware.clear_calls();

            rig.pipeline
                .unprepare(UnprepareRequest {
                    claim_uid: "c1".into(),
                })
                .await
                .unwrap();
            let calls = rig.hardware.calls();
            assert!(calls.contains(&PortCall::SetTimeSlice(
                vec!["GPU-a".into()],
                TimeSliceInterval::Default
            )));
        }
    }

    mod idempotence {
        use super::*;

        #[tokio::test]
        async fn test_second_prepare_short_circuits() {
            let rig = rig();
            let req = request("c1", false, vec![mig("m0", "1g.10gb")]);
            let first = rig.pipeline.prepare(req.clone()).await.unwrap();
            let calls_after_first = rig.hardware.call_count();

            let second = rig.pipeline.prepare(req).await.unwrap();
            assert_eq!(first, second);
            // No port is touched after the first success.
            assert_eq!(rig.hardware.call_count(), calls_after_first);
        }

        #[tokio::test]
        async fn test_completed_checkpoint_blocks_all_manager_calls() {
            let rig = rig();
            let mut checkpoint = PrepareCheckpoint::default();
            checkpoint.put_claim(
                "c1",
                PreparedClaim {
                    state: ClaimState::Completed,
                    devices: vec![PreparedDeviceState {
                        request: "r0".into(),
                        pool: "p".into(),
                        device: "g0".into(),
                        cdi_device_ids: vec!["gpu/v=0".into()],
                        ..Default::default()
                    }],
                },
            );
            rig.store.seed(checkpoint).await;

            let result = rig
                .pipeline
                .prepare(request("c1", false, vec![physical("g0", "GPU-x")]))
                .await
                .unwrap();
            assert_eq!(result.devices[0].cdi_device_ids, vec!["gpu/v=0"]);
            assert!(rig.hardware.calls().is_empty());
            assert_eq!(rig.notifier.count(), 0);
        }
    }

    mod round_trip {
        use super::*;

        #[tokio::test]
        async fn test_prepare_unprepare_leaves_nothing_behind() {
            let rig = rig();
            rig.pipeline
                .prepare(request(
                    "c1",
                    false,
                    vec![with_mps(mig("m0", "1g.10gb"), 50)],
                ))
                .await
                .unwrap();
            rig.pipeline
                .unprepare(UnprepareRequest {
                    claim_uid: "c1".into(),
                })
                .await
                .unwrap();

            assert!(rig.store.snapshot().await.claims.is_empty());

            let calls = rig.hardware.calls();
            let count = |pred: fn(&PortCall) -> bool| calls.iter().filter(|c| pred(c)).count();
            assert_eq!(
                count(|c| matches!(c, PortCall::MigPrepare(_))),
                count(|c| matches!(c, PortCall::MigUnprepare(_)))
            );
            assert_eq!(
                count(|c| matches!(c, PortCall::MpsStart(_))),
                count(|c| matches!(c, PortCall::MpsStop(_)))
            );
            assert!(calls.contains(&PortCall::CdiDelete("c1".into())));
        }

        #[tokio::test]
        async fn test_unprepare_mig_with_mps_ordering() {
            let rig = rig();
            rig.pipeline
                .prepare(request(
                    "c1",
                    false,
                    vec![with_mps(mig("m0", "1g.10gb"), 50)],
                ))
                .await
                .unwrap();
            rig.hardware.clear_calls();

            rig.pipeline
                .unprepare(UnprepareRequest {
                    claim_uid: "c1".into(),
                })
                .await
                .unwrap();

            let calls = rig.hardware.calls();
            let position = |pred: fn(&PortCall) -> bool| calls.iter().position(pred);
            let delete = position(|c| matches!(c, PortCall::CdiDelete(_))).unwrap();
            let stop = position(|c| matches!(c, PortCall::MpsStop(_))).unwrap();
            let mig_teardown = position(|c| matches!(c, PortCall::MigUnprepare(_))).unwrap();
            assert!(delete < stop && stop < mig_teardown);
            // No time-slicing record existed, so no reset happens.
            assert!(!calls.iter().any(|c| matches!(c, PortCall::SetTimeSlice(_, _))));
        }
    }

    mod unprepare_edge_cases {
        use super::*;

        #[tokio::test]
        async fn test_unknown_claim_is_noop() {
            let rig = rig();
            rig.pipeline
                .unprepare(UnprepareRequest {
                    claim_uid: "ghost".into(),
                })
                .await
                .unwrap();
            assert!(rig.hardware.calls().is_empty());
            assert_eq!(rig.notifier.count(), 0);
        }

        #[tokio::test]
        async fn test_started_claim_skips_teardown_but_cleans_checkpoint() {
            let rig = rig();
            let mut checkpoint = PrepareCheckpoint::default();
            checkpoint.put_claim(
                "c1",
                PreparedClaim {
                    state: ClaimState::Started,
                    devices: vec![PreparedDeviceState {
                        request: "r0".into(),
                        pool: "p".into(),
                        device: "m0".into(),
                        sharing: Some(PreparedSharing {
                            strategy: SharingStrategy::TimeSlicing,
                            device_uuid: "GPU-a".into(),
                            time_slice_interval: Some(TimeSliceInterval::Short),
                            mps: None,
                        }),
                        ..Default::default()
                    }],
                },
            );
            rig.store.seed(checkpoint).await;

            rig.pipeline
                .unprepare(UnprepareRequest {
                    claim_uid: "c1".into(),
                })
                .await
                .unwrap();

            assert!(rig.hardware.calls().is_empty());
            assert!(rig.store.snapshot().await.claims.is_empty());
            assert_eq!(rig.notifier.count(), 1);
        }
    }

    mod restart {
        use super::*;
        use gpuplane_prepare::FileCheckpointStore;

        fn file_rig(dir: &tempfile::TempDir) -> (PreparePipeline, Arc<MockHardware>) {
            let hardware = Arc::new(MockHardware::new());
            let store = Arc::new(FileCheckpointStore::new(dir.path().join("claims.json")));
            let pipeline = PreparePipeline::new(PipelinePorts {
                checkpoints: store,
                cdi: hardware.clone(),
                gpu_processes: hardware.clone(),
                time_slicing: hardware.clone(),
                mps: hardware.clone(),
                mig: Some(hardware.clone()),
                vfio: Some(hardware.clone()),
                notifier: Arc::new(CountingNotifier::new()),
            });
            (pipeline, hardware)
        }

        #[tokio::test]
        async fn test_checkpoint_survives_process_restart() {
            let dir = tempfile::tempdir().unwrap();
            let claim_uid = format!("claim-{}", uuid::Uuid::new_v4());

            let (pipeline, _) = file_rig(&dir);
            let first = pipeline
                .prepare(request(&claim_uid, false, vec![mig("m0", "1g.10gb")]))
                .await
                .unwrap();

            // A fresh pipeline over the same checkpoint file stands in for a
            // restarted agent process.
            let (pipeline, hardware) = file_rig(&dir);
            let second = pipeline
                .prepare(request(&claim_uid, false, vec![mig("m0", "1g.10gb")]))
                .await
                .unwrap();
            assert_eq!(first, second);
            assert!(hardware.calls().is_empty());

            pipeline
                .unprepare(UnprepareRequest {
                    claim_uid: claim_uid.clone(),
                })
                .await
                .unwrap();
            let (pipeline, hardware) = file_rig(&dir);
            pipeline
                .unprepare(UnprepareRequest { claim_uid })
                .await
                .unwrap();
            assert!(hardware.calls().is_empty());
        }
    }

    mod cdi_contract {
        use super::*;

        #[tokio::test]
        async fn test_missing_cdi_entry_is_fatal_and_stays_started() {
            let rig = rig();
            rig.hardware.cdi_omit.lock().unwrap().push("g0".into());

            let result = rig
                .pipeline
                .prepare(request("c1", false, vec![physical("g0", "GPU-x")]))
                .await;
            assert!(matches!(result, Err(PrepareError::MissingCdiIds { .. })));

            let checkpoint = rig.store.snapshot().await;
            assert_eq!(checkpoint.claim("c1").unwrap().state, ClaimState::Started);
        }
    }
}
