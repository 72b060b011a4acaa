// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end exercise of the RAID workflow through the public API:
//! operator submission, filtering, the two-phase create, and the
//! reconciliation of the read-back into scheduling properties.

use raid_common::Error;
use raid_common::OobError;
use raid_common::RaidConfig;
use raid_common::validate_configuration;
use raid_orchestrator::BootControl;
use raid_orchestrator::InMemoryNodeStore;
use raid_orchestrator::Node;
use raid_orchestrator::NodeStore;
use raid_orchestrator::OobRaid;
use raid_orchestrator::OobRaidController;
use raid_orchestrator::RaidInterface;
use raid_orchestrator::StepState;
use raid_orchestrator::Task;
use raid_orchestrator::filter_target_raid_config;
use raid_orchestrator::node::ProvisionState;
use raid_orchestrator::steps::run_step;
use serde_json::json;
use slog::Logger;
use slog::o;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A controller whose read-back is scripted per test.
#[derive(Default)]
struct ScriptedController {
    read_result: RefCell<Option<Result<RaidConfig, OobError>>>,
    delete_calls: Cell<usize>,
}

impl OobRaidController for ScriptedController {
    fn create_raid_configuration(
        &self,
        _target: &RaidConfig,
    ) -> Result<(), OobError> {
        Ok(())
    }

    fn delete_raid_configuration(&self) -> Result<(), OobError> {
        self.delete_calls.set(self.delete_calls.get() + 1);
        Ok(())
    }

    fn read_raid_configuration(
        &self,
        _target: Option<&RaidConfig>,
    ) -> Result<RaidConfig, OobError> {
        self.read_result
            .borrow_mut()
            .take()
            .expect("unexpected read_raid_configuration call")
    }
}

struct NoopBoot;

impl BootControl for NoopBoot {
    fn build_agent_options(&self, _node: &Node) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn prepare_ramdisk(
        &self,
        _task: &Task<'_>,
        _options: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn reboot(&self, _task: &Task<'_>) -> Result<(), Error> {
        Ok(())
    }
}

fn test_log() -> Logger {
    Logger::root(slog::Discard, o!())
}

#[test]
fn test_submission_to_reconciled_properties() {
    // The operator submits a target configuration; validation happens at
    // the submission boundary.
    let submitted = json!({
        "logical_disks": [
            { "raid_level": "1", "size_gb": 100, "is_root_volume": true },
            { "raid_level": "5", "size_gb": 200 },
        ]
    });
    let target = validate_configuration(&submitted).unwrap();

    let store = InMemoryNodeStore::new();
    let mut node = Node::new(Uuid::new_v4());
    node.provision_state = ProvisionState::Deploying;
    node.properties.capabilities = "boot_mode:bios".parse().unwrap();
    node.target_raid_config = Some(target.clone());
    store.save(&node).unwrap();

    // Default flags keep every disk, untouched and in order.
    let filtered = filter_target_raid_config(&node, true, true).unwrap();
    assert_eq!(filtered, target);

    let backend = OobRaid::new(ScriptedController::default(), NoopBoot);

    // Phase one: the job is issued and the workflow suspends.
    let mut task = Task::new(&mut node, &store, test_log());
    let state = backend
        .create_configuration(&mut task, true, true, false)
        .unwrap();
    assert_eq!(state, Some(StepState::DeployWait));

    // Phase two, after the reboot: the vendor read-back kept only the
    // root volume's details, as vendors may.
    *backend_read(&backend) = Some(Ok(serde_json::from_value(json!({
        "logical_disks": [
            {
                "raid_level": "1",
                "size_gb": 100,
                "is_root_volume": true,
                "root_device_hint": { "wwn": "600508B100" },
            },
        ]
    }))
    .unwrap()));
    let state = backend
        .create_configuration(&mut task, true, true, false)
        .unwrap();
    assert_eq!(state, None);

    assert_eq!(node.properties.local_gb, Some(100));
    assert_eq!(
        node.properties.root_device.as_ref().unwrap()["wwn"],
        json!("600508B100")
    );
    assert_eq!(
        node.properties.capabilities.to_string(),
        "boot_mode:bios,raid_level:1"
    );
    let applied = node.raid_config.as_ref().unwrap();
    assert_eq!(applied.logical_disks.len(), 1);

    // The persisted copy matches the in-memory node.
    assert_eq!(store.load(node.id).unwrap(), node);
}

// Test-only access to the scripted read-back inside the backend.
fn backend_read<'a>(
    backend: &'a OobRaid<ScriptedController, NoopBoot>,
) -> std::cell::RefMut<'a, Option<Result<RaidConfig, OobError>>> {
    backend.controller().read_result.borrow_mut()
}

#[test]
fn test_apply_configuration_step_dispatch() {
    let store = InMemoryNodeStore::new();
    let mut node = Node::new(Uuid::new_v4());
    node.provision_state = ProvisionState::Deploying;
    let backend = OobRaid::new(ScriptedController::default(), NoopBoot);

    let mut task = Task::new(&mut node, &store, test_log());
    let state = run_step(
        &backend,
        &mut task,
        "apply_configuration",
        &json!({
            "raid_config": {
                "logical_disks": [
                    { "raid_level": "1", "size_gb": 50, "is_root_volume": true },
                ]
            },
        }),
    )
    .unwrap();
    assert_eq!(state, Some(StepState::DeployWait));
    assert!(node.target_raid_config.is_some());
}

#[test]
fn test_apply_step_with_delete_existing_reaches_the_controller() {
    let store = InMemoryNodeStore::new();
    let mut node = Node::new(Uuid::new_v4());
    node.provision_state = ProvisionState::Deploying;
    let backend = OobRaid::new(ScriptedController::default(), NoopBoot);

    let mut task = Task::new(&mut node, &store, test_log());
    let state = run_step(
        &backend,
        &mut task,
        "apply_configuration",
        &json!({
            "raid_config": {
                "logical_disks": [
                    { "raid_level": "1", "size_gb": 50, "is_root_volume": true },
                ]
            },
            "delete_existing": true,
        }),
    )
    .unwrap();
    assert_eq!(state, Some(StepState::DeployWait));
    assert_eq!(backend.controller().delete_calls.get(), 1);
}

#[test]
fn test_rejected_submission_never_reaches_the_node() {
    let err = validate_configuration(&json!({
        "logical_disks": [
            { "raid_level": "1", "size_gb": 100, "is_root_volume": true },
            { "raid_level": "0", "size_gb": 10, "is_root_volume": true },
        ]
    }))
    .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(err.to_string().contains("found 2"));
}
