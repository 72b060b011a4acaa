// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Step framework contract: async-yield sentinels, reboot flags, failure
//! routing, and the registry of RAID steps
//!
//! The step executor re-invokes a step after the agent comes back from a
//! reboot; the helpers here record the flags it keys off of and choose
//! between the cleaning and deployment flavors of waiting and failing.

use raid_common::Error;
use serde::Deserialize;
use serde::Serialize;
use slog::error;

use crate::interface::RaidInterface;
use crate::node::Node;
use crate::node::ProvisionState;
use crate::node::Task;

/// The async-yield sentinel: the operation spans a reboot, suspend this
/// workflow and resume the same step later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    CleanWait,
    DeployWait,
}

const CLEANING_REBOOT: &str = "cleaning_reboot";
const DEPLOYMENT_REBOOT: &str = "deployment_reboot";
const SKIP_CURRENT_CLEAN_STEP: &str = "skip_current_clean_step";
const SKIP_CURRENT_DEPLOY_STEP: &str = "skip_current_deploy_step";

fn flag_keys(node: &Node) -> (&'static str, &'static str) {
    if node.in_cleaning() {
        (CLEANING_REBOOT, SKIP_CURRENT_CLEAN_STEP)
    } else {
        (DEPLOYMENT_REBOOT, SKIP_CURRENT_DEPLOY_STEP)
    }
}

/// Records how the step executor should treat the suspension: whether a
/// reboot is part of it, and whether the current step should be skipped
/// or re-invoked when the node comes back.
pub fn set_async_step_flags(node: &mut Node, reboot: bool, skip_current_step: bool) {
    let (reboot_key, skip_key) = flag_keys(node);
    node.driver_internal_info.insert(reboot_key, reboot.into());
    node.driver_internal_info.insert(skip_key, skip_current_step.into());
}

/// Clears the flags set by [`set_async_step_flags`]; done on completion
/// and on failure so nothing stays flagged across attempts.
pub fn clear_async_step_flags(node: &mut Node) {
    let (reboot_key, skip_key) = flag_keys(node);
    node.driver_internal_info.remove(reboot_key);
    node.driver_internal_info.remove(skip_key);
}

/// The sentinel matching the workflow the step runs under.
pub fn get_async_step_return_state(node: &Node) -> StepState {
    if node.in_cleaning() {
        StepState::CleanWait
    } else {
        StepState::DeployWait
    }
}

/// Aborts the cleaning workflow with the given operator-facing message.
pub fn cleaning_error_handler(
    task: &mut Task<'_>,
    log_msg: &str,
    errmsg: &str,
) -> Result<(), Error> {
    error!(task.log, "cleaning failed";
        "node_id" => %task.node.id,
        "error" => log_msg,
    );
    task.node.provision_state = ProvisionState::CleanFail;
    task.node.last_error = Some(errmsg.to_string());
    task.node.clean_step = None;
    task.save()
}

/// Aborts the deployment workflow with the given operator-facing message.
pub fn deploying_error_handler(
    task: &mut Task<'_>,
    log_msg: &str,
    errmsg: &str,
) -> Result<(), Error> {
    error!(task.log, "deployment failed";
        "node_id" => %task.node.id,
        "error" => log_msg,
    );
    task.node.provision_state = ProvisionState::DeployFail;
    task.node.last_error = Some(errmsg.to_string());
    task.save()
}

/// Which workflow a step registration belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Clean,
    Deploy,
}

/// An argument a step accepts, for operator documentation and API
/// argsinfo surfaces.
#[derive(Clone, Copy, Debug)]
pub struct StepArg {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Metadata for one registration of a step.  The same implementation is
/// registered once per workflow kind; the registry is just a list.
#[derive(Clone, Copy, Debug)]
pub struct StepDescriptor {
    pub name: &'static str,
    pub kind: StepKind,
    pub priority: u32,
    pub abortable: bool,
    pub args: &'static [StepArg],
}

const VOLUME_FLAG_ARGS: &[StepArg] = &[
    StepArg {
        name: "create_root_volume",
        description: "Create the root volume, if the target declares one \
                      (default true)",
        required: false,
    },
    StepArg {
        name: "create_nonroot_volumes",
        description: "Create the non-root volumes, if the target declares \
                      any (default true)",
        required: false,
    },
];

const APPLY_ARGS: &[StepArg] = &[
    StepArg {
        name: "raid_config",
        description: "The RAID configuration to apply",
        required: true,
    },
    StepArg {
        name: "create_root_volume",
        description: "Create the root volume, if the configuration \
                      declares one (default true)",
        required: false,
    },
    StepArg {
        name: "create_nonroot_volumes",
        description: "Create the non-root volumes, if the configuration \
                      declares any (default true)",
        required: false,
    },
    StepArg {
        name: "delete_existing",
        description: "Delete the existing configuration first (default \
                      false)",
        required: false,
    },
];

/// Every registration of the RAID steps: each step appears once per
/// workflow kind, all pointing at the same [`RaidInterface`] method.
pub fn raid_steps() -> Vec<StepDescriptor> {
    let mut steps = Vec::new();
    for kind in [StepKind::Clean, StepKind::Deploy] {
        steps.push(StepDescriptor {
            name: "create_configuration",
            kind,
            priority: 0,
            abortable: true,
            args: VOLUME_FLAG_ARGS,
        });
        steps.push(StepDescriptor {
            name: "delete_configuration",
            kind,
            priority: 0,
            abortable: true,
            args: &[],
        });
        steps.push(StepDescriptor {
            name: "apply_configuration",
            kind,
            priority: 0,
            abortable: true,
            args: APPLY_ARGS,
        });
    }
    steps
}

fn bool_arg(
    args: &serde_json::Value,
    name: &str,
    default: bool,
) -> Result<bool, Error> {
    match args.get(name) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(other) => Err(Error::invalid_value(
            name,
            format!("expected a boolean, got {}", other),
        )),
    }
}

/// Dispatches a named step with its JSON arguments onto a backend.
pub fn run_step<I: RaidInterface>(
    interface: &I,
    task: &mut Task<'_>,
    name: &str,
    args: &serde_json::Value,
) -> Result<Option<StepState>, Error> {
    // Each arm parses only the arguments its step declares, so junk
    // arguments on one step cannot fail an unrelated one.
    match name {
        "create_configuration" => {
            let create_root = bool_arg(args, "create_root_volume", true)?;
            let create_nonroot =
                bool_arg(args, "create_nonroot_volumes", true)?;
            interface.create_configuration(
                task,
                create_root,
                create_nonroot,
                false,
            )
        }
        "delete_configuration" => interface.delete_configuration(task),
        "apply_configuration" => {
            let raid_config = args.get("raid_config").ok_or_else(|| {
                Error::missing_parameter(
                    "apply_configuration requires a raid_config argument",
                )
            })?;
            let create_root = bool_arg(args, "create_root_volume", true)?;
            let create_nonroot =
                bool_arg(args, "create_nonroot_volumes", true)?;
            let delete_existing = bool_arg(args, "delete_existing", false)?;
            interface.apply_configuration(
                task,
                raid_config,
                create_root,
                create_nonroot,
                delete_existing,
            )
        }
        other => Err(Error::invalid_value(
            "step",
            format!("unknown RAID step {:?}", other),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::InMemoryNodeStore;
    use slog::Logger;
    use slog::o;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    /// A backend that completes everything synchronously, counting calls.
    #[derive(Default)]
    struct RecordingBackend {
        create_calls: Cell<usize>,
        delete_calls: Cell<usize>,
    }

    impl RaidInterface for RecordingBackend {
        fn get_properties(&self) -> BTreeMap<String, String> {
            BTreeMap::new()
        }

        fn create_configuration(
            &self,
            _task: &mut Task<'_>,
            _create_root_volume: bool,
            _create_nonroot_volumes: bool,
            _delete_existing: bool,
        ) -> Result<Option<StepState>, Error> {
            self.create_calls.set(self.create_calls.get() + 1);
            Ok(None)
        }

        fn delete_configuration(
            &self,
            _task: &mut Task<'_>,
        ) -> Result<Option<StepState>, Error> {
            self.delete_calls.set(self.delete_calls.get() + 1);
            Ok(None)
        }
    }

    fn test_log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    #[test]
    fn test_async_flags_are_namespaced_per_workflow() {
        let mut node = Node::new(Uuid::new_v4());

        // Deploying: no clean step set.
        set_async_step_flags(&mut node, true, false);
        assert_eq!(
            node.driver_internal_info.get(DEPLOYMENT_REBOOT),
            Some(&serde_json::Value::Bool(true))
        );
        assert_eq!(node.driver_internal_info.get(CLEANING_REBOOT), None);
        assert_eq!(get_async_step_return_state(&node), StepState::DeployWait);
        clear_async_step_flags(&mut node);
        assert_eq!(node.driver_internal_info.get(DEPLOYMENT_REBOOT), None);

        // Cleaning.
        node.clean_step = Some(crate::node::CleanStep {
            interface: "raid".to_string(),
            step: "create_configuration".to_string(),
        });
        set_async_step_flags(&mut node, true, false);
        assert_eq!(
            node.driver_internal_info.get(SKIP_CURRENT_CLEAN_STEP),
            Some(&serde_json::Value::Bool(false))
        );
        assert_eq!(get_async_step_return_state(&node), StepState::CleanWait);
    }

    #[test]
    fn test_every_step_is_registered_for_both_workflows() {
        let steps = raid_steps();
        for name in
            ["create_configuration", "delete_configuration", "apply_configuration"]
        {
            for kind in [StepKind::Clean, StepKind::Deploy] {
                assert!(
                    steps
                        .iter()
                        .any(|s| s.name == name && s.kind == kind),
                    "{} not registered as a {:?} step",
                    name,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_delete_step_ignores_unrelated_arguments() {
        // delete_configuration declares no arguments; a malformed flag
        // meant for another step must not fail the dispatch.
        let store = InMemoryNodeStore::new();
        let mut node = Node::new(Uuid::new_v4());
        let mut task = Task::new(&mut node, &store, test_log());
        let backend = RecordingBackend::default();

        let args = serde_json::json!({ "create_root_volume": "yes" });
        let state =
            run_step(&backend, &mut task, "delete_configuration", &args)
                .unwrap();
        assert_eq!(state, None);
        assert_eq!(backend.delete_calls.get(), 1);

        // The same malformed flag still fails the step that declares it.
        let err = run_step(&backend, &mut task, "create_configuration", &args)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(backend.create_calls.get(), 0);
    }

    #[test]
    fn test_bool_arg_parsing() {
        let args = serde_json::json!({ "create_root_volume": false });
        assert!(!bool_arg(&args, "create_root_volume", true).unwrap());
        assert!(bool_arg(&args, "create_nonroot_volumes", true).unwrap());

        let bad = serde_json::json!({ "create_root_volume": "yes" });
        assert!(bool_arg(&bad, "create_root_volume", true).is_err());
    }
}
