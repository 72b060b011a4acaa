// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The two-phase, reboot-spanning RAID workflow
//!
//! A controller-level RAID job only takes effect once the machine reboots
//! into firmware context, so neither create nor delete can finish within
//! one invocation.  The first invocation issues the job, reboots the node
//! and records an in-flight marker; the step executor re-invokes the same
//! step once the agent comes back, and the second invocation sees the
//! marker, reads the result back and reconciles it.  The marker is the
//! only state; resumption is entirely caller-driven.
//!
//! Any failure clears the marker before it surfaces, so a retry always
//! starts from the beginning rather than being misread as "already
//! rebooted, go read back now".

use raid_common::Error;
use raid_common::LogicalDisk;
use raid_common::OobError;
use slog::info;
use slog::warn;
use std::collections::BTreeMap;

use crate::filter::filter_target_raid_config;
use crate::interface::RaidInterface;
use crate::node::OperationState;
use crate::node::RaidOperation;
use crate::node::Task;
use crate::oob::BootControl;
use crate::oob::OobRaidController;
use crate::reconciler::update_raid_info;
use crate::steps::StepState;
use crate::steps::cleaning_error_handler;
use crate::steps::clear_async_step_flags;
use crate::steps::deploying_error_handler;
use crate::steps::get_async_step_return_state;
use crate::steps::set_async_step_flags;

/// The generic out-of-band RAID backend: drives any
/// [`OobRaidController`] through the two-phase create/delete workflow.
pub struct OobRaid<C, B> {
    controller: C,
    boot: B,
}

impl<C: OobRaidController, B: BootControl> OobRaid<C, B> {
    pub fn new(controller: C, boot: B) -> OobRaid<C, B> {
        OobRaid { controller, boot }
    }

    /// The controller client this backend drives.
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Boots the agent ramdisk and power-cycles the node so firmware can
    /// carry out the job the controller just accepted.
    fn issue_reboot(&self, task: &Task<'_>) -> Result<(), Error> {
        let options = self.boot.build_agent_options(task.node);
        self.boot.prepare_ramdisk(task, options)?;
        self.boot.reboot(task)
    }

    /// Suspends the step across the reboot: records the in-flight marker
    /// and the executor flags, and returns the matching wait sentinel.
    fn suspend(
        &self,
        task: &mut Task<'_>,
        op: RaidOperation,
    ) -> Result<Option<StepState>, Error> {
        task.node
            .driver_internal_info
            .set_raid_state(op, OperationState::Issued);
        // reboot=true, skip_current_step=false: the executor reboots the
        // node and re-invokes this same step when the agent returns.
        set_async_step_flags(task.node, true, false);
        task.save()?;
        Ok(Some(get_async_step_return_state(task.node)))
    }

    /// Rolls back in-flight state and routes the failure to the handler
    /// matching the workflow this step runs under.  Returns `err` for the
    /// caller to propagate.
    fn fail(&self, task: &mut Task<'_>, op: RaidOperation, err: Error) -> Error {
        task.node
            .driver_internal_info
            .set_raid_state(op, OperationState::NotStarted);
        clear_async_step_flags(task.node);
        task.node.driver_internal_info.remove_target_raid_config();
        let log_msg = format!(
            "RAID {} failed on node {}: {}",
            op.describe(),
            task.node.id,
            err
        );
        let errmsg = err.to_string();
        let routed = if task.node.in_cleaning() {
            cleaning_error_handler(task, &log_msg, &errmsg)
        } else {
            deploying_error_handler(task, &log_msg, &errmsg)
        };
        if let Err(save_err) = routed {
            warn!(task.log, "could not persist failure state";
                "node_id" => %task.node.id,
                "error" => %save_err,
            );
        }
        err
    }
}

fn describe_disk(disk: &LogicalDisk) -> String {
    match &disk.volume_name {
        Some(name) => name.clone(),
        None => format!("RAID-{} volume", disk.raid_level),
    }
}

impl<C: OobRaidController, B: BootControl> RaidInterface for OobRaid<C, B> {
    fn get_properties(&self) -> BTreeMap<String, String> {
        [
            (
                "oob_address",
                "IP address or hostname of the out-of-band controller. \
                 Required.",
            ),
            (
                "oob_username",
                "Username for the out-of-band controller. Required.",
            ),
            (
                "oob_password",
                "Password for the out-of-band controller. Required.",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn create_configuration(
        &self,
        task: &mut Task<'_>,
        create_root_volume: bool,
        create_nonroot_volumes: bool,
        delete_existing: bool,
    ) -> Result<Option<StepState>, Error> {
        let target = filter_target_raid_config(
            task.node,
            create_root_volume,
            create_nonroot_volumes,
        )?;
        task.node.driver_internal_info.set_target_raid_config(&target);
        task.save()?;

        match task.node.driver_internal_info.raid_state(RaidOperation::Create) {
            OperationState::NotStarted => {
                // The teardown and the create are accepted together here
                // and carried out by firmware across the same reboot.
                if delete_existing {
                    match self.controller.delete_raid_configuration() {
                        Ok(()) => {}
                        Err(OobError::NotFound) => {
                            info!(task.log,
                                "no existing RAID configuration to replace";
                                "node_id" => %task.node.id,
                            );
                        }
                        Err(e) => {
                            return Err(self.fail(
                                task,
                                RaidOperation::Create,
                                Error::Oob(e),
                            ));
                        }
                    }
                }
                info!(task.log, "issuing RAID create";
                    "node_id" => %task.node.id,
                    "logical_disks" => target.logical_disks.len(),
                );
                if let Err(e) = self.controller.create_raid_configuration(&target)
                {
                    return Err(self.fail(
                        task,
                        RaidOperation::Create,
                        Error::Oob(e),
                    ));
                }
                self.issue_reboot(task)?;
                self.suspend(task, RaidOperation::Create)
            }
            OperationState::Issued => {
                let current =
                    match self.controller.read_raid_configuration(Some(&target))
                    {
                        Ok(current) => current,
                        Err(e) => {
                            return Err(self.fail(
                                task,
                                RaidOperation::Create,
                                Error::Oob(e),
                            ));
                        }
                    };
                task.node.driver_internal_info.set_raid_state(
                    RaidOperation::Create,
                    OperationState::NotStarted,
                );
                clear_async_step_flags(task.node);
                task.node.driver_internal_info.remove_target_raid_config();

                if current.logical_disks.is_empty() {
                    let err = Error::ConfigurationFailed {
                        node: task.node.id,
                        message: "controller reported no logical disks \
                                  after RAID creation"
                            .to_string(),
                    };
                    return Err(self.fail(task, RaidOperation::Create, err));
                }
                info!(task.log, "RAID create completed";
                    "node_id" => %task.node.id,
                    "logical_disks" => current.logical_disks.len(),
                );
                // A bad read-back (say, two root volumes) is as terminal
                // as an empty one and gets the same routing.
                if let Err(e) = update_raid_info(task, &current) {
                    return Err(self.fail(task, RaidOperation::Create, e));
                }
                Ok(None)
            }
        }
    }

    fn delete_configuration(
        &self,
        task: &mut Task<'_>,
    ) -> Result<Option<StepState>, Error> {
        match task.node.driver_internal_info.raid_state(RaidOperation::Delete) {
            OperationState::NotStarted => {
                match self.controller.delete_raid_configuration() {
                    Ok(()) => {}
                    Err(OobError::NotFound) => {
                        // Deleting an already-empty configuration is not
                        // an error.
                        info!(task.log,
                            "no RAID configuration on the controller, \
                             nothing to delete";
                            "node_id" => %task.node.id,
                        );
                        task.node.raid_config = None;
                        task.save()?;
                        return Ok(None);
                    }
                    Err(e) => {
                        return Err(self.fail(
                            task,
                            RaidOperation::Delete,
                            Error::Oob(e),
                        ));
                    }
                }
                info!(task.log, "issuing RAID delete";
                    "node_id" => %task.node.id,
                );
                self.issue_reboot(task)?;
                self.suspend(task, RaidOperation::Delete)
            }
            OperationState::Issued => {
                let current =
                    match self.controller.read_raid_configuration(None) {
                        Ok(current) => current,
                        Err(e) => {
                            return Err(self.fail(
                                task,
                                RaidOperation::Delete,
                                Error::Oob(e),
                            ));
                        }
                    };
                task.node.driver_internal_info.set_raid_state(
                    RaidOperation::Delete,
                    OperationState::NotStarted,
                );
                clear_async_step_flags(task.node);

                if current.logical_disks.is_empty() {
                    info!(task.log, "RAID delete completed";
                        "node_id" => %task.node.id,
                    );
                    task.node.raid_config = None;
                    task.save()?;
                    Ok(None)
                } else {
                    let remaining: Vec<String> = current
                        .logical_disks
                        .iter()
                        .map(describe_disk)
                        .collect();
                    let err = Error::ConfigurationFailed {
                        node: task.node.id,
                        message: format!(
                            "unable to delete these logical disks: {}",
                            remaining.join(", ")
                        ),
                    };
                    Err(self.fail(task, RaidOperation::Delete, err))
                }
            }
        }
    }
}
