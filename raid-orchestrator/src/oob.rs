// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collaborator seams: the out-of-band controller and boot control
//!
//! The orchestrator drives vendor hardware only through these traits.
//! Calls are synchronous; the node's exclusive lock is held across them
//! and the long waits in the workflow happen across reboots, not inside
//! these calls.

use raid_common::Error;
use raid_common::OobError;
use raid_common::RaidConfig;
use std::collections::BTreeMap;

use crate::node::Node;
use crate::node::Task;

/// A vendor's out-of-band RAID controller client.
///
/// `create` and `delete` submit jobs that take effect across a reboot;
/// `read` reports the layout the controller currently has.  Vendors map
/// their wire errors onto [`OobError`], in particular distinguishing the
/// "nothing there" condition a delete can hit.
pub trait OobRaidController {
    /// Ask the controller to build the given target configuration.
    fn create_raid_configuration(
        &self,
        target: &RaidConfig,
    ) -> Result<(), OobError>;

    /// Ask the controller to tear down whatever configuration exists.
    fn delete_raid_configuration(&self) -> Result<(), OobError>;

    /// Read back the current layout.  When `target` is given, vendors
    /// that report asynchronously may use it to match up the pending job.
    fn read_raid_configuration(
        &self,
        target: Option<&RaidConfig>,
    ) -> Result<RaidConfig, OobError>;
}

/// Ramdisk and power collaborators from the step framework.
///
/// The orchestrator prepares the agent ramdisk and power-cycles the node
/// after issuing a configuration job; everything else about boot
/// management belongs to the wider system.
pub trait BootControl {
    /// Kernel command-line options for the agent ramdisk.
    fn build_agent_options(&self, node: &Node) -> BTreeMap<String, String>;

    /// Set the node up to boot the agent ramdisk with the given options.
    fn prepare_ramdisk(
        &self,
        task: &Task<'_>,
        options: BTreeMap<String, String>,
    ) -> Result<(), Error>;

    /// Power-cycle the node.
    fn reboot(&self, task: &Task<'_>) -> Result<(), Error>;
}
