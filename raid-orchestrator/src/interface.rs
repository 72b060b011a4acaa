// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The capability surface every vendor RAID backend implements

use raid_common::Error;
use raid_common::RaidConfig;
use std::collections::BTreeMap;

use crate::node::Task;
use crate::steps::StepState;

/// A vendor RAID backend.
///
/// Backends implement `create_configuration` and `delete_configuration`
/// however their hardware requires: synchronously (returning `None` when
/// done) or via a reboot-spanning workflow (returning the async-yield
/// [`StepState`], expecting to be re-invoked later).  The validation and
/// apply entry points come with generic defaults driven by the shared
/// configuration schema; a backend with a stricter schema overrides
/// [`RaidInterface::validate_raid_config`] alone and the rest follows.
pub trait RaidInterface {
    /// The driver properties this backend requires on a node, mapped to
    /// their descriptions.  Operator documentation and validation tooling
    /// read this.
    fn get_properties(&self) -> BTreeMap<String, String>;

    /// Validates the node's target RAID configuration, if it has one.
    fn validate(&self, task: &Task<'_>) -> Result<(), Error> {
        let target = match &task.node.target_raid_config {
            Some(target) if !target.logical_disks.is_empty() => target,
            _ => return Ok(()),
        };
        // Serializing a plain struct with string keys cannot fail.
        let value = serde_json::to_value(target)
            .expect("RaidConfig serializes to JSON");
        self.validate_raid_config(task, &value).map(|_| ())
    }

    /// Validates a RAID configuration document against this backend's
    /// schema.
    fn validate_raid_config(
        &self,
        _task: &Task<'_>,
        raid_config: &serde_json::Value,
    ) -> Result<RaidConfig, Error> {
        raid_common::validate_configuration(raid_config)
    }

    /// Creates the RAID configuration selected from the node's target by
    /// the two inclusion flags.  With `delete_existing`, whatever
    /// configuration is already on the hardware is torn down first.
    fn create_configuration(
        &self,
        task: &mut Task<'_>,
        create_root_volume: bool,
        create_nonroot_volumes: bool,
        delete_existing: bool,
    ) -> Result<Option<StepState>, Error>;

    /// Deletes the RAID configuration on the node.
    fn delete_configuration(
        &self,
        task: &mut Task<'_>,
    ) -> Result<Option<StepState>, Error>;

    /// The unified deploy-step entry point: validate `raid_config`, make
    /// it the node's target, and create it, tearing down any existing
    /// configuration first when `delete_existing` is set.
    ///
    /// On validation failure the node's target is left untouched.
    fn apply_configuration(
        &self,
        task: &mut Task<'_>,
        raid_config: &serde_json::Value,
        create_root_volume: bool,
        create_nonroot_volumes: bool,
        delete_existing: bool,
    ) -> Result<Option<StepState>, Error> {
        let config = self.validate_raid_config(task, raid_config)?;
        task.node.target_raid_config = Some(config);
        task.save()?;
        self.create_configuration(
            task,
            create_root_volume,
            create_nonroot_volumes,
            delete_existing,
        )
    }

    /// The allowed logical-disk fields of this backend's schema, for
    /// operator documentation.
    fn logical_disk_properties(&self) -> BTreeMap<String, String> {
        raid_common::logical_disk_properties()
    }
}
