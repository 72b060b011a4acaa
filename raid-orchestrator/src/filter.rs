// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deriving the effective target configuration from a node's full target

use raid_common::Error;
use raid_common::RaidConfig;

use crate::node::Node;

/// Returns the subset of `node.target_raid_config` selected by the
/// root/non-root inclusion flags, preserving declaration order.
///
/// Fails with a missing-parameter error when the node has no target
/// configuration, or when the flags deselect every logical disk.  Pure;
/// performs no I/O and does not mutate the node.
pub fn filter_target_raid_config(
    node: &Node,
    create_root_volume: bool,
    create_nonroot_volumes: bool,
) -> Result<RaidConfig, Error> {
    let target = match &node.target_raid_config {
        Some(target) if !target.logical_disks.is_empty() => target,
        _ => {
            return Err(Error::missing_parameter(format!(
                "node {} has no target RAID configuration",
                node.id
            )));
        }
    };

    let logical_disks: Vec<_> = target
        .logical_disks
        .iter()
        .filter(|disk| {
            if disk.is_root_volume {
                create_root_volume
            } else {
                create_nonroot_volumes
            }
        })
        .cloned()
        .collect();

    if logical_disks.is_empty() {
        return Err(Error::missing_parameter(format!(
            "node {}: no logical disks selected from the target RAID \
             configuration (create_root_volume={}, \
             create_nonroot_volumes={})",
            node.id, create_root_volume, create_nonroot_volumes
        )));
    }

    Ok(RaidConfig { logical_disks })
}
