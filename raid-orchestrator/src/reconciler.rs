// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciling an observed RAID layout into node scheduling metadata

use chrono::Utc;
use raid_common::Error;
use raid_common::RaidConfig;
use slog::info;

use crate::node::AppliedRaidConfig;
use crate::node::Task;

/// Records `current` — a layout read back from hardware — as the node's
/// RAID configuration and folds its root volume into the scheduling
/// properties.
///
/// With a root volume present, `local_gb` is set from its size, the
/// root-device hint replaces `root_device` when the read-back carries one
/// (and leaves the previous value alone when it does not), and a
/// `raid_level:<level>` token is upserted into the capabilities string
/// without disturbing other tokens.  Without one, only `raid_config` and
/// its timestamp change.
///
/// The read-back comes from vendor code this subsystem did not produce,
/// so the single-root rule is re-checked here and a `"MAX"` size that was
/// never resolved to a real number is rejected; neither failure mutates
/// the node.
pub fn update_raid_info(
    task: &mut Task<'_>,
    current: &RaidConfig,
) -> Result<(), Error> {
    let root = current
        .root_volume()
        .map_err(|e| Error::invalid_value("current RAID configuration", e.to_string()))?;

    if let Some(root) = root {
        if root.size_gb.gigabytes().is_none() {
            return Err(Error::invalid_value(
                "size_gb",
                format!(
                    "node {}: root volume read back from hardware still \
                     reports \"MAX\" instead of a resolved size",
                    task.node.id
                ),
            ));
        }
    }

    task.node.raid_config = Some(AppliedRaidConfig {
        logical_disks: current.logical_disks.clone(),
        last_updated: Utc::now(),
    });

    if let Some(root) = root {
        // Checked above.
        task.node.properties.local_gb = root.size_gb.gigabytes();
        if let Some(hint) = &root.root_device_hint {
            task.node.properties.root_device = Some(hint.clone());
        }
        task.node
            .properties
            .capabilities
            .upsert("raid_level", root.raid_level.as_str());
        info!(task.log, "updated node properties from RAID root volume";
            "node_id" => %task.node.id,
            "local_gb" => task.node.properties.local_gb,
            "raid_level" => %root.raid_level,
        );
    }

    task.save()
}
