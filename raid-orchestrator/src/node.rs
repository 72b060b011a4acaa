// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The node model as seen by the RAID subsystem
//!
//! The provisioning system owns far more node state than this; here we
//! carry only the fields RAID work reads or writes, as typed records with
//! explicit accessors rather than loose attribute bags.

use chrono::DateTime;
use chrono::Utc;
use raid_common::Capabilities;
use raid_common::Error;
use raid_common::RaidConfig;
use serde::Deserialize;
use serde::Serialize;
use slog::Logger;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

/// The slice of the provisioning lifecycle RAID operations interact with.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Available,
    Deploying,
    DeployWait,
    DeployFail,
    Cleaning,
    CleanWait,
    CleanFail,
}

/// The clean step currently executing on a node, when there is one.
///
/// Its presence is what routes failures to the cleaning handler rather
/// than the deployment handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanStep {
    pub interface: String,
    pub step: String,
}

/// The RAID configuration last observed on hardware, stamped with the
/// time the observation was reconciled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedRaidConfig {
    pub logical_disks: Vec<raid_common::LogicalDisk>,
    pub last_updated: DateTime<Utc>,
}

/// Scheduling-relevant node properties.
///
/// `local_gb`, `root_device` and the `raid_level` capability token are
/// maintained by the reconciler; `extra` carries whatever else the wider
/// system stores here, untouched by this subsystem.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    pub local_gb: Option<u64>,
    pub root_device: Option<BTreeMap<String, serde_json::Value>>,
    pub capabilities: Capabilities,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A RAID operation kind, used to namespace progress markers so a stale
/// marker from one kind can never confuse the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaidOperation {
    Create,
    Delete,
}

impl RaidOperation {
    fn marker_key(&self) -> &'static str {
        match self {
            RaidOperation::Create => "raid_create_state",
            RaidOperation::Delete => "raid_delete_state",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RaidOperation::Create => "create",
            RaidOperation::Delete => "delete",
        }
    }
}

/// Progress of one RAID operation across the reboot boundary.
///
/// Completion and failure both clear the marker, so only the in-flight
/// half of the lifecycle is ever persisted; an absent marker always means
/// a fresh start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    NotStarted,
    Issued,
}

const ISSUED: &str = "issued";
const TARGET_RAID_CONFIG: &str = "target_raid_config";

/// Transient driver state persisted on the node.
///
/// Entries are plain string-keyed JSON values on purpose: the abort path
/// in the step framework clears in-flight work by removing keys, and must
/// be able to do so without understanding this subsystem.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverInternalInfo {
    entries: BTreeMap<String, serde_json::Value>,
}

impl DriverInternalInfo {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    pub fn insert<K: Into<String>>(&mut self, key: K, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.entries.remove(key)
    }

    /// Progress of the given RAID operation.  Unrecognized marker values
    /// are treated as not-started rather than guessed at.
    pub fn raid_state(&self, op: RaidOperation) -> OperationState {
        match self.entries.get(op.marker_key()) {
            Some(serde_json::Value::String(s)) if s == ISSUED => {
                OperationState::Issued
            }
            _ => OperationState::NotStarted,
        }
    }

    /// Records progress of the given RAID operation.  `NotStarted` removes
    /// the marker entirely.
    pub fn set_raid_state(&mut self, op: RaidOperation, state: OperationState) {
        match state {
            OperationState::NotStarted => {
                self.entries.remove(op.marker_key());
            }
            OperationState::Issued => {
                self.entries
                    .insert(op.marker_key().to_string(), ISSUED.into());
            }
        }
    }

    /// Stores the filtered target configuration the in-flight operation
    /// was issued with, for external observers and the abort path.
    pub fn set_target_raid_config(&mut self, config: &RaidConfig) {
        // Serializing a plain struct with string keys cannot fail.
        let value = serde_json::to_value(config)
            .expect("RaidConfig serializes to JSON");
        self.entries.insert(TARGET_RAID_CONFIG.to_string(), value);
    }

    pub fn target_raid_config(&self) -> Option<RaidConfig> {
        let value = self.entries.get(TARGET_RAID_CONFIG)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn remove_target_raid_config(&mut self) {
        self.entries.remove(TARGET_RAID_CONFIG);
    }
}

/// The node fields the RAID subsystem reads and writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub provision_state: ProvisionState,
    pub clean_step: Option<CleanStep>,
    pub last_error: Option<String>,
    pub properties: NodeProperties,
    pub driver_internal_info: DriverInternalInfo,
    /// What the operator wants on the hardware.
    pub target_raid_config: Option<RaidConfig>,
    /// What was last observed on the hardware.
    pub raid_config: Option<AppliedRaidConfig>,
}

impl Node {
    pub fn new(id: Uuid) -> Node {
        Node {
            id,
            provision_state: ProvisionState::Available,
            clean_step: None,
            last_error: None,
            properties: NodeProperties::default(),
            driver_internal_info: DriverInternalInfo::default(),
            target_raid_config: None,
            raid_config: None,
        }
    }

    /// Whether the current operation runs as a clean step.  Failure
    /// routing and the async-yield sentinel both key off this.
    pub fn in_cleaning(&self) -> bool {
        self.clean_step.is_some()
    }
}

/// Persistence seam for nodes.
///
/// The surrounding object layer provides atomicity of a single `save`;
/// callers hold the node's exclusive lock for the duration of an
/// operation, so no further coordination happens here.
pub trait NodeStore {
    fn load(&self, id: Uuid) -> Result<Node, Error>;
    fn save(&self, node: &Node) -> Result<(), Error>;
}

/// A `NodeStore` backed by a map, for tests and embedding.
#[derive(Default)]
pub struct InMemoryNodeStore {
    nodes: Mutex<BTreeMap<Uuid, Node>>,
}

impl InMemoryNodeStore {
    pub fn new() -> InMemoryNodeStore {
        InMemoryNodeStore::default()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn load(&self, id: Uuid) -> Result<Node, Error> {
        self.nodes
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::NodeNotFound(id))
    }

    fn save(&self, node: &Node) -> Result<(), Error> {
        self.nodes.lock().unwrap().insert(node.id, node.clone());
        Ok(())
    }
}

/// A node checked out under the provisioning system's exclusive lock,
/// bundled with the store to write it back through and a logger scoped to
/// the operation.
pub struct Task<'a> {
    pub node: &'a mut Node,
    store: &'a dyn NodeStore,
    pub log: Logger,
}

impl<'a> Task<'a> {
    pub fn new(node: &'a mut Node, store: &'a dyn NodeStore, log: Logger) -> Task<'a> {
        Task { node, store, log }
    }

    pub fn save(&self) -> Result<(), Error> {
        self.store.save(self.node)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_raid_state_markers_are_namespaced() {
        let mut dii = DriverInternalInfo::default();
        assert_eq!(
            dii.raid_state(RaidOperation::Create),
            OperationState::NotStarted
        );

        dii.set_raid_state(RaidOperation::Create, OperationState::Issued);
        assert_eq!(
            dii.raid_state(RaidOperation::Create),
            OperationState::Issued
        );
        // The delete marker is untouched by create progress.
        assert_eq!(
            dii.raid_state(RaidOperation::Delete),
            OperationState::NotStarted
        );

        dii.set_raid_state(RaidOperation::Create, OperationState::NotStarted);
        assert_eq!(dii.get("raid_create_state"), None);
    }

    #[test]
    fn test_markers_are_clearable_by_key() {
        // The abort path removes keys without knowing their meaning.
        let mut dii = DriverInternalInfo::default();
        dii.set_raid_state(RaidOperation::Delete, OperationState::Issued);
        dii.remove("raid_delete_state");
        assert_eq!(
            dii.raid_state(RaidOperation::Delete),
            OperationState::NotStarted
        );
    }

    #[test]
    fn test_target_raid_config_round_trips() {
        let config: RaidConfig = serde_json::from_value(serde_json::json!({
            "logical_disks": [
                { "raid_level": "1", "size_gb": 100, "is_root_volume": true },
            ]
        }))
        .unwrap();
        let mut dii = DriverInternalInfo::default();
        dii.set_target_raid_config(&config);
        assert_eq!(dii.target_raid_config(), Some(config));
        dii.remove_target_raid_config();
        assert_eq!(dii.target_raid_config(), None);
    }

    #[test]
    fn test_in_memory_store_round_trips() {
        let store = InMemoryNodeStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.load(id), Err(Error::NodeNotFound(id)));

        let mut node = Node::new(id);
        node.properties.local_gb = Some(512);
        store.save(&node).unwrap();
        assert_eq!(store.load(id).unwrap(), node);
    }
}
