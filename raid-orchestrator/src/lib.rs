// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RAID configuration orchestration for bare-metal nodes
//!
//! Applying a RAID layout through an out-of-band controller is a two-phase
//! affair: the controller accepts the job, the machine reboots so firmware
//! can carry it out, and only a later invocation can read the result back.
//! This crate implements that resumable workflow: the node-side progress
//! markers, the configuration filter, the reconciliation of the resulting
//! layout into scheduling properties, and the backend contract every
//! vendor RAID implementation satisfies.
//!
//! The surrounding system holds an exclusive per-node lock for the whole
//! of cleaning or deployment; nothing in this crate synchronizes on its
//! own.

pub mod filter;
pub mod interface;
pub mod node;
pub mod oob;
pub mod orchestrator;
pub mod reconciler;
pub mod steps;

pub use filter::filter_target_raid_config;
pub use interface::RaidInterface;
pub use node::InMemoryNodeStore;
pub use node::Node;
pub use node::NodeStore;
pub use node::Task;
pub use oob::BootControl;
pub use oob::OobRaidController;
pub use orchestrator::OobRaid;
pub use reconciler::update_raid_info;
pub use steps::StepState;
