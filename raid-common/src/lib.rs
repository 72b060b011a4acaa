// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared types for the RAID configuration subsystem of the bare-metal
//! provisioning plane.
//!
//! This crate holds the declarative RAID configuration model submitted by
//! operators, its validation, and the small codecs shared between the API
//! surface and the driver-facing orchestrator in `raid-orchestrator`.
//! Nothing in here performs I/O.

pub mod capabilities;
pub mod config;
pub mod error;

pub use capabilities::Capabilities;
pub use config::LogicalDisk;
pub use config::RaidConfig;
pub use config::RaidLevel;
pub use config::SizeGb;
pub use config::logical_disk_properties;
pub use config::validate_configuration;
pub use error::Error;
pub use error::OobError;
