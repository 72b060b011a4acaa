// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The declarative RAID configuration model and its validation
//!
//! Operators submit a `RaidConfig` document describing the logical disks
//! they want; the orchestrator later reads one back from hardware in the
//! same shape.  Validation happens here, at the submission boundary, so a
//! malformed document never reaches the driver workflow.

use schemars::JsonSchema;
use schemars::gen::SchemaGenerator;
use schemars::schema::InstanceType;
use schemars::schema::Schema;
use schemars::schema::SchemaObject;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;

/// RAID level of a logical disk.
///
/// The set here is what the generic schema accepts; a vendor backend may
/// reject levels its hardware cannot build when it validates.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum RaidLevel {
    #[serde(rename = "0")]
    Raid0,
    #[serde(rename = "1")]
    Raid1,
    #[serde(rename = "2")]
    Raid2,
    #[serde(rename = "5")]
    Raid5,
    #[serde(rename = "6")]
    Raid6,
    #[serde(rename = "1+0")]
    Raid10,
    #[serde(rename = "5+0")]
    Raid50,
    #[serde(rename = "6+0")]
    Raid60,
    #[serde(rename = "JBOD")]
    Jbod,
}

impl RaidLevel {
    /// The wire spelling, also used in the `raid_level` capability token.
    pub fn as_str(&self) -> &'static str {
        match self {
            RaidLevel::Raid0 => "0",
            RaidLevel::Raid1 => "1",
            RaidLevel::Raid2 => "2",
            RaidLevel::Raid5 => "5",
            RaidLevel::Raid6 => "6",
            RaidLevel::Raid10 => "1+0",
            RaidLevel::Raid50 => "5+0",
            RaidLevel::Raid60 => "6+0",
            RaidLevel::Jbod => "JBOD",
        }
    }
}

impl fmt::Display for RaidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested size of a logical disk: a positive number of GiB, or the
/// literal `"MAX"` to use all remaining capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeGb {
    Max,
    Gigabytes(u64),
}

impl SizeGb {
    /// The resolved size, if this is not the `MAX` sentinel.
    pub fn gigabytes(&self) -> Option<u64> {
        match self {
            SizeGb::Max => None,
            SizeGb::Gigabytes(n) => Some(*n),
        }
    }
}

impl Serialize for SizeGb {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            SizeGb::Max => s.serialize_str("MAX"),
            SizeGb::Gigabytes(n) => s.serialize_u64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for SizeGb {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct SizeGbVisitor;

        impl<'de> de::Visitor<'de> for SizeGbVisitor {
            type Value = SizeGb;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a positive integer or the string \"MAX\"")
            }

            fn visit_u64<E: de::Error>(self, n: u64) -> Result<SizeGb, E> {
                if n == 0 {
                    return Err(E::custom("size_gb must be greater than 0"));
                }
                Ok(SizeGb::Gigabytes(n))
            }

            fn visit_i64<E: de::Error>(self, n: i64) -> Result<SizeGb, E> {
                if n <= 0 {
                    return Err(E::custom("size_gb must be greater than 0"));
                }
                Ok(SizeGb::Gigabytes(n as u64))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<SizeGb, E> {
                if s == "MAX" {
                    Ok(SizeGb::Max)
                } else {
                    Err(E::custom(format!(
                        "size_gb must be a positive integer or \"MAX\", \
                         not {:?}",
                        s
                    )))
                }
            }
        }

        d.deserialize_any(SizeGbVisitor)
    }
}

impl JsonSchema for SizeGb {
    fn schema_name() -> String {
        "SizeGb".to_string()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        let mut integer = SchemaObject {
            instance_type: Some(InstanceType::Integer.into()),
            ..Default::default()
        };
        integer.number().minimum = Some(1.0);
        let max_sentinel = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(vec!["MAX".into()]),
            ..Default::default()
        };
        let mut schema = SchemaObject::default();
        schema.subschemas().one_of =
            Some(vec![integer.into(), max_sentinel.into()]);
        Schema::Object(schema)
    }
}

/// Physical disk media to build a logical disk from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Hdd,
    Ssd,
}

/// Bus interface of the physical disks backing a logical disk.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Sata,
    Scsi,
    Sas,
}

/// One requested RAID volume within a [`RaidConfig`].
///
/// `raid_level` and `size_gb` are required; everything else is a hint the
/// backend may use to pick hardware.  Unknown fields are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LogicalDisk {
    /// RAID level for the logical disk.
    pub raid_level: RaidLevel,

    /// Size of the logical disk in GiB, or "MAX" to use all remaining
    /// space available on the chosen physical disks.
    pub size_gb: SizeGb,

    /// Whether this logical disk will hold the root filesystem.  At most
    /// one logical disk in a configuration may set this.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_root_volume: bool,

    /// Name to assign to the logical disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,

    /// Type of physical disk media to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<DiskType>,

    /// Bus interface of the physical disks to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<InterfaceType>,

    /// Whether the backing physical disks may be shared with other
    /// logical disks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_physical_disks: Option<bool>,

    /// Number of physical disks to back the logical disk with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_physical_disks: Option<u32>,

    /// Identifier of the RAID controller to build the logical disk on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// Identifiers of the specific physical disks to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_disks: Option<Vec<String>>,

    /// Hints identifying the created logical disk as the node's root
    /// device, in root-device-hint form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_device_hint: Option<BTreeMap<String, serde_json::Value>>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A declarative RAID configuration: the ordered set of logical disks the
/// operator wants on a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RaidConfig {
    /// The logical disks to create, in order of declaration.
    pub logical_disks: Vec<LogicalDisk>,
}

impl RaidConfig {
    /// Semantic checks on an already well-formed document.
    ///
    /// Today this is the single-root-volume rule; structural conformance is
    /// enforced by typed deserialization in [`validate_configuration`].
    pub fn validate(&self) -> Result<(), Error> {
        self.root_volume().map(|_| ())
    }

    /// Returns the root logical disk, if one is declared.
    ///
    /// Fails if more than one logical disk claims to be the root volume;
    /// that is never resolved silently.
    pub fn root_volume(&self) -> Result<Option<&LogicalDisk>, Error> {
        let mut roots =
            self.logical_disks.iter().filter(|disk| disk.is_root_volume);
        let first = roots.next();
        let extra = roots.count();
        if extra > 0 {
            return Err(Error::validation(format!(
                "expected at most one root volume, found {}",
                extra + 1
            )));
        }
        Ok(first)
    }
}

/// Validates an operator-submitted RAID configuration document.
///
/// Structural validation is typed deserialization against the
/// [`RaidConfig`] model (unknown fields rejected, `size_gb` must be a
/// positive integer or `"MAX"`), followed by the semantic checks of
/// [`RaidConfig::validate`].  Side-effect free.
pub fn validate_configuration(
    raid_config: &serde_json::Value,
) -> Result<RaidConfig, Error> {
    let config: RaidConfig = serde_json::from_value(raid_config.clone())
        .map_err(|e| Error::validation(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Returns the allowed logical-disk properties and their descriptions,
/// extracted from the generated configuration schema.
///
/// This is a documentation surface (CLI help, API metadata); it performs no
/// validation.
pub fn logical_disk_properties() -> BTreeMap<String, String> {
    let root = schemars::schema_for!(LogicalDisk);
    let mut properties = BTreeMap::new();
    if let Some(object) = root.schema.object {
        for (name, schema) in object.properties {
            let description = match schema {
                Schema::Object(obj) => {
                    obj.metadata.and_then(|m| m.description)
                }
                Schema::Bool(_) => None,
            };
            properties.insert(name, description.unwrap_or_default());
        }
    }
    properties
}
