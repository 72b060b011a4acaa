// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `key:value,key:value` capabilities string stored in node properties
//!
//! Schedulers match on this string, so updates must be merges: changing one
//! capability may not disturb the relative order or content of the others.

use schemars::JsonSchema;
use schemars::gen::SchemaGenerator;
use schemars::schema::InstanceType;
use schemars::schema::Schema;
use schemars::schema::SchemaObject;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// An ordered set of `key:value` capability tokens.
///
/// The wire and database form is a single comma-separated string, e.g.
/// `"boot_mode:bios,raid_level:1"`.  Token order is preserved across
/// parse/format and across upserts of existing keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capabilities {
    tokens: Vec<(String, String)>,
}

// The serialized form is a plain string, so the schema must say so rather
// than describing the in-memory representation.
impl JsonSchema for Capabilities {
    fn schema_name() -> String {
        "Capabilities".to_string()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            ..Default::default()
        };
        schema.metadata().description = Some(
            "Comma-separated `key:value` capability tokens".to_string(),
        );
        Schema::Object(schema)
    }
}

impl Capabilities {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key` to `value`, replacing an existing token in place or
    /// appending a new one.  Unrelated tokens are untouched.
    pub fn upsert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let value = value.into();
        match self.tokens.iter_mut().find(|(k, _)| *k == key) {
            Some(token) => token.1 = value,
            None => self.tokens.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.tokens.iter().position(|(k, _)| k == key)?;
        Some(self.tokens.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.tokens {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Capabilities {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = Vec::new();
        for token in s.split(',') {
            if token.is_empty() {
                continue;
            }
            let Some((key, value)) = token.split_once(':') else {
                return Err(Error::invalid_value(
                    "capabilities",
                    format!("malformed token {:?}, expected \"key:value\"", token),
                ));
            };
            tokens.push((key.to_string(), value.to_string()));
        }
        Ok(Capabilities { tokens })
    }
}

impl TryFrom<String> for Capabilities {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Capabilities> for String {
    fn from(caps: Capabilities) -> String {
        caps.to_string()
    }
}
