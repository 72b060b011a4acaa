// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling facilities for the RAID subsystem
//!
//! Validation-phase errors (`Validation`, `MissingParameter`) are surfaced
//! synchronously to whoever submitted the configuration and never mutate
//! persisted node state.  Orchestration-phase errors (`Oob`,
//! `ConfigurationFailed`) are raised only after in-flight progress markers
//! have been rolled back, so a retry always starts from a clean slate.

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// An error generated within the RAID configuration subsystem.
#[derive(Clone, Debug, Deserialize, thiserror::Error, PartialEq, Serialize)]
pub enum Error {
    /// The submitted RAID configuration does not conform to the
    /// configuration schema, or violates the single-root-volume rule.
    #[error("invalid RAID configuration: {message}")]
    Validation { message: String },

    /// A required input was absent, or filtering left nothing to do.
    #[error("missing parameter: {message}")]
    MissingParameter { message: String },

    /// A value read back from hardware or stored on the node is not usable.
    #[error("invalid value for {label}: {message}")]
    InvalidValue { label: String, message: String },

    /// The out-of-band controller reported completion but the resulting
    /// layout does not match what was asked for.
    #[error("RAID configuration failed on node {node}: {message}")]
    ConfigurationFailed { node: Uuid, message: String },

    /// An error from the out-of-band controller itself.
    #[error("out-of-band controller error: {0}")]
    Oob(#[from] OobError),

    /// No node with the given id exists in the store.
    #[error("node {0} not found")]
    NodeNotFound(Uuid),
}

impl Error {
    pub fn validation<S: Into<String>>(message: S) -> Error {
        Error::Validation { message: message.into() }
    }

    pub fn missing_parameter<S: Into<String>>(message: S) -> Error {
        Error::MissingParameter { message: message.into() }
    }

    pub fn invalid_value<L, S>(label: L, message: S) -> Error
    where
        L: Into<String>,
        S: Into<String>,
    {
        Error::InvalidValue { label: label.into(), message: message.into() }
    }
}

/// An error raised by a vendor's out-of-band controller client.
///
/// The orchestrator branches on these explicitly: `NotFound` during a delete
/// is a benign no-op, everything else rolls back in-flight progress markers
/// before failing the clean or deploy step.
#[derive(Clone, Debug, Deserialize, thiserror::Error, PartialEq, Serialize)]
pub enum OobError {
    /// Talking to the controller failed (network, BMC, firmware session).
    #[error("communication with the out-of-band controller failed: {0}")]
    Communication(String),

    /// The requested object does not exist on the controller.
    #[error("no RAID configuration found on the controller")]
    NotFound,

    /// Any other vendor-reported failure.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod test {
    use super::Error;
    use super::OobError;

    #[test]
    fn test_oob_error_converts() {
        let err: Error = OobError::Communication("ssl handshake".into()).into();
        assert_eq!(
            err,
            Error::Oob(OobError::Communication("ssl handshake".into()))
        );
        assert!(
            err.to_string().contains("communication with the out-of-band")
        );
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = Error::invalid_value("size_gb", "not a resolved integer");
        assert_eq!(
            err.to_string(),
            "invalid value for size_gb: not a resolved integer"
        );
    }
}
