// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `wifi-presence` daemon.
//!
//! Module-local failures (`hostapd` control-interface errors, MAC
//! parsing) have their own enums and convert into the crate-level
//! [`Error`] via `#[from]`.

use std::time::Duration;

use thiserror::Error;

use crate::hostapd::HostapdError;
use crate::types::MacParseError;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A MAC address could not be parsed.
    #[error("MAC address error: {0}")]
    Mac(#[from] MacParseError),

    /// The hostapd control interface failed.
    #[error("hostapd error: {0}")]
    Hostapd(#[from] HostapdError),

    /// The MQTT client rejected an operation.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// A bus payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// A publish did not complete within its deadline.
    #[error("publish timed out after {0:?}")]
    PublishTimeout(Duration),

    /// The connection to the MQTT broker was lost.
    #[error("MQTT connection lost: {0}")]
    ConnectionLost(String),

    /// An internal channel closed unexpectedly.
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    /// The daemon was constructed with an invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl Error {
    /// Returns true if this error was caused by hostapd announcing
    /// its own shutdown, which warrants a dedicated exit code.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        matches!(self, Self::Hostapd(HostapdError::Terminating))
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
