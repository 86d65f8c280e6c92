// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! hostapd control-interface client.
//!
//! hostapd exposes a UNIX datagram socket per radio (the
//! `ctrl_interface` option). This module implements the small subset of
//! the control protocol the daemon needs: status and station queries,
//! plus the `ATTACH` event stream for connect/disconnect notifications.
//! Protocol reference:
//! <https://w1.fi/wpa_supplicant/devel/ctrl_iface_page.html>

mod client;
mod conn;
mod ctrl;
mod event;
mod station;
mod status;

pub use client::Client;
pub use event::Event;
pub use station::Station;
pub use status::ApStatus;

use thiserror::Error;

/// Errors related to the hostapd control interface.
#[derive(Debug, Error)]
pub enum HostapdError {
    /// Socket-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// hostapd replied `UNKNOWN COMMAND`. Stripped-down hostapd builds
    /// omit station enumeration; callers may treat this as non-fatal
    /// for that command.
    #[error("sent command {0:?}, received unknown command response")]
    UnknownCommand(String),

    /// hostapd announced it is exiting (`CTRL-EVENT-TERMINATING`).
    #[error("hostapd is terminating")]
    Terminating,

    /// A command produced a reply we did not expect.
    #[error("unexpected response to {command}: {response:?}")]
    UnexpectedResponse {
        /// The command that was sent.
        command: String,
        /// The reply that came back.
        response: String,
    },

    /// A response line could not be parsed.
    #[error("invalid response line {0:?}")]
    InvalidResponse(String),

    /// An event carried a malformed MAC address.
    #[error("invalid MAC address {0:?}")]
    InvalidMac(String),

    /// No reply arrived within the command deadline.
    #[error("timed out waiting on command {0:?}")]
    Timeout(String),
}
