// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unsolicited control-interface events.

use crate::hostapd::HostapdError;
use crate::types::Mac;

// Event prefixes used by the hostapd control interface. These and
// others are documented in the wpa_supplicant / hostapd sources:
// https://w1.fi/wpa_supplicant/devel/ctrl_iface_page.html
const EVENT_STA_CONNECTED: &str = "AP-STA-CONNECTED";
const EVENT_STA_DISCONNECTED: &str = "AP-STA-DISCONNECTED";
const EVENT_TERMINATING: &str = "CTRL-EVENT-TERMINATING";

/// An unsolicited message received from an attached control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A station (WiFi client) associated with the AP.
    StationConnected {
        /// Address of the station.
        mac: Mac,
    },

    /// A station disconnected from the AP.
    StationDisconnected {
        /// Address of the station.
        mac: Mac,
    },

    /// hostapd is shutting down, e.g. because the wireless
    /// configuration changed and the service is restarting.
    Terminating,

    /// Catch-all for event kinds this client does not interpret.
    Unrecognized(String),
}

impl Event {
    /// Parses a control-interface message into an event.
    ///
    /// Messages may carry a `<N>` priority prefix which is stripped.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty message or a station event whose
    /// MAC address is malformed.
    pub fn parse(msg: &str) -> Result<Self, HostapdError> {
        if msg.is_empty() {
            return Err(HostapdError::InvalidResponse(msg.to_string()));
        }

        let bytes = msg.as_bytes();
        let msg = if bytes[0] == b'<' && bytes.len() >= 3 && bytes[2] == b'>' {
            &msg[3..]
        } else {
            msg
        };

        if let Some(rest) = msg.strip_prefix(EVENT_STA_CONNECTED) {
            // Example: "<3>AP-STA-CONNECTED 04:ab:00:12:34:56"
            let mac = parse_event_mac(rest)?;
            return Ok(Self::StationConnected { mac });
        }

        if let Some(rest) = msg.strip_prefix(EVENT_STA_DISCONNECTED) {
            let mac = parse_event_mac(rest)?;
            return Ok(Self::StationDisconnected { mac });
        }

        if msg == EVENT_TERMINATING {
            return Ok(Self::Terminating);
        }

        Ok(Self::Unrecognized(msg.to_string()))
    }
}

fn parse_event_mac(rest: &str) -> Result<Mac, HostapdError> {
    let text = rest.trim();
    text.parse()
        .map_err(|_| HostapdError::InvalidMac(text.to_string()))
}
