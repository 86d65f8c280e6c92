// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT topic layout.

use crate::types::Mac;

/// Default topic prefix for the daemon's own topics.
pub const DEFAULT_TOPIC_PREFIX: &str = "wifi-presence";
/// Default Home Assistant discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Topic construction for one AP name.
#[derive(Debug, Clone)]
pub struct Topics {
    ap_name: String,
    prefix: String,
    discovery_prefix: String,
}

impl Topics {
    /// Creates a topic layout; empty prefixes fall back to the
    /// defaults.
    #[must_use]
    pub fn new(
        ap_name: impl Into<String>,
        prefix: impl Into<String>,
        discovery_prefix: impl Into<String>,
    ) -> Self {
        let mut prefix = prefix.into();
        if prefix.is_empty() {
            prefix = DEFAULT_TOPIC_PREFIX.to_string();
        }
        let mut discovery_prefix = discovery_prefix.into();
        if discovery_prefix.is_empty() {
            discovery_prefix = DEFAULT_DISCOVERY_PREFIX.to_string();
        }

        Self {
            ap_name: ap_name.into(),
            prefix,
            discovery_prefix,
        }
    }

    /// Status topic, also used as the connection's last-will topic.
    #[must_use]
    pub fn will(&self) -> String {
        format!("{}/{}/status", self.prefix, sanitize_topic(&self.ap_name))
    }

    /// Topic on which tracking configuration updates arrive.
    #[must_use]
    pub fn config(&self) -> String {
        format!("{}/config", self.prefix)
    }

    /// Home Assistant discovery topic for a station.
    ///
    /// Format: `<discovery_prefix>/device_tracker/<node_id>/<object_id>/config`,
    /// where both IDs may only contain `[a-zA-Z0-9_-]`.
    /// <https://www.home-assistant.io/docs/mqtt/discovery/#discovery-topic>
    #[must_use]
    pub fn device_discovery(&self, mac: Mac) -> String {
        format!(
            "{}/device_tracker/{}/{}/config",
            self.discovery_prefix,
            sanitize_topic(&self.ap_name),
            mac_segment(mac),
        )
    }

    /// Topic carrying a station's state payloads.
    #[must_use]
    pub fn device_state(&self, mac: Mac) -> String {
        format!(
            "{}/station/{}/{}/state",
            self.prefix,
            sanitize_topic(&self.ap_name),
            mac_segment(mac),
        )
    }

    /// Topic carrying a station's JSON attributes.
    #[must_use]
    pub fn device_attributes(&self, mac: Mac) -> String {
        format!(
            "{}/station/{}/{}/attrs",
            self.prefix,
            sanitize_topic(&self.ap_name),
            mac_segment(mac),
        )
    }

    /// Entity object id for a station: lowercase MAC hex joined with
    /// the sanitized AP name.
    #[must_use]
    pub fn object_id(&self, mac: Mac) -> String {
        let hex: String = mac
            .to_string()
            .chars()
            .filter(|c| *c != ':')
            .collect::<String>()
            .to_lowercase();
        format!("{hex}_{}", sanitize_topic(&self.ap_name))
    }
}

/// Lowercases and strips everything outside `[a-zA-Z0-9_-]`, the
/// character class Home Assistant allows in discovery topic segments.
fn sanitize_topic(v: &str) -> String {
    v.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect::<String>()
        .to_lowercase()
}

/// MAC as a topic segment: lowercase, `:` replaced with `-`.
fn mac_segment(mac: Mac) -> String {
    mac.to_string().to_lowercase().replace(':', "-")
}
