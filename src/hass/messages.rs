// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Mac;

/// Status payload published when the daemon is running.
pub const STATUS_ONLINE: &str = "online";
/// Status payload published (or willed) when the daemon is gone.
pub const STATUS_OFFLINE: &str = "offline";
/// State payload for a station that is present.
pub const PAYLOAD_HOME: &str = "connected";
/// State payload for a station that is away.
pub const PAYLOAD_NOT_HOME: &str = "not_connected";
/// Device-tracker source type reported to Home Assistant.
pub const SOURCE_TYPE_ROUTER: &str = "router";

// https://materialdesignicons.com/icon/wifi-marker
pub(crate) const ICON: &str = "mdi:wifi-marker";

/// A raw configuration message as delivered by the broker. The payload
/// is decoded by the reconciler so that a malformed document fails the
/// reconciliation, not the subscription.
#[derive(Debug, Clone)]
pub struct ConfigFrame {
    /// Whether the broker delivered this as a retained message.
    pub retained: bool,
    /// Raw JSON payload.
    pub payload: Vec<u8>,
}

/// The JSON configuration document received on the config topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Stations to track.
    #[serde(default)]
    pub devices: Vec<TrackConfig>,
}

/// A single WiFi station to monitor for state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Human label for the station.
    pub name: String,
    /// MAC address text; parsed by the reconciler.
    pub mac: String,
}

/// Home Assistant MQTT discovery document for a device tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTracker {
    /// Topic carrying the daemon's online/offline status.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub availability_topic: String,
    /// Device-registry information.
    #[serde(default)]
    pub device: DeviceInfo,
    /// Entity icon.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub icon: String,
    /// Topic carrying the JSON attributes document.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub json_attributes_topic: String,
    /// Name of the device tracker entity.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub name: String,
    /// Used instead of `name` for `entity_id` generation.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub object_id: String,
    /// Payload representing the available state.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub payload_available: String,
    /// Payload representing the `home` state.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub payload_home: String,
    /// Payload representing the unavailable state.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub payload_not_available: String,
    /// Payload representing the `not_home` state.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub payload_not_home: String,
    /// QoS level of the state topic.
    pub qos: u8,
    /// `gps`, `router`, `bluetooth`, or `bluetooth_le`.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub source_type: String,
    /// Topic carrying the state payloads.
    pub state_topic: String,
    /// Unique ID of this device tracker.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub unique_id: String,
}

/// Device-registry block of the discovery document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Connections as `[connection_type, identifier]` tuples, e.g.
    /// `["mac", "04:AB:00:12:34:56"]`.
    pub connections: Vec<[String; 2]>,
    /// Device name.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub name: String,
    /// The device this one is reached through (the AP).
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub via_device: String,
    /// Manufacturer, looked up by OUI.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub manufacturer: String,
}

/// The JSON attributes document published alongside a station's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attrs {
    /// Configured station name.
    pub name: String,
    /// Station address.
    pub mac: Mac,
    /// Whether the station is associated.
    pub connected: bool,
    /// Name of the reporting AP.
    pub ap_name: String,
    /// Network name the station is (or was) associated with.
    pub ssid: String,
    /// Radio the station is (or was) associated with.
    pub bssid: String,
    /// When the station last associated.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connected_at: Option<DateTime<Utc>>,
    /// Seconds the station has been (or was) associated.
    #[serde(skip_serializing_if = "is_zero", default)]
    pub connected_for: i64,
    /// When the station last disassociated.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub disconnected_at: Option<DateTime<Utc>>,
    /// Seconds since the station last disassociated.
    #[serde(skip_serializing_if = "is_zero", default)]
    pub disconnected_for: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &i64) -> bool {
    *v == 0
}
