// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT integration with Home Assistant.
//!
//! This module owns everything the daemon publishes or receives over
//! the bus: the topic layout, the payload documents (device-tracker
//! discovery, state, attributes), and the [`Mqtt`] client itself.
//! Home Assistant contract:
//! <https://www.home-assistant.io/integrations/device_tracker.mqtt/>

mod messages;
mod mqtt;
mod topics;
mod vendors;

pub use messages::{
    Attrs, ConfigFrame, Configuration, DeviceInfo, DeviceTracker, TrackConfig, PAYLOAD_HOME,
    PAYLOAD_NOT_HOME, SOURCE_TYPE_ROUTER, STATUS_OFFLINE, STATUS_ONLINE,
};
pub use mqtt::{Mqtt, MqttConfig};
pub use topics::Topics;
pub use vendors::vendor_by_mac;
