// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `wifi-presence` — WiFi device presence for Home Assistant.
//!
//! A long-running agent that watches one or more hostapd control
//! interfaces, keeps an authoritative view of which configured client
//! devices are associated, and publishes per-device presence state and
//! attributes over MQTT so a home-automation controller can treat each
//! device as a home/not-home tracker.
//!
//! # How it works
//!
//! - The set of devices to track arrives as a retained JSON message on
//!   the configuration topic; the daemon diffs it against its registry
//!   and (un)advertises Home Assistant device trackers accordingly.
//! - Each AP's event stream drives per-station state: connects publish
//!   `connected` immediately, disconnects are debounced so a client
//!   that bounces back within the configured delay never appears away.
//! - When a client roams between radios, the stale disconnect from the
//!   previous AP is recognized by its BSSID and ignored.
//!
//! # Topics
//!
//! With the default prefixes:
//!
//! | Topic | Contents |
//! |---|---|
//! | `wifi-presence/<ap>/status` | `online`/`offline`, also the last will |
//! | `wifi-presence/config` | tracking configuration (input) |
//! | `homeassistant/device_tracker/<ap>/<mac>/config` | discovery document |
//! | `wifi-presence/station/<ap>/<mac>/state` | `connected`/`not_connected` |
//! | `wifi-presence/station/<ap>/<mac>/attrs` | JSON attributes |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use tokio_util::sync::CancellationToken;
//! use wifi_presence::hass::{Mqtt, MqttConfig};
//! use wifi_presence::hostapd::Client;
//! use wifi_presence::presence::Daemon;
//!
//! #[tokio::main]
//! async fn main() -> wifi_presence::Result<()> {
//!     let mqtt = Mqtt::connect(MqttConfig {
//!         broker_addr: "mqtt://broker.local:1883".to_string(),
//!         ap_name: "attic".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     let hostapd = Client::connect(std::env::temp_dir(), "/var/run/hostapd/wlan0").await?;
//!
//!     let daemon = Daemon::builder()
//!         .ap_name("attic")
//!         .bus(mqtt)
//!         .access_point(hostapd)
//!         .debounce(Duration::from_secs(10))
//!         .build()
//!         .await?;
//!
//!     daemon.run(CancellationToken::new()).await
//! }
//! ```

pub mod error;
pub mod hass;
pub mod hostapd;
pub mod presence;
pub mod types;

pub use error::{Error, Result};
pub use presence::{AccessPoint, Daemon, DaemonBuilder, PresenceBus};
pub use types::Mac;
