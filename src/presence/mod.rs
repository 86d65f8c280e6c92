// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The presence daemon: per-station state tracking driven by hostapd
//! events and published over MQTT.
//!
//! [`Daemon`] consumes its collaborators through two seam traits so the
//! state machine can be exercised without a broker or a real hostapd:
//! [`AccessPoint`] (implemented by [`hostapd::Client`]) and
//! [`PresenceBus`] (implemented by [`hass::Mqtt`]). Trait methods
//! return named `Send` futures because the daemon spawns them onto the
//! runtime.
//!
//! [`hostapd::Client`]: crate::hostapd::Client
//! [`hass::Mqtt`]: crate::hass::Mqtt

mod daemon;
mod debounce;
mod registry;

pub use daemon::{Daemon, DaemonBuilder};
pub use debounce::Debouncer;
pub use registry::{StationRegistry, TrackedStation};

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::hass::{Attrs, ConfigFrame, Mqtt};
use crate::hostapd::{ApStatus, Client, Event, HostapdError, Station};
use crate::types::Mac;

/// One wireless access point's control endpoint.
pub trait AccessPoint: Send + Sync + 'static {
    /// Returns a snapshot of the AP's status.
    fn status(&self) -> impl Future<Output = std::result::Result<ApStatus, HostapdError>> + Send;

    /// Returns the stations the AP currently reports.
    ///
    /// [`HostapdError::UnknownCommand`] marks an endpoint without
    /// station enumeration; callers may treat that as an empty list.
    fn stations(
        &self,
    ) -> impl Future<Output = std::result::Result<Vec<Station>, HostapdError>> + Send;

    /// Streams unsolicited events into the bounded `events` channel,
    /// preserving order, until cancellation (`Ok`) or an error.
    /// [`HostapdError::Terminating`] signals the AP's own shutdown.
    fn attach(
        &self,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> impl Future<Output = std::result::Result<(), HostapdError>> + Send;
}

impl AccessPoint for Client {
    async fn status(&self) -> std::result::Result<ApStatus, HostapdError> {
        Client::status(self).await
    }

    async fn stations(&self) -> std::result::Result<Vec<Station>, HostapdError> {
        Client::stations(self).await
    }

    async fn attach(
        &self,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> std::result::Result<(), HostapdError> {
        Client::attach(self, events, cancel).await
    }
}

/// The pub/sub side of the daemon: status, discovery, state and
/// attribute publishes, plus the configuration subscription and the
/// broker's connection-lost signal.
pub trait PresenceBus: Clone + Send + Sync + 'static {
    /// Publishes `online` on the status topic.
    fn status_online(&self) -> impl Future<Output = Result<()>> + Send;

    /// Publishes `offline` on the status topic.
    fn status_offline(&self) -> impl Future<Output = Result<()>> + Send;

    /// Advertises a station to the controller.
    fn register_device_tracker(
        &self,
        name: &str,
        mac: Mac,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Withdraws a station's advertisement.
    fn unregister_device_tracker(&self, mac: Mac) -> impl Future<Output = Result<()>> + Send;

    /// Publishes the station's state as home.
    fn station_home(&self, mac: Mac) -> impl Future<Output = Result<()>> + Send;

    /// Publishes the station's state as not home.
    fn station_not_home(&self, mac: Mac) -> impl Future<Output = Result<()>> + Send;

    /// Publishes the station's attributes document.
    fn station_attributes(
        &self,
        mac: Mac,
        attrs: &Attrs,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Subscribes to the tracking configuration topic. At most one
    /// subscription per client.
    fn subscribe_config(&self) -> impl Future<Output = Result<mpsc::Receiver<ConfigFrame>>> + Send;

    /// Resolves when the connection to the broker is lost.
    fn connection_lost(&self) -> impl Future<Output = Error> + Send;
}

impl PresenceBus for Mqtt {
    async fn status_online(&self) -> Result<()> {
        Mqtt::status_online(self).await
    }

    async fn status_offline(&self) -> Result<()> {
        Mqtt::status_offline(self).await
    }

    async fn register_device_tracker(&self, name: &str, mac: Mac) -> Result<()> {
        Mqtt::register_device_tracker(self, name, mac).await
    }

    async fn unregister_device_tracker(&self, mac: Mac) -> Result<()> {
        Mqtt::unregister_device_tracker(self, mac).await
    }

    async fn station_home(&self, mac: Mac) -> Result<()> {
        Mqtt::station_home(self, mac).await
    }

    async fn station_not_home(&self, mac: Mac) -> Result<()> {
        Mqtt::station_not_home(self, mac).await
    }

    async fn station_attributes(&self, mac: Mac, attrs: &Attrs) -> Result<()> {
        Mqtt::station_attributes(self, mac, attrs).await
    }

    async fn subscribe_config(&self) -> Result<mpsc::Receiver<ConfigFrame>> {
        Mqtt::subscribe_config(self).await
    }

    async fn connection_lost(&self) -> Error {
        Mqtt::connection_lost(self).await
    }
}
