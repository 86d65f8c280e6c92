// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The presence daemon.
//!
//! One daemon instance watches N access points and keeps the station
//! registry in sync with (a) the tracking configuration received over
//! the bus, (b) each AP's connect/disconnect event stream, and (c) an
//! initial station snapshot per AP. Registry changes drive the
//! discovery, state, and attribute publishes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::hass::{Attrs, ConfigFrame, Configuration};
use crate::hostapd::{ApStatus, Event, HostapdError, Station};
use crate::presence::debounce::Debouncer;
use crate::presence::registry::{StationRegistry, TrackedStation};
use crate::presence::{AccessPoint, PresenceBus};
use crate::types::Mac;

/// Deadline for every individual bus publish, so that teardown cannot
/// hang on a wedged broker.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// Default hold time before a disconnect becomes a `not_home` publish.
const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);

/// Capacity of each per-AP event channel. Bounds how far a hostapd
/// reader can run ahead of the router before it stalls.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// How one configured station differs from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaChange {
    NoChange,
    Added,
    Updated,
    Removed,
}

impl StaChange {
    fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "no-change",
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
        }
    }
}

/// One entry of a reconciliation plan.
#[derive(Debug)]
struct ConfigChange {
    mac: Mac,
    name: String,
    change: StaChange,
}

/// A station found associated during the initial snapshot, together
/// with the AP that reported it.
struct ConnectedStation {
    ap: ApStatus,
    station: Station,
}

struct Ap<A> {
    client: Arc<A>,
    status: ApStatus,
}

/// Builder for [`Daemon`].
pub struct DaemonBuilder<B, A> {
    ap_name: String,
    bus: Option<B>,
    aps: Vec<A>,
    debounce: Duration,
    autodiscovery: bool,
}

impl<B: PresenceBus, A: AccessPoint> DaemonBuilder<B, A> {
    /// Creates a builder with the default debounce delay and
    /// autodiscovery enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ap_name: String::new(),
            bus: None,
            aps: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
            autodiscovery: true,
        }
    }

    /// Sets the access point name used in topic paths and payloads.
    #[must_use]
    pub fn ap_name(mut self, name: impl Into<String>) -> Self {
        self.ap_name = name.into();
        self
    }

    /// Sets the bus client. Required.
    #[must_use]
    pub fn bus(mut self, bus: B) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Adds an access point. Required at least once; hosts with
    /// multiple radios add one client per control socket.
    #[must_use]
    pub fn access_point(mut self, ap: A) -> Self {
        self.aps.push(ap);
        self
    }

    /// Sets how long to wait before treating a disconnect as a
    /// departure. Zero is valid.
    #[must_use]
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Enables or disables Home Assistant autodiscovery publishes.
    #[must_use]
    pub fn autodiscovery(mut self, enabled: bool) -> Self {
        self.autodiscovery = enabled;
        self
    }

    /// Builds the daemon, capturing each AP's status.
    ///
    /// The status is collected once: the values used (SSID, BSSID) are
    /// not expected to change over the process lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error when the bus or APs are missing, the AP name is
    /// blank, or a status query fails.
    pub async fn build(self) -> Result<Daemon<B, A>> {
        let bus = self
            .bus
            .ok_or(Error::InvalidConfig("a bus client is required"))?;
        if self.aps.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one access point is required",
            ));
        }
        if self.ap_name.is_empty() {
            return Err(Error::InvalidConfig("AP name cannot be blank"));
        }

        let mut aps = Vec::with_capacity(self.aps.len());
        for client in self.aps {
            let status = client.status().await?;
            aps.push(Ap {
                client: Arc::new(client),
                status,
            });
        }

        Ok(Daemon {
            inner: Arc::new(DaemonInner {
                ap_name: self.ap_name,
                bus,
                aps,
                registry: StationRegistry::new(),
                debouncer: Debouncer::new(self.debounce),
                autodiscovery: self.autodiscovery,
            }),
        })
    }
}

impl<B: PresenceBus, A: AccessPoint> Default for DaemonBuilder<B, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// The presence daemon. Cheaply cloneable; all state is behind one
/// shared inner.
pub struct Daemon<B, A> {
    inner: Arc<DaemonInner<B, A>>,
}

impl<B, A> Clone for Daemon<B, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct DaemonInner<B, A> {
    ap_name: String,
    bus: B,
    aps: Vec<Ap<A>>,
    registry: StationRegistry,
    debouncer: Debouncer,
    autodiscovery: bool,
}

impl<B: PresenceBus, A: AccessPoint> Daemon<B, A> {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> DaemonBuilder<B, A> {
        DaemonBuilder::new()
    }

    /// Runs the daemon until cancellation or a terminal error.
    ///
    /// Publishes `online` on entry and `offline` on the way out (with
    /// an independent timeout, so a cancelled context cannot skip it).
    /// Discovery documents are left in place on shutdown; only the
    /// reconciler withdraws them.
    ///
    /// # Errors
    ///
    /// Returns the first worker failure; `Ok` on clean cancellation.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.publish(self.inner.bus.status_online()).await?;

        let result = self.run_workers(cancel).await;

        if let Err(e) = self.publish(self.inner.bus.status_offline()).await {
            tracing::warn!(error = %e, "failed to publish offline status");
        }

        result
    }

    /// Spawns the worker fan-in: the config subscription, one
    /// reader/router pair per AP, the async-publish-error sentinel,
    /// and the connection-lost watcher. The first failing worker
    /// cancels the group; the first error is returned after all
    /// workers have stopped.
    async fn run_workers(&self, cancel: CancellationToken) -> Result<()> {
        let (pub_errs_tx, mut pub_errs_rx) = mpsc::channel::<Error>(1);
        let mut workers: JoinSet<Result<()>> = JoinSet::new();

        {
            let cancel = cancel.clone();
            workers.spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => Ok(()),
                    err = pub_errs_rx.recv() => match err {
                        Some(e) => Err(e),
                        None => Ok(()),
                    },
                }
            });
        }

        {
            let daemon = self.clone();
            let cancel = cancel.clone();
            let mut config_rx = self.inner.bus.subscribe_config().await?;
            workers.spawn(async move {
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => return Ok(()),
                        frame = config_rx.recv() => match frame {
                            Some(frame) => daemon.on_config_frame(frame).await?,
                            None => return Err(Error::ChannelClosed("configuration subscription")),
                        },
                    }
                }
            });
        }

        {
            let daemon = self.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => Ok(()),
                    err = daemon.inner.bus.connection_lost() => Err(err),
                }
            });
        }

        for (idx, ap) in self.inner.aps.iter().enumerate() {
            tracing::info!(
                ssid = %ap.status.ssid,
                bssid = %ap.status.bssid,
                channel = ap.status.channel,
                state = %ap.status.state,
                "watching AP"
            );

            let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

            let client = Arc::clone(&ap.client);
            let reader_cancel = cancel.clone();
            workers.spawn(async move {
                client
                    .attach(events_tx, reader_cancel)
                    .await
                    .map_err(Error::from)
            });

            let daemon = self.clone();
            let router_cancel = cancel.clone();
            let errs = pub_errs_tx.clone();
            workers.spawn(async move {
                let ap = &daemon.inner.aps[idx];
                loop {
                    tokio::select! {
                        () = router_cancel.cancelled() => return Ok(()),
                        event = events_rx.recv() => match event {
                            Some(event) => daemon.on_ap_event(&ap.status, event, &errs).await?,
                            // Reader exited; its worker carries any error.
                            None => return Ok(()),
                        },
                    }
                }
            });
        }
        drop(pub_errs_tx);

        let mut first_err: Option<Error> = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Ok(()),
            };
            if let Err(e) = result
                && first_err.is_none()
            {
                cancel.cancel();
                first_err = Some(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn on_config_frame(&self, frame: ConfigFrame) -> Result<()> {
        let config: Configuration = serde_json::from_slice(&frame.payload)?;
        self.reconcile(frame.retained, &config).await
    }

    /// Applies a tracking configuration: diffs it against the
    /// registry, then publishes discovery and initial state per
    /// change. Idempotent for a replayed (retained) configuration.
    async fn reconcile(&self, retained: bool, config: &Configuration) -> Result<()> {
        // Parse every MAC up front so one malformed entry cannot
        // partially apply the update.
        let mut incoming = Vec::with_capacity(config.devices.len());
        for device in &config.devices {
            let mac: Mac = device.mac.parse()?;
            incoming.push((mac, device.name.clone()));
        }

        let changes = diff_tracked(&self.inner.registry, &incoming);
        tracing::info!(
            retained,
            devices = incoming.len(),
            changes = changes
                .iter()
                .filter(|c| c.change != StaChange::NoChange)
                .count(),
            "received tracking configuration"
        );
        if changes.is_empty() {
            tracing::info!("no stations configured");
            return Ok(());
        }

        let has_updates = changes
            .iter()
            .any(|c| matches!(c.change, StaChange::Added | StaChange::Updated));
        // Snapshot the APs only when a change can use the result.
        let connected = if has_updates {
            self.connected_stations().await?
        } else {
            HashMap::new()
        };

        for entry in &changes {
            tracing::info!(
                name = %entry.name,
                mac = %entry.mac,
                change = entry.change.as_str(),
                "station configuration"
            );

            match entry.change {
                StaChange::NoChange => {}

                StaChange::Updated => {
                    if self.inner.autodiscovery {
                        self.publish(
                            self.inner.bus.register_device_tracker(&entry.name, entry.mac),
                        )
                        .await?;
                    }
                }

                StaChange::Added => {
                    if self.inner.autodiscovery {
                        self.publish(
                            self.inner.bus.register_device_tracker(&entry.name, entry.mac),
                        )
                        .await?;
                    }

                    let Some(found) = connected.get(&entry.mac) else {
                        self.publish(self.inner.bus.station_not_home(entry.mac))
                            .await?;
                        continue;
                    };

                    // Backdate the association to when the AP says the
                    // station connected.
                    let connected_for = chrono::Duration::from_std(found.station.connected_time)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                    let connected_at = Utc::now() - connected_for;

                    {
                        let mut stations = self.inner.registry.lock();
                        if let Some(sta) = stations.get_mut(&entry.mac) {
                            sta.connected = true;
                            sta.connected_at = Some(connected_at);
                            sta.bssid = found.ap.bssid.clone();
                        }
                    }
                    self.inner.debouncer.cancel(entry.mac);

                    let attrs = Attrs {
                        name: entry.name.clone(),
                        mac: entry.mac,
                        connected: true,
                        ap_name: self.inner.ap_name.clone(),
                        ssid: found.ap.ssid.clone(),
                        bssid: found.ap.bssid.clone(),
                        connected_at: Some(connected_at),
                        connected_for: (Utc::now() - connected_at).num_seconds(),
                        disconnected_at: None,
                        disconnected_for: 0,
                    };

                    self.publish(self.inner.bus.station_home(entry.mac)).await?;
                    self.publish(self.inner.bus.station_attributes(entry.mac, &attrs))
                        .await?;
                }

                StaChange::Removed => {
                    self.inner.debouncer.cancel(entry.mac);
                    if self.inner.autodiscovery {
                        self.publish(self.inner.bus.unregister_device_tracker(entry.mac))
                            .await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Collects all associated stations across every AP, keyed by MAC.
    ///
    /// An AP without station enumeration (stripped-down hostapd) makes
    /// the whole snapshot empty: new stations start as disconnected
    /// instead of failing the reconciliation.
    async fn connected_stations(&self) -> Result<HashMap<Mac, ConnectedStation>> {
        let mut connected = HashMap::new();

        for ap in &self.inner.aps {
            let stations = match ap.client.stations().await {
                Ok(stations) => stations,
                Err(HostapdError::UnknownCommand(command)) => {
                    tracing::warn!(
                        %command,
                        "hostapd build lacks station enumeration; marking new stations as disconnected"
                    );
                    return Ok(HashMap::new());
                }
                Err(e) => return Err(e.into()),
            };

            for station in stations {
                if !station.associated {
                    continue;
                }
                connected.insert(
                    station.mac,
                    ConnectedStation {
                        ap: ap.status.clone(),
                        station,
                    },
                );
            }
        }

        Ok(connected)
    }

    /// Routes one event from the AP identified by `ap`.
    async fn on_ap_event(
        &self,
        ap: &ApStatus,
        event: Event,
        pub_errs: &mpsc::Sender<Error>,
    ) -> Result<()> {
        tracing::debug!(ssid = %ap.ssid, ?event, "hostapd event");

        match event {
            Event::StationConnected { mac } => self.on_station_connected(ap, mac).await,
            Event::StationDisconnected { mac } => {
                self.on_station_disconnected(ap, mac, pub_errs);
                Ok(())
            }
            Event::Terminating => Err(HostapdError::Terminating.into()),
            Event::Unrecognized(raw) => {
                tracing::debug!(ssid = %ap.ssid, message = %raw, "unhandled hostapd event");
                Ok(())
            }
        }
    }

    async fn on_station_connected(&self, ap: &ApStatus, mac: Mac) -> Result<()> {
        let now = Utc::now();

        let (was_connected, bssid_changed, sta) = {
            let mut stations = self.inner.registry.lock();
            let Some(sta) = stations.get_mut(&mac) else {
                // Not tracked.
                return Ok(());
            };

            let was_connected = sta.connected;
            let bssid_changed = !sta.bssid.is_empty() && sta.bssid != ap.bssid;
            sta.connected = true;
            sta.bssid = ap.bssid.clone();
            sta.connected_at = Some(now);
            (was_connected, bssid_changed, sta.clone())
        };

        let cancelled = self.inner.debouncer.cancel(mac);
        if cancelled {
            tracing::info!(%mac, "cancelled pending disconnect");
        }

        // Publish on a real transition: a different radio, or a return
        // from away. A duplicate event for the current association
        // stays silent, as does a re-association that merely cancelled
        // a pending disconnect from the same radio.
        let should_update = bssid_changed || (!was_connected && !cancelled);
        if !should_update {
            return Ok(());
        }

        self.publish(self.inner.bus.station_home(mac)).await?;

        let attrs = Attrs {
            name: sta.name.clone(),
            mac,
            connected: true,
            ap_name: self.inner.ap_name.clone(),
            ssid: ap.ssid.clone(),
            bssid: ap.bssid.clone(),
            connected_at: sta.connected_at,
            connected_for: 0,
            disconnected_at: None,
            disconnected_for: sta
                .disconnected_at
                .map_or(0, |at| (now - at).num_seconds()),
        };
        self.publish(self.inner.bus.station_attributes(mac, &attrs))
            .await
    }

    fn on_station_disconnected(&self, ap: &ApStatus, mac: Mac, pub_errs: &mpsc::Sender<Error>) {
        let now = Utc::now();

        let was_connected = {
            let mut stations = self.inner.registry.lock();
            let Some(sta) = stations.get_mut(&mac) else {
                // Not tracked.
                return;
            };

            if sta.connected && sta.bssid != ap.bssid {
                // The station already re-associated elsewhere; this is
                // a latent disconnect from the previous AP.
                tracing::info!(
                    %mac,
                    current_bssid = %sta.bssid,
                    event_bssid = %ap.bssid,
                    "ignoring latent disconnect"
                );
                return;
            }

            let was_connected = sta.connected;
            sta.connected = false;
            sta.disconnected_at = Some(now);
            was_connected
        };

        // Already away with nothing pending: no transition to publish.
        if !was_connected && !self.inner.debouncer.is_pending(mac) {
            tracing::debug!(%mac, "station already away");
            return;
        }

        let daemon = self.clone();
        let ap = ap.clone();
        let errs = pub_errs.clone();
        let enqueued = self.inner.debouncer.enqueue(mac, async move {
            daemon.debounced_disconnect(&ap, mac, &errs).await;
        });
        if !enqueued {
            tracing::debug!(%mac, "disconnect already pending");
        }
    }

    /// The deferred half of a disconnect. Runs outside any event
    /// context, so failures go to the orchestrator's error channel
    /// instead of a return value.
    async fn debounced_disconnect(&self, ap: &ApStatus, mac: Mac, errs: &mpsc::Sender<Error>) {
        if let Err(e) = self.publish(self.inner.bus.station_not_home(mac)).await {
            // 1-buffered; the first error is terminal, later ones add nothing.
            let _ = errs.try_send(e);
            return;
        }

        // Re-read: a configuration change may have removed the station
        // while the timer was pending.
        let Some(sta) = self.inner.registry.snapshot(mac) else {
            return;
        };

        let now = Utc::now();
        let attrs = Attrs {
            name: sta.name.clone(),
            mac,
            connected: false,
            ap_name: self.inner.ap_name.clone(),
            ssid: ap.ssid.clone(),
            bssid: ap.bssid.clone(),
            connected_at: None,
            connected_for: sta.connected_at.map_or(0, |at| (now - at).num_seconds()),
            disconnected_at: sta.disconnected_at,
            disconnected_for: 0,
        };

        if let Err(e) = self
            .publish(self.inner.bus.station_attributes(mac, &attrs))
            .await
        {
            let _ = errs.try_send(e);
        }
    }

    /// Runs a publish under the per-operation deadline.
    async fn publish<F>(&self, publish: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        timeout(PUBLISH_TIMEOUT, publish)
            .await
            .map_err(|_| Error::PublishTimeout(PUBLISH_TIMEOUT))?
    }
}

/// Diffs the incoming configuration against the registry, applying
/// name updates, insertions, and removals under one lock hold and
/// returning the plan of changes.
fn diff_tracked(registry: &StationRegistry, incoming: &[(Mac, String)]) -> Vec<ConfigChange> {
    let mut stations = registry.lock();
    let mut changes = Vec::with_capacity(incoming.len() + stations.len());
    let mut seen = HashSet::with_capacity(incoming.len());

    for (mac, name) in incoming {
        seen.insert(*mac);
        let change = match stations.get_mut(mac) {
            None => {
                stations.insert(*mac, TrackedStation::new(name.clone(), *mac));
                StaChange::Added
            }
            Some(sta) if sta.name != *name => {
                sta.name = name.clone();
                StaChange::Updated
            }
            Some(_) => StaChange::NoChange,
        };
        changes.push(ConfigChange {
            mac: *mac,
            name: name.clone(),
            change,
        });
    }

    let removed: Vec<Mac> = stations
        .keys()
        .filter(|mac| !seen.contains(*mac))
        .copied()
        .collect();
    for mac in removed {
        if let Some(sta) = stations.remove(&mac) {
            changes.push(ConfigChange {
                mac,
                name: sta.name,
                change: StaChange::Removed,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(text: &str) -> Mac {
        text.parse().unwrap()
    }

    fn entry(changes: &[ConfigChange], mac: Mac) -> &ConfigChange {
        changes.iter().find(|c| c.mac == mac).unwrap()
    }

    #[test]
    fn sta_change_labels() {
        assert_eq!(StaChange::NoChange.as_str(), "no-change");
        assert_eq!(StaChange::Added.as_str(), "added");
        assert_eq!(StaChange::Updated.as_str(), "updated");
        assert_eq!(StaChange::Removed.as_str(), "removed");
    }

    #[test]
    fn diff_adds_new_stations() {
        let registry = StationRegistry::new();
        let phone = mac("AA:AA:AA:AA:AA:01");

        let changes = diff_tracked(&registry, &[(phone, "Phone".to_string())]);
        assert_eq!(changes.len(), 1);
        assert_eq!(entry(&changes, phone).change, StaChange::Added);
        assert_eq!(registry.snapshot(phone).unwrap().name, "Phone");
    }

    #[test]
    fn diff_is_idempotent() {
        let registry = StationRegistry::new();
        let phone = mac("AA:AA:AA:AA:AA:01");
        let incoming = vec![(phone, "Phone".to_string())];

        diff_tracked(&registry, &incoming);
        let changes = diff_tracked(&registry, &incoming);
        assert_eq!(entry(&changes, phone).change, StaChange::NoChange);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn diff_detects_rename() {
        let registry = StationRegistry::new();
        let phone = mac("AA:AA:AA:AA:AA:01");

        diff_tracked(&registry, &[(phone, "Phone".to_string())]);
        let changes = diff_tracked(&registry, &[(phone, "Renamed".to_string())]);
        assert_eq!(entry(&changes, phone).change, StaChange::Updated);
        assert_eq!(registry.snapshot(phone).unwrap().name, "Renamed");
    }

    #[test]
    fn diff_rename_keeps_connection_state() {
        let registry = StationRegistry::new();
        let phone = mac("AA:AA:AA:AA:AA:01");

        diff_tracked(&registry, &[(phone, "Phone".to_string())]);
        {
            let mut stations = registry.lock();
            let sta = stations.get_mut(&phone).unwrap();
            sta.connected = true;
            sta.bssid = "11:22:33:44:55:66".to_string();
        }

        diff_tracked(&registry, &[(phone, "Renamed".to_string())]);
        let sta = registry.snapshot(phone).unwrap();
        assert!(sta.connected);
        assert_eq!(sta.bssid, "11:22:33:44:55:66");
    }

    #[test]
    fn diff_removes_absent_stations() {
        let registry = StationRegistry::new();
        let phone = mac("AA:AA:AA:AA:AA:01");
        let watch = mac("AA:AA:AA:AA:AA:02");

        diff_tracked(
            &registry,
            &[(phone, "Phone".to_string()), (watch, "Watch".to_string())],
        );
        let changes = diff_tracked(&registry, &[(phone, "Phone".to_string())]);

        assert_eq!(entry(&changes, watch).change, StaChange::Removed);
        assert_eq!(entry(&changes, watch).name, "Watch");
        assert!(registry.snapshot(watch).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn diff_empty_config_removes_everything() {
        let registry = StationRegistry::new();
        let phone = mac("AA:AA:AA:AA:AA:01");

        diff_tracked(&registry, &[(phone, "Phone".to_string())]);
        let changes = diff_tracked(&registry, &[]);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change, StaChange::Removed);
        assert!(registry.is_empty());
    }
}
