// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT client for publishing presence state to Home Assistant.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::hass::messages::{
    Attrs, ConfigFrame, DeviceInfo, DeviceTracker, ICON, PAYLOAD_HOME, PAYLOAD_NOT_HOME,
    SOURCE_TYPE_ROUTER, STATUS_OFFLINE, STATUS_ONLINE,
};
use crate::hass::topics::Topics;
use crate::hass::vendors::vendor_by_mac;
use crate::types::Mac;

/// Buffered configuration frames before the broker reader stalls.
const CONFIG_CHANNEL_CAPACITY: usize = 8;

/// Configuration for the MQTT connection.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker address, e.g. `mqtt://broker.local:1883`.
    pub broker_addr: String,
    /// Client ID; defaults to `wifi-presence:<ap_name>` when empty.
    pub client_id: String,
    /// Optional credentials.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Access point name used in topic paths and payloads.
    pub ap_name: String,
    /// Topic prefix; empty means the default.
    pub topic_prefix: String,
    /// Home Assistant discovery prefix; empty means the default.
    pub discovery_prefix: String,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// How long to wait for the broker's ConnAck.
    pub connection_timeout: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_addr: String::new(),
            client_id: String::new(),
            username: None,
            password: None,
            ap_name: String::new(),
            topic_prefix: String::new(),
            discovery_prefix: String::new(),
            keep_alive: Duration::from_secs(120),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// A connected MQTT client scoped to one AP's topic layout.
///
/// Cheaply cloneable (`Arc` inner); publishes from different workers
/// may interleave. The connection carries a retained `offline` last
/// will on the status topic, so the broker announces the daemon's
/// death even when the process cannot.
#[derive(Clone)]
pub struct Mqtt {
    inner: Arc<MqttInner>,
}

struct MqttInner {
    client: AsyncClient,
    topics: Topics,
    ap_name: String,
    config_rx: parking_lot::Mutex<Option<mpsc::Receiver<ConfigFrame>>>,
    conn_lost_rx: parking_lot::Mutex<Option<mpsc::Receiver<Error>>>,
}

impl Mqtt {
    /// Connects to the broker and waits for its ConnAck.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is incomplete, the
    /// connection fails, or no ConnAck arrives in time.
    pub async fn connect(config: MqttConfig) -> Result<Self> {
        if config.ap_name.is_empty() {
            return Err(Error::InvalidConfig("AP name cannot be blank"));
        }
        if config.broker_addr.is_empty() {
            return Err(Error::InvalidConfig("MQTT broker address is required"));
        }

        let client_id = if config.client_id.is_empty() {
            format!("wifi-presence:{}", config.ap_name)
        } else {
            config.client_id.clone()
        };

        let topics = Topics::new(
            config.ap_name.clone(),
            config.topic_prefix.clone(),
            config.discovery_prefix.clone(),
        );

        let (host, port) = parse_mqtt_url(&config.broker_addr)?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(false);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        options.set_last_will(LastWill::new(
            topics.will(),
            STATUS_OFFLINE,
            QoS::ExactlyOnce,
            true,
        ));

        let (client, event_loop) = AsyncClient::new(options, 16);

        let (config_tx, config_rx) = mpsc::channel(CONFIG_CHANNEL_CAPACITY);
        let (conn_lost_tx, conn_lost_rx) = mpsc::channel(1);
        let (connack_tx, connack_rx) = oneshot::channel();

        tokio::spawn(run_event_loop(
            event_loop,
            topics.config(),
            config_tx,
            conn_lost_tx,
            connack_tx,
        ));

        match tokio::time::timeout(config.connection_timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(broker = %config.broker_addr, "connected to MQTT broker");
            }
            Ok(Err(_)) => {
                return Err(Error::ConnectionLost(
                    "MQTT event loop terminated before ConnAck".to_string(),
                ));
            }
            Err(_) => {
                return Err(Error::ConnectionLost(format!(
                    "no ConnAck within {:?}",
                    config.connection_timeout
                )));
            }
        }

        Ok(Self {
            inner: Arc::new(MqttInner {
                client,
                topics,
                ap_name: config.ap_name,
                config_rx: parking_lot::Mutex::new(Some(config_rx)),
                conn_lost_rx: parking_lot::Mutex::new(Some(conn_lost_rx)),
            }),
        })
    }

    /// Returns the topic layout this client publishes under.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.inner.topics
    }

    /// Publishes `online` to the status topic (retained).
    ///
    /// # Errors
    ///
    /// Returns an error if the publish fails.
    pub async fn status_online(&self) -> Result<()> {
        self.publish_status(STATUS_ONLINE).await
    }

    /// Publishes `offline` to the status topic (retained), the same
    /// payload the last will would leave behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish fails.
    pub async fn status_offline(&self) -> Result<()> {
        self.publish_status(STATUS_OFFLINE).await
    }

    async fn publish_status(&self, status: &str) -> Result<()> {
        self.inner
            .client
            .publish(self.inner.topics.will(), QoS::ExactlyOnce, true, status)
            .await
            .map_err(Error::Mqtt)
    }

    /// Publishes the discovery document that tells Home Assistant to
    /// start tracking `mac`.
    ///
    /// # Errors
    ///
    /// Returns an error when `name` is blank or the publish fails.
    pub async fn register_device_tracker(&self, name: &str, mac: Mac) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidConfig("discovery name cannot be blank"));
        }

        let document = discovery_document(&self.inner.topics, &self.inner.ap_name, name, mac);
        let payload = serde_json::to_vec(&document)?;

        tracing::debug!(%mac, name, "publishing device tracker discovery");
        self.inner
            .client
            .publish(
                self.inner.topics.device_discovery(mac),
                QoS::ExactlyOnce,
                true,
                payload,
            )
            .await
            .map_err(Error::Mqtt)
    }

    /// Publishes an empty retained payload to the discovery topic,
    /// which Home Assistant treats as "stop tracking".
    ///
    /// # Errors
    ///
    /// Returns an error if the publish fails.
    pub async fn unregister_device_tracker(&self, mac: Mac) -> Result<()> {
        tracing::debug!(%mac, "withdrawing device tracker discovery");
        self.inner
            .client
            .publish(
                self.inner.topics.device_discovery(mac),
                QoS::ExactlyOnce,
                true,
                Vec::new(),
            )
            .await
            .map_err(Error::Mqtt)
    }

    /// Publishes the station's state as home.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish fails.
    pub async fn station_home(&self, mac: Mac) -> Result<()> {
        self.publish_station_state(mac, PAYLOAD_HOME).await
    }

    /// Publishes the station's state as not home.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish fails.
    pub async fn station_not_home(&self, mac: Mac) -> Result<()> {
        self.publish_station_state(mac, PAYLOAD_NOT_HOME).await
    }

    async fn publish_station_state(&self, mac: Mac, state: &str) -> Result<()> {
        self.inner
            .client
            .publish(
                self.inner.topics.device_state(mac),
                QoS::ExactlyOnce,
                true,
                state,
            )
            .await
            .map_err(Error::Mqtt)
    }

    /// Publishes the station's attributes document.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the publish fails.
    pub async fn station_attributes(&self, mac: Mac, attrs: &Attrs) -> Result<()> {
        let payload = serde_json::to_vec(attrs)?;
        self.inner
            .client
            .publish(
                self.inner.topics.device_attributes(mac),
                QoS::AtLeastOnce,
                true,
                payload,
            )
            .await
            .map_err(Error::Mqtt)
    }

    /// Subscribes to the configuration topic and returns the stream of
    /// raw frames. May only be taken once.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscribe fails or the stream was
    /// already taken.
    pub async fn subscribe_config(&self) -> Result<mpsc::Receiver<ConfigFrame>> {
        let receiver = self
            .inner
            .config_rx
            .lock()
            .take()
            .ok_or(Error::ChannelClosed("configuration stream already taken"))?;

        self.inner
            .client
            .subscribe(self.inner.topics.config(), QoS::ExactlyOnce)
            .await
            .map_err(Error::Mqtt)?;

        tracing::info!(topic = %self.inner.topics.config(), "subscribed to tracking configuration");
        Ok(receiver)
    }

    /// Resolves once the connection to the broker is lost, yielding
    /// the reason.
    pub async fn connection_lost(&self) -> Error {
        let receiver = self.inner.conn_lost_rx.lock().take();
        match receiver {
            Some(mut rx) => rx
                .recv()
                .await
                .unwrap_or_else(|| Error::ConnectionLost("MQTT event loop ended".to_string())),
            None => Error::ConnectionLost("connection-lost signal already taken".to_string()),
        }
    }

    /// Disconnects from the broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the disconnect request fails.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.client.disconnect().await.map_err(Error::Mqtt)
    }
}

impl std::fmt::Debug for Mqtt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mqtt")
            .field("ap_name", &self.inner.ap_name)
            .finish_non_exhaustive()
    }
}

/// Builds the Home Assistant discovery document for one station.
pub(crate) fn discovery_document(
    topics: &Topics,
    ap_name: &str,
    name: &str,
    mac: Mac,
) -> DeviceTracker {
    let object_id = topics.object_id(mac);

    DeviceTracker {
        availability_topic: topics.will(),
        device: DeviceInfo {
            connections: vec![["mac".to_string(), mac.to_string()]],
            name: name.to_string(),
            via_device: ap_name.to_string(),
            manufacturer: vendor_by_mac(mac).to_string(),
        },
        icon: ICON.to_string(),
        json_attributes_topic: topics.device_attributes(mac),
        name: format!("{name} {ap_name}"),
        object_id: object_id.clone(),
        payload_available: STATUS_ONLINE.to_string(),
        payload_home: PAYLOAD_HOME.to_string(),
        payload_not_available: STATUS_OFFLINE.to_string(),
        payload_not_home: PAYLOAD_NOT_HOME.to_string(),
        qos: 2,
        source_type: SOURCE_TYPE_ROUTER.to_string(),
        state_topic: topics.device_state(mac),
        unique_id: format!("wifipresence_{object_id}"),
    }
}

/// Handles broker traffic: routes configuration publishes, reports the
/// first connection error, and stops (the host supervisor restarts the
/// process rather than this client reconnecting).
async fn run_event_loop(
    mut event_loop: EventLoop,
    config_topic: String,
    config_tx: mpsc::Sender<ConfigFrame>,
    conn_lost_tx: mpsc::Sender<Error>,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT connected");
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic != config_topic {
                    continue;
                }
                tracing::debug!(
                    topic = %publish.topic,
                    retained = publish.retain,
                    bytes = publish.payload.len(),
                    "received configuration message"
                );
                let frame = ConfigFrame {
                    retained: publish.retain,
                    payload: publish.payload.to_vec(),
                };
                // A closed receiver means the daemon is shutting down.
                if config_tx.send(frame).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker requested disconnect");
                let _ = conn_lost_tx.try_send(Error::ConnectionLost(
                    "broker requested disconnect".to_string(),
                ));
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT connection lost");
                let _ = conn_lost_tx.try_send(Error::ConnectionLost(e.to_string()));
                break;
            }
        }
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| Error::InvalidConfig("invalid MQTT broker port"))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    Ok((host, port))
}
