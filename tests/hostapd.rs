// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control-interface client tests against a fake hostapd endpoint
//! speaking the real datagram protocol over real UNIX sockets.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UnixDatagram;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use wifi_presence::hostapd::{Client, Event, HostapdError};

const STATUS_RESPONSE: &str = "state=ENABLED\n\
    phy=phy0\n\
    channel=36\n\
    max_txpower=23\n\
    bss[0]=wlan0\n\
    bssid[0]=aa:bb:cc:dd:ee:ff\n\
    ssid[0]=backyard";

const STATION_1: &str = "aa:aa:aa:aa:aa:01\n\
    flags=[AUTH][ASSOC][AUTHORIZED]\n\
    rx_bytes=1000\n\
    tx_bytes=2000\n\
    connected_time=60\n\
    signal=-50";

const STATION_2: &str = "aa:aa:aa:aa:aa:02\n\
    flags=[AUTH]\n\
    connected_time=5";

/// A scratch directory unique to the calling test.
fn scratch_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let dir = std::env::temp_dir().join(format!(
        "wp-hostapd-{}-{}-{name}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A fake hostapd control endpoint.
struct FakeHostapd {
    socket: Arc<UnixDatagram>,
    ctrl_path: PathBuf,
    attach_addr: Arc<Mutex<Option<PathBuf>>>,
}

impl FakeHostapd {
    /// Binds the control socket in `dir` and serves the protocol:
    /// PING/STATUS/STA-FIRST/STA-NEXT/ATTACH/DETACH. `stations` are
    /// the STA walk responses; `sta_supported == false` answers the
    /// walk with `UNKNOWN COMMAND` like a stripped-down build.
    fn spawn(dir: &Path, stations: Vec<String>, sta_supported: bool) -> Self {
        let ctrl_path = dir.join("wlan0");
        let socket = Arc::new(UnixDatagram::bind(&ctrl_path).unwrap());
        let attach_addr = Arc::new(Mutex::new(None));

        tokio::spawn(serve(
            Arc::clone(&socket),
            Arc::clone(&attach_addr),
            stations,
            sta_supported,
        ));

        Self {
            socket,
            ctrl_path,
            attach_addr,
        }
    }

    /// Waits until a client has attached.
    async fn wait_attached(&self) -> PathBuf {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(addr) = self.attach_addr.lock().unwrap().clone() {
                return addr;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no client attached"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Sends an unsolicited message to the attached client.
    async fn push(&self, msg: &str) {
        let addr = self.wait_attached().await;
        self.socket.send_to(msg.as_bytes(), &addr).await.unwrap();
    }
}

async fn serve(
    socket: Arc<UnixDatagram>,
    attach_addr: Arc<Mutex<Option<PathBuf>>>,
    stations: Vec<String>,
    sta_supported: bool,
) {
    let mut buf = vec![0u8; 4096];

    loop {
        let Ok((n, addr)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let Some(peer) = addr.as_pathname().map(Path::to_path_buf) else {
            continue;
        };
        let cmd = String::from_utf8_lossy(&buf[..n]).into_owned();

        let reply: String = match cmd.as_str() {
            "PING" => "PONG\n".to_string(),
            "STATUS" => STATUS_RESPONSE.to_string(),
            "ATTACH" => {
                *attach_addr.lock().unwrap() = Some(peer.clone());
                "OK\n".to_string()
            }
            "DETACH" => "OK\n".to_string(),
            "STA-FIRST" => {
                if sta_supported {
                    stations.first().cloned().unwrap_or_default()
                } else {
                    "UNKNOWN COMMAND\n".to_string()
                }
            }
            cmd if cmd.starts_with("STA-NEXT ") => {
                if sta_supported {
                    let mac = cmd.trim_start_matches("STA-NEXT ").trim().to_lowercase();
                    let idx = stations
                        .iter()
                        .position(|sta| sta.lines().next() == Some(mac.as_str()));
                    idx.and_then(|i| stations.get(i + 1))
                        .cloned()
                        .unwrap_or_default()
                } else {
                    "UNKNOWN COMMAND\n".to_string()
                }
            }
            _ => "UNKNOWN COMMAND\n".to_string(),
        };

        let _ = socket.send_to(reply.as_bytes(), &peer).await;
    }
}

#[tokio::test]
async fn connect_and_read_status() {
    let dir = scratch_dir("status");
    let fake = FakeHostapd::spawn(&dir, Vec::new(), true);

    let client = Client::connect(&dir, &fake.ctrl_path).await.unwrap();
    let status = client.status().await.unwrap();

    assert_eq!(status.state, "ENABLED");
    assert_eq!(status.channel, 36);
    assert_eq!(status.max_tx_power, 23);
    assert_eq!(status.ssid, "backyard");
    assert_eq!(status.bssid, "aa:bb:cc:dd:ee:ff");
}

#[tokio::test]
async fn connect_fails_without_endpoint() {
    let dir = scratch_dir("absent");
    let missing = dir.join("nope");
    let result = Client::connect(&dir, &missing).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn stations_walks_the_list() {
    let dir = scratch_dir("stations");
    let fake = FakeHostapd::spawn(
        &dir,
        vec![STATION_1.to_string(), STATION_2.to_string()],
        true,
    );

    let client = Client::connect(&dir, &fake.ctrl_path).await.unwrap();
    let stations = client.stations().await.unwrap();

    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].mac.to_string(), "AA:AA:AA:AA:AA:01");
    assert!(stations[0].associated);
    assert_eq!(stations[0].connected_time, Duration::from_secs(60));
    assert_eq!(stations[0].signal, -50);
    assert!(!stations[1].associated);
}

#[tokio::test]
async fn stations_empty_when_none_connected() {
    let dir = scratch_dir("empty");
    let fake = FakeHostapd::spawn(&dir, Vec::new(), true);

    let client = Client::connect(&dir, &fake.ctrl_path).await.unwrap();
    let stations = client.stations().await.unwrap();
    assert!(stations.is_empty());
}

#[tokio::test]
async fn stations_unsupported_is_unknown_command() {
    let dir = scratch_dir("unsupported");
    let fake = FakeHostapd::spawn(&dir, vec![STATION_1.to_string()], false);

    let client = Client::connect(&dir, &fake.ctrl_path).await.unwrap();
    let err = client.stations().await.unwrap_err();
    assert!(matches!(err, HostapdError::UnknownCommand(_)), "got {err:?}");
}

#[tokio::test]
async fn attach_streams_events_in_order() {
    let dir = scratch_dir("attach");
    let fake = FakeHostapd::spawn(&dir, Vec::new(), true);

    let client = Arc::new(Client::connect(&dir, &fake.ctrl_path).await.unwrap());
    let (events_tx, mut events_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let attach = {
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        tokio::spawn(async move { client.attach(events_tx, cancel).await })
    };

    fake.push("<3>AP-STA-CONNECTED aa:aa:aa:aa:aa:01").await;
    fake.push("<3>AP-STA-DISCONNECTED aa:aa:aa:aa:aa:01").await;
    fake.push("<3>AP-CSA-FINISHED freq=2462").await;

    let first = timeout(Duration::from_secs(2), events_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        first,
        Event::StationConnected {
            mac: "aa:aa:aa:aa:aa:01".parse().unwrap()
        }
    );

    let second = timeout(Duration::from_secs(2), events_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second,
        Event::StationDisconnected {
            mac: "aa:aa:aa:aa:aa:01".parse().unwrap()
        }
    );

    let third = timeout(Duration::from_secs(2), events_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(third, Event::Unrecognized("AP-CSA-FINISHED freq=2462".to_string()));

    // The client can still answer queries while attached.
    let status = client.status().await.unwrap();
    assert_eq!(status.ssid, "backyard");

    cancel.cancel();
    let result = timeout(Duration::from_secs(2), attach).await.unwrap().unwrap();
    assert!(result.is_ok(), "attach exited with {result:?}");
}

#[tokio::test]
async fn attach_terminating_is_distinguished() {
    let dir = scratch_dir("terminating");
    let fake = FakeHostapd::spawn(&dir, Vec::new(), true);

    let client = Client::connect(&dir, &fake.ctrl_path).await.unwrap();
    let (events_tx, _events_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let attach = tokio::spawn(async move { client.attach(events_tx, cancel).await });

    fake.push("<3>CTRL-EVENT-TERMINATING").await;

    let result = timeout(Duration::from_secs(2), attach).await.unwrap().unwrap();
    assert!(
        matches!(result, Err(HostapdError::Terminating)),
        "got {result:?}"
    );
}

#[tokio::test]
async fn attach_rejects_malformed_event_mac() {
    let dir = scratch_dir("badmac");
    let fake = FakeHostapd::spawn(&dir, Vec::new(), true);

    let client = Client::connect(&dir, &fake.ctrl_path).await.unwrap();
    let (events_tx, _events_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let attach = tokio::spawn(async move { client.attach(events_tx, cancel).await });

    fake.push("<3>AP-STA-CONNECTED garbage").await;

    let result = timeout(Duration::from_secs(2), attach).await.unwrap().unwrap();
    assert!(
        matches!(result, Err(HostapdError::InvalidMac(_))),
        "got {result:?}"
    );
}
