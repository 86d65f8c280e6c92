// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! wifi-presence executable.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wifi_presence::hass::{Mqtt, MqttConfig};
use wifi_presence::hostapd::{Client, HostapdError};
use wifi_presence::presence::Daemon;
use wifi_presence::{Error, Result};

const DEFAULT_HOSTAPD_SOCK_DIR: &str = "/var/run/hostapd";

const AFTER_HELP: &str = "\
hostapd must run with its control interface enabled (the
'ctrl_interface' option); pass one --hostapd-sock per radio socket, or
let wifi-presence pick up every socket under /var/run/hostapd.

Topics used (with default prefixes):
  wifi-presence/<AP>/status                        daemon status (online/offline)
  wifi-presence/config                             tracking configuration (input)
  homeassistant/device_tracker/<AP>/<MAC>/config   Home Assistant discovery
  wifi-presence/station/<AP>/<MAC>/state           device state
  wifi-presence/station/<AP>/<MAC>/attrs           device attributes (JSON)";

#[derive(Parser, Debug)]
#[command(
    name = "wifi-presence",
    version,
    about = "Publishes WiFi client presence from hostapd to MQTT",
    after_help = AFTER_HELP
)]
struct Args {
    /// Access point name, used in topic paths and payloads
    #[arg(long = "ap-name", env = "HOSTNAME")]
    ap_name: String,

    /// hostapd control socket; repeat for multiple radios. Defaults to
    /// every socket under /var/run/hostapd
    #[arg(long = "hostapd-sock", value_name = "PATH")]
    hostapd_socks: Vec<PathBuf>,

    /// Directory for the local client sockets
    #[arg(long = "sock-dir", value_name = "DIR", default_value_os_t = std::env::temp_dir())]
    sock_dir: PathBuf,

    /// MQTT broker address, e.g. "mqtt://broker.local:1883"
    #[arg(long = "mqtt-addr", value_name = "ADDR")]
    mqtt_addr: String,

    /// MQTT client ID; defaults to "wifi-presence:<ap-name>"
    #[arg(long = "mqtt-id", default_value = "")]
    mqtt_id: String,

    /// MQTT topic prefix
    #[arg(long = "mqtt-prefix", default_value = "wifi-presence")]
    mqtt_prefix: String,

    /// MQTT username (optional)
    #[arg(long = "mqtt-username")]
    mqtt_username: Option<String>,

    /// MQTT password (optional)
    #[arg(long = "mqtt-password")]
    mqtt_password: Option<String>,

    /// Publish Home Assistant MQTT autodiscovery messages
    #[arg(long = "hass-autodiscovery", default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    hass_autodiscovery: bool,

    /// Home Assistant MQTT topic prefix
    #[arg(long = "hass-prefix", default_value = "homeassistant")]
    hass_prefix: String,

    /// Seconds to wait before considering a station disconnected
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    debounce: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");

            if e.is_terminating() {
                // hostapd told us to exit; the supervisor restarts us
                // once the new hostapd is up.
                return ExitCode::from(125);
            }
            if let Error::Hostapd(HostapdError::UnknownCommand(_)) = e {
                eprintln!(
                    "This typically means a stripped-down hostapd without station \
                     enumeration support is installed."
                );
            }

            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "wifi_presence=debug"
    } else {
        "wifi_presence=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

async fn run(args: Args) -> Result<()> {
    let sockets = if args.hostapd_socks.is_empty() {
        find_unix_sockets(Path::new(DEFAULT_HOSTAPD_SOCK_DIR))
    } else {
        args.hostapd_socks
    };
    if sockets.is_empty() {
        return Err(Error::InvalidConfig("no hostapd control sockets found"));
    }

    let mqtt = Mqtt::connect(MqttConfig {
        broker_addr: args.mqtt_addr,
        client_id: args.mqtt_id,
        username: args.mqtt_username,
        password: args.mqtt_password,
        ap_name: args.ap_name.clone(),
        topic_prefix: args.mqtt_prefix,
        discovery_prefix: args.hass_prefix,
        ..Default::default()
    })
    .await?;

    let mut builder = Daemon::builder()
        .ap_name(args.ap_name)
        .bus(mqtt.clone())
        .debounce(Duration::from_secs(args.debounce))
        .autodiscovery(args.hass_autodiscovery);
    for socket in sockets {
        tracing::info!(socket = %socket.display(), "connecting to hostapd");
        builder = builder.access_point(Client::connect(args.sock_dir.clone(), socket).await?);
    }
    let daemon = builder.build().await?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let result = daemon.run(cancel).await;

    if let Err(e) = mqtt.disconnect().await {
        tracing::warn!(error = %e, "MQTT disconnect failed");
    }

    result
}

/// Cancels the token on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received interrupt"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
        cancel.cancel();
    });
}

/// Returns every UNIX socket in `dir`, skipping hostapd's `global`
/// control interface, which has no station information.
fn find_unix_sockets(dir: &Path) -> Vec<PathBuf> {
    use std::os::unix::fs::FileTypeExt;

    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut sockets = Vec::new();
    for entry in entries.flatten() {
        if entry.file_name() == "global" {
            continue;
        }
        if let Ok(file_type) = entry.file_type()
            && file_type.is_socket()
        {
            sockets.push(entry.path());
        }
    }
    sockets.sort();
    sockets
}
