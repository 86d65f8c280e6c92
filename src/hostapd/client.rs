// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! hostapd control-interface client.

use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::hostapd::conn::UnixSocketConn;
use crate::hostapd::ctrl::Ctrl;
use crate::hostapd::{ApStatus, Event, HostapdError, Station};

/// A hostapd control-interface client bound to one radio's socket.
///
/// Commands go over a dedicated request/response socket;
/// [`Client::attach`] opens a second socket so queries stay usable
/// while the event stream is active.
pub struct Client {
    local_sock_dir: PathBuf,
    ctrl_sock: PathBuf,
    ctrl: Mutex<Ctrl>,
}

impl Client {
    /// Connects to the hostapd control socket at `ctrl_sock`, binding
    /// the local side under `local_sock_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or hostapd does
    /// not answer a `PING`.
    pub async fn connect(
        local_sock_dir: impl Into<PathBuf>,
        ctrl_sock: impl Into<PathBuf>,
    ) -> Result<Self, HostapdError> {
        let local_sock_dir = local_sock_dir.into();
        let ctrl_sock = ctrl_sock.into();

        let conn = UnixSocketConn::open(
            local_socket_path(&local_sock_dir, &ctrl_sock, "wp"),
            &ctrl_sock,
        )?;
        let ctrl = Ctrl::open(conn).await?;

        Ok(Self {
            local_sock_dir,
            ctrl_sock,
            ctrl: Mutex::new(ctrl),
        })
    }

    /// Returns the path of the control socket this client talks to.
    #[must_use]
    pub fn ctrl_sock(&self) -> &Path {
        &self.ctrl_sock
    }

    /// Returns the AP's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the command or parsing fails.
    pub async fn status(&self) -> Result<ApStatus, HostapdError> {
        self.ctrl.lock().await.status().await
    }

    /// Returns all stations hostapd currently reports, by walking the
    /// `STA-FIRST`/`STA-NEXT` linked list.
    ///
    /// Entries with `associated == false` should not be treated as
    /// connected.
    ///
    /// # Errors
    ///
    /// Returns [`HostapdError::UnknownCommand`] on stripped-down
    /// hostapd builds without station enumeration, or any command
    /// failure.
    pub async fn stations(&self) -> Result<Vec<Station>, HostapdError> {
        let mut ctrl = self.ctrl.lock().await;

        let mut stations = Vec::new();
        let mut next = ctrl.station_first().await?;
        while let Some(station) = next {
            let mac = station.mac;
            stations.push(station);
            next = ctrl.station_next(mac).await?;
        }

        Ok(stations)
    }

    /// Subscribes to unsolicited events, forwarding them into the
    /// bounded `events` channel until cancellation or an error.
    ///
    /// A dedicated socket is created for the subscription so that
    /// [`Client::status`] and [`Client::stations`] remain usable while
    /// attached.
    ///
    /// # Errors
    ///
    /// Returns [`HostapdError::Terminating`] when hostapd announces
    /// shutdown, or any socket/parse error; returns `Ok(())` on
    /// cancellation.
    pub async fn attach(
        &self,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Result<(), HostapdError> {
        let conn = UnixSocketConn::open(
            local_socket_path(&self.local_sock_dir, &self.ctrl_sock, "wp-attach"),
            &self.ctrl_sock,
        )?;
        let ctrl = Ctrl::open(conn).await?;

        ctrl.attach(events, cancel).await
    }
}

/// Local socket path for talking to `ctrl_sock`, e.g.
/// `<dir>/wp.wlan0` for control socket `/var/run/hostapd/wlan0`.
fn local_socket_path(dir: &Path, ctrl_sock: &Path, prefix: &str) -> PathBuf {
    let base = ctrl_sock
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{prefix}.{base}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_socket_path_uses_socket_name() {
        let path = local_socket_path(
            Path::new("/tmp"),
            Path::new("/var/run/hostapd/wlan0"),
            "wp",
        );
        assert_eq!(path, PathBuf::from("/tmp/wp.wlan0"));
    }

    #[test]
    fn local_socket_path_attach_prefix() {
        let path = local_socket_path(
            Path::new("/tmp"),
            Path::new("/var/run/hostapd/wlan1"),
            "wp-attach",
        );
        assert_eq!(path, PathBuf::from("/tmp/wp-attach.wlan1"));
    }
}
