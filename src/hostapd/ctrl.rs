// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control-interface command framing and the attach loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::hostapd::conn::UnixSocketConn;
use crate::hostapd::{ApStatus, Event, HostapdError, Station};
use crate::types::Mac;

// Control interface command and response strings.
const CMD_PING: &str = "PING";
const RESP_PONG: &str = "PONG";
const CMD_STATUS: &str = "STATUS";
const CMD_STATION_FIRST: &str = "STA-FIRST";
const CMD_STATION_NEXT: &str = "STA-NEXT";
const CMD_ATTACH: &str = "ATTACH";
const CMD_DETACH: &str = "DETACH";
const RESP_OK: &str = "OK";
const UNKNOWN_COMMAND: &str = "UNKNOWN COMMAND";

const RESPONSE_BUF_SIZE: usize = 2 * 1024;
const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(1);

/// Command/response handling on one control socket.
///
/// Exclusive `&mut self` access serializes commands, so responses can
/// never interleave. [`Ctrl::attach`] consumes the value because an
/// attached socket receives unsolicited messages and must not be used
/// for further commands.
pub(crate) struct Ctrl {
    conn: UnixSocketConn,
    cmd_timeout: Duration,
    buf: Vec<u8>,
}

impl Ctrl {
    /// Wraps the connection and verifies it responds to `PING`.
    pub(crate) async fn open(conn: UnixSocketConn) -> Result<Self, HostapdError> {
        let mut ctrl = Self {
            conn,
            cmd_timeout: DEFAULT_CMD_TIMEOUT,
            buf: vec![0u8; RESPONSE_BUF_SIZE],
        };
        ctrl.ping().await?;
        Ok(ctrl)
    }

    /// Sends `cmd` and waits for the single-datagram response.
    async fn command(&mut self, cmd: &str) -> Result<String, HostapdError> {
        timeout(self.cmd_timeout, self.conn.send(cmd.as_bytes()))
            .await
            .map_err(|_| HostapdError::Timeout(cmd.to_string()))??;

        let n = timeout(self.cmd_timeout, self.conn.recv(&mut self.buf))
            .await
            .map_err(|_| HostapdError::Timeout(cmd.to_string()))??;

        let response = String::from_utf8_lossy(&self.buf[..n]).into_owned();
        if response.starts_with(UNKNOWN_COMMAND) {
            return Err(HostapdError::UnknownCommand(cmd.to_string()));
        }

        Ok(response)
    }

    /// Tests whether the control interface is responding.
    pub(crate) async fn ping(&mut self) -> Result<(), HostapdError> {
        let response = self.command(CMD_PING).await?;
        if response.trim() != RESP_PONG {
            return Err(HostapdError::UnexpectedResponse {
                command: CMD_PING.to_string(),
                response,
            });
        }
        Ok(())
    }

    /// Returns the AP's status.
    pub(crate) async fn status(&mut self) -> Result<ApStatus, HostapdError> {
        let response = self.command(CMD_STATUS).await?;
        ApStatus::parse(&response)
    }

    /// Returns the head of hostapd's linked list of stations, or `None`
    /// when no station is connected.
    pub(crate) async fn station_first(&mut self) -> Result<Option<Station>, HostapdError> {
        let response = self.command(CMD_STATION_FIRST).await?;
        if response.is_empty() {
            return Ok(None);
        }
        Station::parse(&response).map(Some)
    }

    /// Returns the station following `mac` in the linked list, or
    /// `None` at the end of the list.
    pub(crate) async fn station_next(&mut self, mac: Mac) -> Result<Option<Station>, HostapdError> {
        let response = self.command(&format!("{CMD_STATION_NEXT} {mac}")).await?;
        if response.is_empty() {
            return Ok(None);
        }
        Station::parse(&response).map(Some)
    }

    /// Subscribes to unsolicited events and forwards them into
    /// `events` until cancellation or an error.
    ///
    /// The bounded channel provides back-pressure: if the consumer
    /// falls behind, the reader stalls rather than buffering without
    /// limit. Per-socket event order is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`HostapdError::Terminating`] when hostapd announces its
    /// shutdown, or any socket/parse error. Cancellation sends a
    /// best-effort `DETACH` and returns `Ok(())`.
    pub(crate) async fn attach(
        mut self,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Result<(), HostapdError> {
        let response = self.command(CMD_ATTACH).await?;
        if response.trim() != RESP_OK {
            return Err(HostapdError::UnexpectedResponse {
                command: CMD_ATTACH.to_string(),
                response,
            });
        }

        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => None,
                received = self.conn.recv(&mut self.buf) => Some(received),
            };

            let Some(received) = received else {
                self.detach().await;
                return Ok(());
            };

            let n = received?;
            let msg = String::from_utf8_lossy(&self.buf[..n]);
            let msg = msg.trim();

            if msg == RESP_OK {
                // Only DETACH is acknowledged with OK, and we return
                // right after sending one.
                return Err(HostapdError::UnexpectedResponse {
                    command: CMD_ATTACH.to_string(),
                    response: msg.to_string(),
                });
            }

            let event = Event::parse(msg)?;
            match event {
                Event::Terminating => return Err(HostapdError::Terminating),
                event => {
                    if events.send(event).await.is_err() {
                        // Consumer is gone; the daemon is shutting down.
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Best-effort `DETACH`; the socket is dropped right after, so
    /// errors and the acknowledgement are ignored.
    async fn detach(&mut self) {
        if timeout(self.cmd_timeout, self.conn.send(CMD_DETACH.as_bytes()))
            .await
            .is_err()
        {
            return;
        }
        let _ = timeout(self.cmd_timeout, self.conn.recv(&mut self.buf)).await;
    }
}
