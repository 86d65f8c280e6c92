// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! UNIX datagram connection to a hostapd control socket.

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::UnixDatagram;

/// A datagram socket connected to a hostapd control interface.
///
/// hostapd replies to the address a request came from, so the client
/// side must itself be bound to a filesystem path. That local socket
/// file is removed again on drop.
pub(crate) struct UnixSocketConn {
    socket: UnixDatagram,
    local_path: PathBuf,
}

impl UnixSocketConn {
    /// Binds `local_path` and connects it to the control socket at
    /// `ctrl_path`. A stale file at `local_path` is removed first.
    pub(crate) fn open(local_path: PathBuf, ctrl_path: &Path) -> io::Result<Self> {
        let _ = std::fs::remove_file(&local_path);

        let socket = UnixDatagram::bind(&local_path)?;
        socket.connect(ctrl_path)?;

        Ok(Self { socket, local_path })
    }

    pub(crate) async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf).await
    }

    pub(crate) async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }
}

impl Drop for UnixSocketConn {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.local_path);
    }
}
