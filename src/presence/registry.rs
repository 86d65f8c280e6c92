// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory registry of tracked stations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use crate::types::Mac;

/// Runtime state of one tracked station.
///
/// An entry's presence in the registry means the station is listed in
/// the most recently applied tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedStation {
    /// Human label from the configuration.
    pub name: String,
    /// Station address.
    pub mac: Mac,
    /// True iff the most recent authoritative event was an association.
    pub connected: bool,
    /// BSSID of the AP the station is (or was last) associated to.
    pub bssid: String,
    /// When the station last associated.
    pub connected_at: Option<DateTime<Utc>>,
    /// When the station last disassociated.
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl TrackedStation {
    /// A fresh, disconnected record.
    #[must_use]
    pub fn new(name: String, mac: Mac) -> Self {
        Self {
            name,
            mac,
            connected: false,
            bssid: String::new(),
            connected_at: None,
            disconnected_at: None,
        }
    }
}

/// The station map guarded by a single mutex.
///
/// The surface is deliberately small: callers take the lock with
/// [`StationRegistry::lock`] and operate on the map directly, so a
/// read-modify-write pair is atomic. The guard must never be held
/// across an await point.
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: Mutex<HashMap<Mac, TrackedStation>>,
}

impl StationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the registry for reading or mutation.
    pub fn lock(&self) -> MutexGuard<'_, HashMap<Mac, TrackedStation>> {
        self.stations.lock()
    }

    /// Returns a copy of the record for `mac`, if tracked.
    #[must_use]
    pub fn snapshot(&self, mac: Mac) -> Option<TrackedStation> {
        self.stations.lock().get(&mac).cloned()
    }

    /// Number of tracked stations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stations.lock().len()
    }

    /// Whether no station is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stations.lock().is_empty()
    }
}
