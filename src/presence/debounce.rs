// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-station delayed actions.
//!
//! WiFi clients frequently emit a spurious disconnect followed shortly
//! by a re-association. Holding the "not home" publish for the
//! configured delay and cancelling it on the re-association prevents
//! presence flapping without losing genuine departures.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::types::Mac;

/// Schedules at most one pending delayed action per station.
///
/// A delay of zero is valid; the action still runs asynchronously with
/// respect to [`Debouncer::enqueue`].
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<HashMap<Mac, AbortHandle>>>,
}

impl Debouncer {
    /// Creates a debouncer that waits `delay` before running any
    /// enqueued action.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action` to run after the delay. If an action is
    /// already pending for `mac`, this call does nothing and returns
    /// false: the first pending action wins, coalescing repeated
    /// disconnects.
    ///
    /// A firing timer removes its own entry before running the action,
    /// so the action observes the table without itself in it.
    pub fn enqueue<F>(&self, mac: Mac, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if pending.contains_key(&mac) {
            return false;
        }

        let delay = self.delay;
        let entries = Arc::clone(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A missing entry means this action was cancelled between
            // the timer elapsing and this point.
            if entries.lock().remove(&mac).is_none() {
                return;
            }
            action.await;
        });

        pending.insert(mac, handle.abort_handle());
        true
    }

    /// Cancels the pending action for `mac`, if any. Returns true iff
    /// an action was pending and will no longer run.
    pub fn cancel(&self, mac: Mac) -> bool {
        let handle = self.pending.lock().remove(&mac);
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Returns whether an action is pending for `mac`.
    #[must_use]
    pub fn is_pending(&self, mac: Mac) -> bool {
        self.pending.lock().contains_key(&mac)
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}
