// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Station (`STA-FIRST` / `STA-NEXT`) parsing.

use std::time::Duration;

use crate::hostapd::HostapdError;
use crate::types::Mac;

/// Information about a WiFi station (client) reported by hostapd.
///
/// A station with `associated == false` should not be considered
/// connected; hostapd can report such entries briefly right after a
/// disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    /// Hardware address of the station.
    pub mac: Mac,
    /// Whether the station is currently associated.
    pub associated: bool,
    /// Bytes received from the station.
    pub rx_bytes: u64,
    /// Bytes sent to the station.
    pub tx_bytes: u64,
    /// How long the station has been connected.
    pub connected_time: Duration,
    /// How long the station has been inactive.
    pub inactive: Duration,
    /// Signal strength in dBm.
    pub signal: i32,
}

impl Station {
    /// Parses a `STA-FIRST`/`STA-NEXT` response. The first line is the
    /// station's MAC address; the rest are `key=value` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error on a `FAIL` response, a malformed MAC, or a
    /// malformed field line.
    pub(crate) fn parse(text: &str) -> Result<Self, HostapdError> {
        if text == "FAIL\n" || text == "FAIL" {
            return Err(HostapdError::InvalidResponse("FAIL".to_string()));
        }

        let mut lines = text.lines();
        let mac_line = lines
            .next()
            .ok_or_else(|| HostapdError::InvalidResponse(text.to_string()))?;
        let mac: Mac = mac_line
            .trim()
            .parse()
            .map_err(|_| HostapdError::InvalidMac(mac_line.to_string()))?;

        let mut station = Self {
            mac,
            associated: false,
            rx_bytes: 0,
            tx_bytes: 0,
            connected_time: Duration::ZERO,
            inactive: Duration::ZERO,
            signal: 0,
        };

        for line in lines {
            let Some((key, val)) = line.split_once('=') else {
                return Err(HostapdError::InvalidResponse(line.to_string()));
            };

            let invalid = || HostapdError::InvalidResponse(line.to_string());
            match key {
                "flags" => station.associated = val.contains("[ASSOC]"),
                "rx_bytes" => station.rx_bytes = val.parse().map_err(|_| invalid())?,
                "tx_bytes" => station.tx_bytes = val.parse().map_err(|_| invalid())?,
                "connected_time" => {
                    let seconds: u64 = val.parse().map_err(|_| invalid())?;
                    station.connected_time = Duration::from_secs(seconds);
                }
                "inactive_msec" => {
                    let msec: u64 = val.parse().map_err(|_| invalid())?;
                    station.inactive = Duration::from_millis(msec);
                }
                "signal" => station.signal = val.parse().map_err(|_| invalid())?,
                _ => {}
            }
        }

        Ok(station)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATION_MSG: &str = "04:ab:00:12:34:56\n\
        flags=[AUTH][ASSOC][AUTHORIZED][WMM][HT]\n\
        aid=2\n\
        capability=0x1431\n\
        listen_interval=20\n\
        supported_rates=8c 12 98 24 b0 48 60 6c\n\
        timeout_next=NULLFUNC POLL\n\
        rx_packets=1793\n\
        tx_packets=1089\n\
        rx_bytes=171248\n\
        tx_bytes=512358\n\
        inactive_msec=7110\n\
        signal=-42\n\
        connected_time=837";

    #[test]
    fn parse_station() {
        let station = Station::parse(STATION_MSG).unwrap();
        assert_eq!(station.mac.to_string(), "04:AB:00:12:34:56");
        assert!(station.associated);
        assert_eq!(station.rx_bytes, 171_248);
        assert_eq!(station.tx_bytes, 512_358);
        assert_eq!(station.connected_time, Duration::from_secs(837));
        assert_eq!(station.inactive, Duration::from_millis(7110));
        assert_eq!(station.signal, -42);
    }

    #[test]
    fn parse_unassociated_station() {
        let msg = "04:ab:00:12:34:56\nflags=[AUTH]\nconnected_time=1";
        let station = Station::parse(msg).unwrap();
        assert!(!station.associated);
    }

    #[test]
    fn parse_fail_response() {
        assert!(Station::parse("FAIL\n").is_err());
    }

    #[test]
    fn parse_rejects_bad_mac() {
        let err = Station::parse("not-a-mac\nflags=[ASSOC]").unwrap_err();
        assert!(matches!(err, HostapdError::InvalidMac(_)));
    }

    #[test]
    fn parse_rejects_bare_line() {
        let err = Station::parse("04:ab:00:12:34:56\nflags").unwrap_err();
        assert!(matches!(err, HostapdError::InvalidResponse(_)));
    }
}
