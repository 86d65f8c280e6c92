// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AP status (`STATUS` command) parsing.

use crate::hostapd::HostapdError;

/// A snapshot of one access point, taken from the `STATUS` command.
///
/// This is a subset of the fields hostapd reports; values such as the
/// SSID are not expected to change over the lifetime of the control
/// connection, so the daemon captures the status once at attach time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApStatus {
    /// Interface state, e.g. `ENABLED`.
    pub state: String,
    /// Operating channel.
    pub channel: u32,
    /// Maximum transmit power in dBm.
    pub max_tx_power: i32,
    /// Network name of the first BSS.
    pub ssid: String,
    /// Radio hardware address of the first BSS.
    pub bssid: String,
}

impl ApStatus {
    /// Parses a `STATUS` response.
    ///
    /// # Errors
    ///
    /// Returns an error for lines that are not `key=value` or numeric
    /// fields that fail to parse.
    pub(crate) fn parse(text: &str) -> Result<Self, HostapdError> {
        let mut status = Self::default();

        for line in text.lines() {
            let Some((key, val)) = line.split_once('=') else {
                return Err(HostapdError::InvalidResponse(line.to_string()));
            };

            match key {
                "state" => status.state = val.to_string(),
                "channel" => {
                    status.channel = val
                        .parse()
                        .map_err(|_| HostapdError::InvalidResponse(line.to_string()))?;
                }
                "max_txpower" => {
                    status.max_tx_power = val
                        .parse()
                        .map_err(|_| HostapdError::InvalidResponse(line.to_string()))?;
                }
                "ssid[0]" => status.ssid = decode_ssid(val)?,
                "bssid[0]" => status.bssid = val.to_string(),
                _ => {}
            }
        }

        Ok(status)
    }
}

/// Decodes the hostapd encoding of an SSID, honoring the escape
/// sequences produced by its `printf_encode`:
/// <https://w1.fi/cgit/hostap/tree/src/utils/common.c#n477>
fn decode_ssid(v: &str) -> Result<String, HostapdError> {
    let mut out = Vec::with_capacity(v.len());
    let mut bytes = v.bytes();

    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }

        let Some(esc) = bytes.next() else {
            return Err(HostapdError::InvalidResponse(format!(
                "dangling escape in SSID {v:?}"
            )));
        };

        match esc {
            b'"' => out.push(b'"'),
            b'\\' => out.push(b'\\'),
            b'e' => out.push(0x1b),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'x' => {
                let hi = bytes.next();
                let lo = bytes.next();
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(HostapdError::InvalidResponse(format!(
                        "truncated hex escape in SSID {v:?}"
                    )));
                };
                let pair = [hi, lo];
                let pair = std::str::from_utf8(&pair)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok());
                match pair {
                    Some(byte) => out.push(byte),
                    None => {
                        return Err(HostapdError::InvalidResponse(format!(
                            "invalid hex escape in SSID {v:?}"
                        )));
                    }
                }
            }
            // Unknown escape; keep the character as-is.
            other => out.push(other),
        }
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_MSG: &str = "state=ENABLED\n\
        phy=phy0\n\
        freq=5260\n\
        num_sta_non_erp=0\n\
        olbc=0\n\
        cac_time_seconds=60\n\
        cac_time_left_seconds=N/A\n\
        channel=52\n\
        secondary_channel=1\n\
        ieee80211n=1\n\
        beacon_int=100\n\
        supported_rates=0c 12 18 24 30 48 60 6c\n\
        max_txpower=23\n\
        bss[0]=wlan0\n\
        bssid[0]=aa:bb:cc:ee:12:34\n\
        ssid[0]=\\xf0\\x9f\\x8c\\x9d\n\
        num_sta[0]=5";

    #[test]
    fn parse_status() {
        let status = ApStatus::parse(STATUS_MSG).unwrap();
        assert_eq!(
            status,
            ApStatus {
                state: "ENABLED".to_string(),
                channel: 52,
                max_tx_power: 23,
                ssid: "🌝".to_string(),
                bssid: "aa:bb:cc:ee:12:34".to_string(),
            }
        );
    }

    #[test]
    fn parse_rejects_bare_line() {
        let err = ApStatus::parse("state").unwrap_err();
        assert!(matches!(err, HostapdError::InvalidResponse(_)));
    }

    #[test]
    fn parse_rejects_bad_channel() {
        assert!(ApStatus::parse("channel=five").is_err());
    }

    #[test]
    fn decode_ssid_plain_ascii() {
        assert_eq!(decode_ssid("hello world").unwrap(), "hello world");
        assert_eq!(decode_ssid("123!@#$%^)").unwrap(), "123!@#$%^)");
    }

    #[test]
    fn decode_ssid_hex_escapes() {
        assert_eq!(decode_ssid("\\xf0\\x9f\\x90\\xa4").unwrap(), "🐤");
    }

    #[test]
    fn decode_ssid_control_escapes() {
        assert_eq!(decode_ssid("a\\tb\\nc").unwrap(), "a\tb\nc");
        assert_eq!(decode_ssid("say \\\"hi\\\"").unwrap(), "say \"hi\"");
        assert_eq!(decode_ssid("back\\\\slash").unwrap(), "back\\slash");
    }

    #[test]
    fn decode_ssid_unknown_escape_kept() {
        assert_eq!(decode_ssid("a\\qb").unwrap(), "aqb");
    }

    #[test]
    fn decode_ssid_dangling_escape() {
        assert!(decode_ssid("oops\\").is_err());
        assert!(decode_ssid("oops\\x4").is_err());
    }
}
