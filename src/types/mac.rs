// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MAC address value type.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors related to parsing a MAC address from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MacParseError {
    /// The text did not contain exactly six octets.
    #[error("invalid MAC length {actual}; expected {expected} octets from {input:?}")]
    InvalidLength {
        /// Number of octets required.
        expected: usize,
        /// Number of octets found.
        actual: usize,
        /// The offending input.
        input: String,
    },

    /// The text contained a character that is not a hex digit or separator.
    #[error("invalid hex in MAC address {0:?}")]
    InvalidHex(String),
}

/// A hardware (EUI-48) MAC address.
///
/// Parsing accepts upper- or lower-case hex, with or without `:`
/// separators. Rendering is canonical: uppercase hex, colon-separated.
/// Two addresses are equal iff their octets are equal.
///
/// # Examples
///
/// ```
/// use wifi_presence::types::Mac;
///
/// let mac: Mac = "04:ab:00:12:34:56".parse().unwrap();
/// assert_eq!(mac.to_string(), "04:AB:00:12:34:56");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mac([u8; 6]);

impl Mac {
    /// Number of octets in an address.
    pub const LEN: usize = 6;

    /// Creates an address from raw octets.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the raw octets.
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns the 24-bit organizationally unique identifier prefix.
    #[must_use]
    pub const fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for Mac {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Either colon-separated octet pairs or bare hex.
        let hex: String = if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() != Self::LEN {
                return Err(MacParseError::InvalidLength {
                    expected: Self::LEN,
                    actual: parts.len(),
                    input: s.to_string(),
                });
            }
            if parts.iter().any(|part| part.len() != 2) {
                return Err(MacParseError::InvalidHex(s.to_string()));
            }
            parts.concat()
        } else {
            s.to_string()
        };

        if !hex.is_ascii() || hex.len() % 2 != 0 {
            return Err(MacParseError::InvalidHex(s.to_string()));
        }
        if hex.len() != Self::LEN * 2 {
            return Err(MacParseError::InvalidLength {
                expected: Self::LEN,
                actual: hex.len() / 2,
                input: s.to_string(),
            });
        }

        let mut octets = [0u8; Self::LEN];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| MacParseError::InvalidHex(s.to_string()))?;
        }

        Ok(Self(octets))
    }
}

impl From<[u8; 6]> for Mac {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl Serialize for Mac {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Mac {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MacVisitor;

        impl Visitor<'_> for MacVisitor {
            type Value = Mac;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a MAC address string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Mac, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(MacVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_canonical() {
        let mac: Mac = "04:AB:00:12:34:56".parse().unwrap();
        assert_eq!(mac.octets(), [0x04, 0xAB, 0x00, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn parse_is_case_insensitive() {
        let upper: Mac = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        let lower: Mac = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn parse_without_separators() {
        let mac: Mac = "04ab00123456".parse().unwrap();
        assert_eq!(mac.to_string(), "04:AB:00:12:34:56");
    }

    #[test]
    fn render_roundtrip_normalizes_case() {
        let mac: Mac = "ff:fe:aa:00:12:34".parse().unwrap();
        assert_eq!(mac.to_string(), "FF:FE:AA:00:12:34");
        let again: Mac = mac.to_string().parse().unwrap();
        assert_eq!(mac, again);
    }

    #[test]
    fn parse_rejects_short_input() {
        let err = "AA:BB:CC".parse::<Mac>().unwrap_err();
        assert!(matches!(
            err,
            MacParseError::InvalidLength { actual: 3, .. }
        ));
    }

    #[test]
    fn parse_rejects_long_input() {
        assert!("AA:BB:CC:DD:EE:FF:00".parse::<Mac>().is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!("ZZ:BB:CC:DD:EE:FF".parse::<Mac>().is_err());
        assert!("AA-BB-CC-DD-EE-FF".parse::<Mac>().is_err());
        assert!("".parse::<Mac>().is_err());
    }

    #[test]
    fn parse_rejects_uneven_groups() {
        assert!("AA::BB:CC:DD:EE:FF".parse::<Mac>().is_err());
        assert!("A:ABB:CC:DD:EE:FF".parse::<Mac>().is_err());
        assert!("AABB:CC:DD:EE:FF".parse::<Mac>().is_err());
    }

    #[test]
    fn oui_prefix() {
        let mac: Mac = "00:03:93:01:02:03".parse().unwrap();
        assert_eq!(mac.oui(), [0x00, 0x03, 0x93]);
    }

    #[test]
    fn serde_as_string() {
        let mac: Mac = "04:ab:00:12:34:56".parse().unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"04:AB:00:12:34:56\"");

        let back: Mac = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }

    #[test]
    fn serde_rejects_malformed() {
        assert!(serde_json::from_str::<Mac>("\"nope\"").is_err());
        assert!(serde_json::from_str::<Mac>("42").is_err());
    }
}
