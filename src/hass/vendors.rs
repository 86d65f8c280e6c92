// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Manufacturer lookup by OUI prefix.
//!
//! A curated subset of the IEEE registry covering common consumer
//! devices; the manufacturer is cosmetic (it only feeds the Home
//! Assistant device registry), so unknown prefixes simply yield an
//! empty string and the field is omitted from the discovery document.

use crate::types::Mac;

const VENDOR_APPLE: &str = "Apple, Inc.";
const VENDOR_GOOGLE: &str = "Google, Inc.";
const VENDOR_SAMSUNG: &str = "Samsung Electronics Co., Ltd";
const VENDOR_AMAZON: &str = "Amazon Technologies Inc.";
const VENDOR_ESPRESSIF: &str = "Espressif Inc.";
const VENDOR_RASPBERRY: &str = "Raspberry Pi Foundation";
const VENDOR_INTEL: &str = "Intel Corporate";
const VENDOR_SONOS: &str = "Sonos, Inc.";
const VENDOR_XIAOMI: &str = "Xiaomi Communications Co Ltd";
const VENDOR_HUAWEI: &str = "Huawei Technologies Co., Ltd";
const VENDOR_ONEPLUS: &str = "OnePlus Technology Co., Ltd";
const VENDOR_MICROSOFT: &str = "Microsoft Corporation";
const VENDOR_TPLINK: &str = "TP-Link Corporation Limited";

const OUI_VENDORS: &[([u8; 3], &str)] = &[
    ([0x00, 0x03, 0x93], VENDOR_APPLE),
    ([0x28, 0xCF, 0xE9], VENDOR_APPLE),
    ([0xCC, 0x20, 0xE8], VENDOR_APPLE),
    ([0xD0, 0x03, 0x4B], VENDOR_APPLE),
    ([0xF4, 0x5C, 0x89], VENDOR_APPLE),
    ([0x00, 0x1A, 0x11], VENDOR_GOOGLE),
    ([0x94, 0x95, 0xA0], VENDOR_GOOGLE),
    ([0xF4, 0xF5, 0xD8], VENDOR_GOOGLE),
    ([0x00, 0x00, 0xF0], VENDOR_SAMSUNG),
    ([0x5C, 0x0A, 0x5B], VENDOR_SAMSUNG),
    ([0x8C, 0x77, 0x12], VENDOR_SAMSUNG),
    ([0x44, 0x65, 0x0D], VENDOR_AMAZON),
    ([0xF0, 0xD2, 0xF1], VENDOR_AMAZON),
    ([0x24, 0x0A, 0xC4], VENDOR_ESPRESSIF),
    ([0x30, 0xAE, 0xA4], VENDOR_ESPRESSIF),
    ([0xA4, 0xCF, 0x12], VENDOR_ESPRESSIF),
    ([0xB8, 0x27, 0xEB], VENDOR_RASPBERRY),
    ([0xDC, 0xA6, 0x32], VENDOR_RASPBERRY),
    ([0xE4, 0x5F, 0x01], VENDOR_RASPBERRY),
    ([0x00, 0x1B, 0x21], VENDOR_INTEL),
    ([0x3C, 0xA9, 0xF4], VENDOR_INTEL),
    ([0x00, 0x0E, 0x58], VENDOR_SONOS),
    ([0x94, 0x9F, 0x3E], VENDOR_SONOS),
    ([0x34, 0xCE, 0x00], VENDOR_XIAOMI),
    ([0x00, 0xE0, 0xFC], VENDOR_HUAWEI),
    ([0x94, 0x65, 0x2D], VENDOR_ONEPLUS),
    ([0x00, 0x15, 0x5D], VENDOR_MICROSOFT),
    ([0x14, 0xCC, 0x20], VENDOR_TPLINK),
    ([0x50, 0xC7, 0xBF], VENDOR_TPLINK),
];

/// Returns the manufacturer registered for the address's OUI prefix,
/// or an empty string when the prefix is not in the table.
#[must_use]
pub fn vendor_by_mac(mac: Mac) -> &'static str {
    let oui = mac.oui();
    OUI_VENDORS
        .iter()
        .find(|(prefix, _)| *prefix == oui)
        .map_or("", |(_, vendor)| vendor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_prefixes() {
        let cases: &[(&str, &str)] = &[
            ("00:03:93:00:00:FF", VENDOR_APPLE),
            ("CC:20:E8:FF:FF:FF", VENDOR_APPLE),
            ("00:1A:11:12:34:56", VENDOR_GOOGLE),
            ("00:00:F0:00:00:01", VENDOR_SAMSUNG),
            ("B8:27:EB:AA:BB:CC", VENDOR_RASPBERRY),
        ];

        for (input, expected) in cases {
            let mac: Mac = input.parse().unwrap();
            assert_eq!(vendor_by_mac(mac), *expected, "for {input}");
        }
    }

    #[test]
    fn unknown_prefix_is_empty() {
        let mac: Mac = "FF:FF:FF:FF:FF:FF".parse().unwrap();
        assert_eq!(vendor_by_mac(mac), "");
    }
}
