// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::suite::{Akm, Cipher};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// RSNE advertising WPA2-Personal with CCMP-128 for both pairwise and group traffic.
pub const DEFAULT_RSNE: [u8; 22] = [
    0x30, 0x14, // Element id, length
    0x01, 0x00, // Version
    0x00, 0x0f, 0xac, 0x04, // Group data cipher: CCMP-128
    0x01, 0x00, 0x00, 0x0f, 0xac, 0x04, // Pairwise cipher suites: CCMP-128
    0x01, 0x00, 0x00, 0x0f, 0xac, 0x02, // AKM suites: PSK
    0x00, 0x00, // RSN capabilities
];

/// Authenticator wide settings shared by all stations of a BSS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub eapol_version: u8,
    pub akm: Akm,
    pub pairwise_cipher: Cipher,
    pub group_cipher: Cipher,
    /// Encoded RSNE of the BSS, sent verbatim in message 3 of the 4-Way Handshake.
    pub rsne: Vec<u8>,
    /// dot11RSNAConfigPairwiseUpdateCount
    pub pairwise_update_count: u32,
    /// dot11RSNAConfigGroupUpdateCount
    pub group_update_count: u32,
    pub eapol_key_timeout_first: Duration,
    pub eapol_key_timeout_subsequent: Duration,
    pub eapol_key_timeout_first_group: Duration,
    pub group_rekey_interval: Option<Duration>,
    pub ptk_rekey_interval: Option<Duration>,
    /// Accept a message 2 which updates the SNonce of an earlier message 1 after message 3 was
    /// sent.
    pub allow_snonce_update: bool,
    /// Accept message 4 with the WPA key descriptor type.
    pub allow_wpa_type_msg4: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            eapol_version: eapol::ProtocolVersion::Ieee802dot1x2004 as u8,
            akm: Akm::Psk,
            pairwise_cipher: Cipher::Ccmp128,
            group_cipher: Cipher::Ccmp128,
            rsne: DEFAULT_RSNE.to_vec(),
            pairwise_update_count: 4,
            group_update_count: 4,
            eapol_key_timeout_first: Duration::from_millis(100),
            eapol_key_timeout_subsequent: Duration::from_millis(1000),
            eapol_key_timeout_first_group: Duration::from_millis(500),
            group_rekey_interval: Some(Duration::from_secs(86400)),
            ptk_rekey_interval: None,
            allow_snonce_update: true,
            allow_wpa_type_msg4: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.pairwise_cipher.is_supported() {
            return Err(Error::UnsupportedCipher(self.pairwise_cipher));
        }
        if !self.group_cipher.is_supported() {
            return Err(Error::UnsupportedCipher(self.group_cipher));
        }
        if self.pairwise_update_count == 0 {
            return Err(Error::InvalidConfig("pairwise_update_count must be positive"));
        }
        if self.group_update_count == 0 {
            return Err(Error::InvalidConfig("group_update_count must be positive"));
        }
        if self.eapol_version < 1 || self.eapol_version > 3 {
            return Err(Error::InvalidConfig("eapol_version must be 1, 2 or 3"));
        }
        if self.rsne.len() < 2 || self.rsne[0] != 48 || self.rsne[1] as usize + 2 != self.rsne.len()
        {
            return Err(Error::InvalidConfig("rsne is not a single encoded RSN element"));
        }
        Ok(())
    }

    pub fn key_descriptor_version(&self) -> u16 {
        self.akm.key_descriptor_version()
    }
}
