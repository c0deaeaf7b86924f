// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::suite::Cipher;
use crate::MacAddr;

// IEEE Std 802.11-2016, 9.4.1.7, Table 9-45
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    InvalidAuthentication = 2,
    FourwayHandshakeTimeout = 15,
    GkHandshakeTimeout = 16,
    Ie4wayDiffers = 17,
}

/// Sends EAPOL frames to stations and drops stations from the BSS.
pub trait Transport {
    fn send(&mut self, sta: &MacAddr, frame: &[u8]) -> Result<(), anyhow::Error>;
    fn disassociate(&mut self, sta: &MacAddr, reason: ReasonCode);
}

/// Installs and removes keys in the radio.
pub trait Driver {
    fn install_pairwise_key(
        &mut self,
        sta: &MacAddr,
        cipher: Cipher,
        key: &[u8],
    ) -> Result<(), anyhow::Error>;
    fn install_group_key(
        &mut self,
        cipher: Cipher,
        key_id: u8,
        key: &[u8],
    ) -> Result<(), anyhow::Error>;
    fn remove_pairwise_key(&mut self, sta: &MacAddr);
    /// Transmit sequence counter of the group key in slot `key_id`.
    fn group_key_seqnum(&self, _key_id: u8) -> u64 {
        0
    }
}
