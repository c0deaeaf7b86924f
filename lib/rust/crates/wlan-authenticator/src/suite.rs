// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use serde::{Deserialize, Serialize};

// IEEE Std 802.11-2016, 9.4.2.25.3, Table 9-133
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Akm {
    Ieee8021x,
    Psk,
    Ieee8021xSha256,
    PskSha256,
}

impl Akm {
    pub fn is_psk(&self) -> bool {
        match self {
            Akm::Psk | Akm::PskSha256 => true,
            Akm::Ieee8021x | Akm::Ieee8021xSha256 => false,
        }
    }

    /// Whether the PTK is derived with the SHA-256 based KDF instead of the SHA-1 PRF.
    pub fn uses_sha256(&self) -> bool {
        match self {
            Akm::Ieee8021xSha256 | Akm::PskSha256 => true,
            Akm::Ieee8021x | Akm::Psk => false,
        }
    }

    // IEEE Std 802.11-2016, 12.7.2 b.1)
    pub fn key_descriptor_version(&self) -> u16 {
        if self.uses_sha256() {
            3
        } else {
            2
        }
    }

    // IEEE Std 802.11-2016, 12.7.3, Table 12-8
    pub fn mic_bytes(&self) -> u16 {
        16
    }
}

// IEEE Std 802.11-2016, 9.4.2.25.2, Table 9-131
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cipher {
    Tkip,
    Ccmp128,
}

impl Cipher {
    pub fn is_supported(&self) -> bool {
        *self == Cipher::Ccmp128
    }

    pub fn tk_bytes(&self) -> usize {
        match self {
            Cipher::Tkip => 32,
            Cipher::Ccmp128 => 16,
        }
    }
}
