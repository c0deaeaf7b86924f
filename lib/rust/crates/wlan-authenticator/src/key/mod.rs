// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod gtk;
pub mod ptk;

use crate::Error;
use std::fmt;
use zeroize::Zeroize;

pub const PMK_LEN: usize = 32;

/// Pairwise Master Key, either a PSK or the output of an 802.1X authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Pmk {
    bytes: [u8; PMK_LEN],
}

impl Pmk {
    pub fn new(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PMK_LEN {
            return Err(Error::InvalidKeyLength(bytes.len(), PMK_LEN));
        }
        let mut pmk = Pmk { bytes: [0u8; PMK_LEN] };
        pmk.bytes.copy_from_slice(bytes);
        Ok(pmk)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl From<[u8; PMK_LEN]> for Pmk {
    fn from(bytes: [u8; PMK_LEN]) -> Self {
        Pmk { bytes }
    }
}

impl fmt::Debug for Pmk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pmk(..)")
    }
}

impl Drop for Pmk {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
