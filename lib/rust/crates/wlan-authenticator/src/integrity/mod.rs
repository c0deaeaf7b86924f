// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod cmac_aes128;
pub mod hmac_sha1;

use crate::Error;
use cmac_aes128::CmacAes128;
use hmac_sha1::HmacSha1;
use subtle::ConstantTimeEq;

pub trait Algorithm {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        match self.compute(key, data) {
            Ok(computed) => computed[..].ct_eq(expected).into(),
            Err(_) => false,
        }
    }
    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Returns the MIC algorithm for an EAPOL-Key frame's key descriptor version.
pub fn integrity_algorithm(key_descriptor_version: u16) -> Option<Box<dyn Algorithm>> {
    // IEEE Std 802.11-2016, 12.7.2 b.1)
    match key_descriptor_version {
        2 => Some(Box::new(HmacSha1::new())),
        3 => Some(Box::new(CmacAes128::new())),
        // HMAC-MD5 is TKIP only.
        _ => None,
    }
}
