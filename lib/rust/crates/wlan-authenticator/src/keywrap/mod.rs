// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod aes;

use self::aes::NistAes;
use crate::Error;

pub trait Algorithm {
    fn wrap(&self, key: &[u8], p: &[u8]) -> Result<Vec<u8>, Error>;
    fn unwrap(&self, key: &[u8], c: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Returns the key data encryption algorithm for an EAPOL-Key frame's key descriptor version.
pub fn keywrap_algorithm(key_descriptor_version: u16) -> Option<Box<dyn Algorithm>> {
    // IEEE Std 802.11-2016, 12.7.2 b.1)
    match key_descriptor_version {
        2 | 3 => Some(Box::new(NistAes)),
        // RC4 is TKIP only.
        _ => None,
    }
}
