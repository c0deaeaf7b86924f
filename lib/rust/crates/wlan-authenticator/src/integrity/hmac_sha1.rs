// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Algorithm;
use crate::Error;
use hmac::{Hmac, Mac, NewMac};
use sha1::Sha1;

/// HMAC-SHA1-128 as used for key descriptor version 2.
pub struct HmacSha1;

impl HmacSha1 {
    pub fn new() -> HmacSha1 {
        HmacSha1 {}
    }
}

impl Algorithm for HmacSha1 {
    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut hmac =
            Hmac::<Sha1>::new_from_slice(key).map_err(|_| Error::InvalidHmacKey(key.len()))?;
        hmac.update(data);
        // Truncate to 128 bits.
        Ok(hmac.finalize().into_bytes()[..16].to_vec())
    }
}
