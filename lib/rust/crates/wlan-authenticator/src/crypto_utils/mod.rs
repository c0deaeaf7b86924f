// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod nonce;

use crate::Error;
use hmac::{Hmac, Mac, NewMac};
use sha1::Sha1;
use sha2::Sha256;

// IEEE Std 802.11-2016, 12.7.1.2
pub fn prf(k: &[u8], a: &str, b: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    let bytes = (bits + 7) / 8;
    let iterations = (bits + 159) / 160;
    let mut result = Vec::with_capacity(iterations * 20);
    let keyed = Hmac::<Sha1>::new_from_slice(k).map_err(|_| Error::InvalidHmacKey(k.len()))?;
    for i in 0..iterations {
        let mut hmac = keyed.clone();
        hmac.update(a.as_bytes());
        hmac.update(&[0u8]);
        hmac.update(b);
        hmac.update(&[i as u8]);
        result.extend_from_slice(&hmac.finalize().into_bytes()[..]);
    }
    result.truncate(bytes);
    Ok(result)
}

// IEEE Std 802.11-2016, 12.7.1.7.2
pub fn kdf_sha256(k: &[u8], label: &str, context: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    let bytes = (bits + 7) / 8;
    let iterations = (bits + 255) / 256;
    let mut result = Vec::with_capacity(iterations * 32);
    let keyed = Hmac::<Sha256>::new_from_slice(k).map_err(|_| Error::InvalidHmacKey(k.len()))?;
    for i in 1..=iterations {
        let mut hmac = keyed.clone();
        hmac.update(&(i as u16).to_le_bytes()[..]);
        hmac.update(label.as_bytes());
        hmac.update(context);
        hmac.update(&(bits as u16).to_le_bytes()[..]);
        result.extend_from_slice(&hmac.finalize().into_bytes()[..]);
    }
    result.truncate(bytes);
    Ok(result)
}
