// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::Error;
use rand::{rngs::OsRng, RngCore};

pub type Nonce = [u8; 32];

/// Source of cryptographically secure random bytes for nonces and group keys.
pub trait RandomSource {
    fn fill_random(&mut self, buf: &mut [u8]) -> Result<(), Error>;
}

/// Draws from the operating system's CSPRNG.
#[derive(Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_random(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        OsRng.try_fill_bytes(buf).map_err(|e| Error::RandomSource(e.to_string()))
    }
}

pub fn new_nonce(rng: &mut dyn RandomSource) -> Result<Nonce, Error> {
    let mut nonce = [0u8; 32];
    rng.fill_random(&mut nonce[..])?;
    Ok(nonce)
}
