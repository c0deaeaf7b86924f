// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Algorithm;
use crate::Error;
use aes::Aes128;
use cmac::{Cmac, Mac, NewMac};

/// AES-128-CMAC as used for key descriptor version 3.
pub struct CmacAes128;

impl CmacAes128 {
    pub fn new() -> CmacAes128 {
        CmacAes128 {}
    }
}

impl Algorithm for CmacAes128 {
    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut cmac = Cmac::<Aes128>::new_from_slice(key)
            .map_err(|_| Error::InvalidKeyLength(key.len(), 16))?;
        cmac.update(data);
        Ok(cmac.finalize().into_bytes().to_vec())
    }
}
