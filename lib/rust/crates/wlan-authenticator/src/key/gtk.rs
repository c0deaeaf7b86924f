// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::nonce::RandomSource;
use crate::Error;
use std::fmt;
use zeroize::Zeroize;

/// Group Temporal Key held in one of the two key slots of a group key context.
#[derive(Clone, PartialEq, Eq)]
pub struct Gtk {
    bytes: Vec<u8>,
}

impl Gtk {
    pub fn generate(rng: &mut dyn RandomSource, len: usize) -> Result<Self, Error> {
        let mut gtk = Gtk { bytes: vec![0u8; len] };
        rng.fill_random(&mut gtk.bytes[..])?;
        Ok(gtk)
    }

    pub fn empty() -> Self {
        Gtk { bytes: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    pub fn clear(&mut self) {
        self.bytes.zeroize();
        self.bytes.clear();
    }
}

impl fmt::Debug for Gtk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gtk({} bytes)", self.bytes.len())
    }
}

impl Drop for Gtk {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
